use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
pub struct File {
    /// Path to a Xi source file
    #[structopt(parse(from_os_str))]
    pub path: PathBuf,
}

#[derive(StructOpt, Debug)]
#[structopt(name = "Xi", bin_name = "xi", about)]
pub struct Xi {
    /// Log compiler passes (-v) and interpreter steps (-vv)
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Compiles and runs a program, printing the final stack
    Run {
        #[structopt(parse(from_os_str))]
        path: PathBuf,
        /// Runs a single function instead of `main`
        #[structopt(long)]
        call: Option<String>,
        /// Integer arguments passed to the `--call`ed function
        #[structopt(allow_hyphen_values = true)]
        args: Vec<i64>,
    },
    /// Parses and type-checks a program
    Check(File),
    /// Prints the bytecode of a program
    Dump(File),
    /// Prints the parsed program
    Parse(File),
}
