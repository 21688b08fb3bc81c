use std::{path::Path, process, rc::Rc};

use structopt::StructOpt;
use tracing::Level;

use xi::{
    compile,
    compiler::{check, parse, Context},
    Config, Source, VM,
};

// argument parser and output
mod cli;
mod status;

use crate::{
    cli::{Command, Xi},
    status::Status,
};

fn main() {
    let xi = Xi::from_args();
    logging(xi.verbose);

    let result = match xi.command {
        Command::Run { path, call, args } => run(&path, call, &args),
        Command::Check(file) => check_file(&file.path),
        Command::Dump(file) => dump(&file.path),
        Command::Parse(file) => parse_file(&file.path),
    };

    if let Err(message) = result {
        Status::Fatal.log(&message);
        process::exit(1);
    }
}

fn logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<Rc<Source>, String> {
    Source::path(path).map_err(|e| format!("{} could not be read: {}", path.display(), e))
}

fn config(path: &Path) -> Result<Config, String> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    Config::find(dir).map_err(|e| e.to_string())
}

fn run(path: &Path, call: Option<String>, args: &[i64]) -> Result<(), String> {
    let config = config(path)?;
    let bytecode = compile(load(path)?).map_err(|e| e.to_string())?;
    if config.compile.dump {
        print!("{}", bytecode);
    }

    let mut vm = VM::with_capacity(config.vm.stack);
    let exit = match call {
        Some(name) => vm
            .invoke(&bytecode, &name, args)
            .ok_or_else(|| format!("no function named `{}`", name))?,
        None => vm.run(&bytecode),
    };

    Status::Info.log(&format!("halted after {} steps", exit.steps));
    println!("{:?}", exit.stack);
    Ok(())
}

fn check_file(path: &Path) -> Result<(), String> {
    let mut program = parse(load(path)?).map_err(|e| e.to_string())?;
    let mut context = Context::new();
    check(&mut context, &mut program).map_err(|e| e.to_string())?;
    Status::Success.log(&format!("{} type-checks", path.display()));
    Ok(())
}

fn dump(path: &Path) -> Result<(), String> {
    let bytecode = compile(load(path)?).map_err(|e| e.to_string())?;
    print!("{}", bytecode);
    Ok(())
}

fn parse_file(path: &Path) -> Result<(), String> {
    let program = parse(load(path)?).map_err(|e| e.to_string())?;
    print!("{}", program);
    Ok(())
}
