use colored::*;

/// A tagged line of driver output on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Info,
    Success,
    Fatal,
}

impl Status {
    fn tag(&self) -> ColoredString {
        match self {
            Status::Info => "Info".blue(),
            Status::Success => "Success".green(),
            Status::Fatal => "Fatal".red(),
        }
        .bold()
    }

    /// Multi-line messages (rendered errors) start on a
    /// fresh line below the tag.
    pub fn log(&self, message: &str) {
        if message.lines().count() > 1 {
            eprintln!("\n{}", self.tag());
            eprintln!("{}\n", message);
        } else {
            eprintln!("{:>12} {}", self.tag(), message);
        }
    }
}
