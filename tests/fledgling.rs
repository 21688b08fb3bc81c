//! Snippet tests for the Xi pipeline as a whole.
//!
//! Each snippet in `tests/snippets` opens with a heading of
//! `# key: value` comments naming the `action` to run, the
//! expected `outcome`, and optionally the top stack cell
//! to `expect` after running.

use std::{collections::HashMap, fs, path::PathBuf, rc::Rc};

use xi::{
    common::source::Source,
    compiler::{check, gen, parse, Context, Syntax},
    vm::VM,
};

/// Represents specific success/failure modes of a snippet test.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Parse,
    Type,
    Codegen,
}

impl Outcome {
    pub fn parse(outcome: &str) -> Outcome {
        match outcome {
            "success" => Outcome::Success,
            "parse" => Outcome::Parse,
            "type" => Outcome::Type,
            "codegen" => Outcome::Codegen,
            invalid => panic!("invalid outcome '{}' in strat heading", invalid),
        }
    }

    fn of<T>(result: &Result<T, Syntax>) -> Outcome {
        match result {
            Ok(_) => Outcome::Success,
            Err(Syntax::Parse(_)) => Outcome::Parse,
            Err(Syntax::Type(_)) => Outcome::Type,
            Err(Syntax::Codegen(_)) => Outcome::Codegen,
        }
    }
}

/// Represents what part of the pipeline a snippet tests.
#[derive(Debug)]
pub enum Action {
    Parse,
    Check,
    Gen,
    Run,
}

impl Action {
    pub fn parse(action: &str) -> Action {
        match action {
            "parse" => Action::Parse,
            "check" => Action::Check,
            "gen" => Action::Gen,
            "run" => Action::Run,
            invalid => panic!("invalid action '{}' in strat heading", invalid),
        }
    }
}

/// Represents a test strategy for executing a snippet,
/// found at the top of each file.
#[derive(Debug)]
pub struct TestStrat {
    /// How far down the pipeline to go.
    action: Action,
    /// The expected outcome.
    outcome: Outcome,
    /// The expected top cell after running.
    /// Should only be used with `Action::Run`.
    expect: Option<i64>,
}

impl TestStrat {
    /// Uses a heading to construct a test strat.
    pub fn heading(heading: HashMap<String, String>) -> TestStrat {
        let mut outcome = None;
        let mut action = None;
        let mut expect = None;

        for (strat, result) in heading.iter() {
            match strat.as_str() {
                "outcome" => outcome = Some(Outcome::parse(result)),
                "action" => action = Some(Action::parse(result)),
                "expect" => {
                    expect = Some(result.parse().expect("expectation is not an integer"))
                },
                invalid => panic!("invalid strat '{}' in strat heading", invalid),
            }
        }

        TestStrat {
            outcome: outcome.expect("no outcome provided"),
            action: action.expect("no action provided"),
            expect,
        }
    }

    /// Parses the test strat from the leading comments of
    /// a snippet.
    pub fn snippet(source: &Rc<Source>) -> TestStrat {
        let mut heading = HashMap::new();

        for line in source.contents.lines() {
            let line = match line.strip_prefix('#') {
                Some(line) => line,
                None => break,
            };

            let (strat, result) = line
                .split_once(':')
                .expect("missing colon in test strat heading");
            let previous = heading.insert(strat.trim().to_string(), result.trim().to_string());
            assert!(previous.is_none(), "key present twice in test strat heading");
        }

        TestStrat::heading(heading)
    }
}

fn test_snippet(source: Rc<Source>, strat: TestStrat) {
    let parsed = parse(source).map_err(Syntax::from);
    let mut context = Context::new();

    let actual = match strat.action {
        Action::Parse => Outcome::of(&parsed),
        Action::Check => Outcome::of(&parsed.and_then(|mut program| {
            check(&mut context, &mut program).map_err(Syntax::from)
        })),
        Action::Gen | Action::Run => {
            let bytecode = parsed.and_then(|mut program| {
                check(&mut context, &mut program)?;
                Ok(gen(&context, &program)?)
            });

            if let (Action::Run, Ok(bytecode)) = (&strat.action, &bytecode) {
                let exit = VM::init().run(bytecode);
                if let Some(expected) = strat.expect {
                    assert_eq!(
                        exit.top(),
                        Some(expected),
                        "top stack cell does not match, stack is {:?}",
                        exit.stack
                    );
                }
            }
            if let Err(error) = &bytecode {
                println!("{}", error);
            }
            Outcome::of(&bytecode)
        },
    };

    assert_eq!(actual, strat.outcome, "outcomes are not the same");
}

#[test]
fn test_snippets() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("snippets");
    let mut to_run: Vec<PathBuf> = fs::read_dir(&dir)
        .expect("snippets live in tests/snippets")
        .map(|entry| entry.expect("could not read path").path())
        .filter(|path| path.extension().map_or(false, |e| e == "xi"))
        .collect();
    to_run.sort();

    println!("\nRunning {} snippet test(s)...", to_run.len());
    assert!(!to_run.is_empty());

    for (counter, path) in to_run.iter().enumerate() {
        println!("test {}: {}...", counter, path.display());

        let source = Source::path(path).expect("could not get snippet source");
        let strat = TestStrat::snippet(&source);
        test_snippet(source, strat);
    }

    println!("All tests passed!\n");
}
