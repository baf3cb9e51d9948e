use lisplet::run::run_each;
use lisplet::{Environment, Error, Expr};
use std::env;
use std::fs;
use std::io::{self, prelude::*};
use tracing::info;

const REPL_PROMPT: &str = "λ>";

/// Installs a subscriber only when `RUST_LOG` asks for one.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

/// Evaluates each top-level form; a failing form is reported and the rest
/// still run.
fn evaluate_all(code: &str, env: &Environment) {
    for result in run_each(code, env) {
        match result {
            Ok(Expr::Unspecified) => (),
            Ok(v) => println!("{v}"),
            Err(err) => eprintln!("{err}"),
        }
    }
}

fn repl() {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let env = Environment::standard().extend();

    loop {
        print!("{REPL_PROMPT} ");
        if let Err(err) = stdout.flush() {
            eprintln!("{}", Error::Io(err.to_string()));
        }

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) => {
                println!();
                return;
            }
            Ok(_) => evaluate_all(input.trim(), &env),
            Err(err) => eprintln!("{}", Error::Io(err.to_string())),
        }
    }
}

fn run(filename: &str) -> Result<(), Error> {
    let code = fs::read_to_string(filename).map_err(|err| Error::Io(err.to_string()))?;
    info!(filename, bytes = code.len(), "running file");
    let env = Environment::standard().extend();
    evaluate_all(&code, &env);
    Ok(())
}

#[derive(Debug, PartialEq)]
enum Mode<'a> {
    Repl,
    File(&'a str),
    Usage(usize),
}

/// Picks the front end from the arguments after the program name.
fn mode(args: &[String]) -> Mode<'_> {
    match args {
        [] => Mode::Repl,
        [filename] => Mode::File(filename),
        more => Mode::Usage(more.len()),
    }
}

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();

    match mode(&args) {
        Mode::Repl => repl(),
        Mode::File(filename) => {
            if let Err(err) = run(filename) {
                eprintln!("{err}");
                std::process::exit(1);
            }
        }
        Mode::Usage(count) => eprintln!("Error: need one argument at most, got {count}"),
    }
}
