use crate::errors::Error;
use crate::parser::{parse_program, Expr, Reader};
use crate::treewalk::Environment;
use tracing::debug;

/// Evaluates every top-level form of `code`, returning the last value.
/// Stops at the first error.
pub fn run(code: &str, env: &Environment) -> Result<Expr, Error> {
    let mut val = Expr::Unspecified;
    let exprs = parse_program(code).map_err(|err| {
        debug!(%err, "parse failed");
        Error::from(err)
    })?;
    for expr in exprs {
        match env.evaluate(&expr) {
            Err(err) => {
                debug!(%expr, %err, "evaluation failed");
                return Err(Error::Eval(err));
            }
            Ok(value) => val = value,
        }
    }
    Ok(val)
}

/// Reads and evaluates one top-level form at a time, collecting every
/// outcome. Evaluation errors do not stop later forms; a syntax error ends
/// the run.
pub fn run_each(code: &str, env: &Environment) -> Vec<Result<Expr, Error>> {
    let mut reader = Reader::new(code);
    let mut results = Vec::new();
    while !reader.at_end() {
        let expr = match reader.read_expression() {
            Ok(expr) => expr,
            Err(err) => {
                debug!(%err, "parse failed");
                results.push(Err(Error::Parse(err)));
                break;
            }
        };
        let result = env.evaluate(&expr).map_err(|err| {
            debug!(%expr, %err, "evaluation failed");
            Error::Eval(err)
        });
        results.push(result);
    }
    results
}

pub fn run_standard(code: &str) -> Result<Expr, Error> {
    let env = Environment::standard().extend();
    run(code, &env)
}
