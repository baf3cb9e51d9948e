use super::{Callable, Environment};
use crate::errors::{Arity, EvalError};
use crate::parser::Expr;
use internment::Intern;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

pub type NumericFnType = fn(&[f64]) -> Expr;
pub type LogicalFnType = fn(&[bool]) -> Expr;
pub type GenericFnType = fn(Vec<Expr>) -> Result<Expr, EvalError>;

/// A builtin body together with the argument kind it is checked against.
#[derive(Clone, Copy)]
pub enum NativeFn {
    /// Every argument must be a Number.
    Numeric(NumericFnType),
    /// Every argument must be a Boolean.
    Logical(LogicalFnType),
    /// Arguments are passed through; the body checks them itself.
    Generic(GenericFnType),
}

pub const BUILTIN_BINDINGS: [(&str, Arity, NativeFn); 25] = [
    ("+", Arity::AtLeast(0), NativeFn::Numeric(builtin_add)),
    ("-", Arity::AtLeast(1), NativeFn::Numeric(builtin_sub)),
    ("*", Arity::AtLeast(0), NativeFn::Numeric(builtin_mul)),
    ("/", Arity::AtLeast(1), NativeFn::Numeric(builtin_div)),
    ("%", Arity::Exactly(2), NativeFn::Numeric(builtin_mod)),
    ("abs", Arity::Exactly(1), NativeFn::Numeric(builtin_abs)),
    ("max", Arity::AtLeast(1), NativeFn::Numeric(builtin_max)),
    ("min", Arity::AtLeast(1), NativeFn::Numeric(builtin_min)),
    ("<", Arity::AtLeast(2), NativeFn::Numeric(builtin_lt)),
    ("<=", Arity::AtLeast(2), NativeFn::Numeric(builtin_leq)),
    (">", Arity::AtLeast(2), NativeFn::Numeric(builtin_gt)),
    (">=", Arity::AtLeast(2), NativeFn::Numeric(builtin_geq)),
    ("=", Arity::AtLeast(2), NativeFn::Numeric(builtin_isnumeq)),
    ("&&", Arity::AtLeast(0), NativeFn::Logical(builtin_and)),
    ("||", Arity::AtLeast(0), NativeFn::Logical(builtin_or)),
    ("!", Arity::Exactly(1), NativeFn::Logical(builtin_not)),
    ("and", Arity::AtLeast(0), NativeFn::Logical(builtin_and)),
    ("or", Arity::AtLeast(0), NativeFn::Logical(builtin_or)),
    ("not", Arity::Exactly(1), NativeFn::Logical(builtin_not)),
    ("equal?", Arity::Exactly(2), NativeFn::Generic(builtin_isequal)),
    ("car", Arity::Exactly(1), NativeFn::Generic(builtin_car)),
    ("cdr", Arity::Exactly(1), NativeFn::Generic(builtin_cdr)),
    ("cons", Arity::Exactly(2), NativeFn::Generic(builtin_cons)),
    ("list", Arity::AtLeast(0), NativeFn::Generic(builtin_list)),
    ("list?", Arity::Exactly(1), NativeFn::Generic(builtin_islist)),
];

/// A builtin procedure value. Arity and argument kinds are validated before
/// the body runs, so bodies only see well-typed input.
pub struct NativeProcedure {
    name: &'static str,
    arity: Arity,
    func: NativeFn,
}

impl NativeProcedure {
    #[must_use]
    pub fn new(name: &'static str, arity: Arity, func: NativeFn) -> Self {
        NativeProcedure { name, arity, func }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn type_error(&self, expected: &'static str, received: &Expr) -> EvalError {
        EvalError::Type {
            procedure: self.name.to_string(),
            expected,
            received: received.kind_name(),
        }
    }
}

impl fmt::Debug for NativeProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeProcedure")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl Callable for NativeProcedure {
    fn call(&self, args: Vec<Expr>) -> Result<Expr, EvalError> {
        trace!(name = self.name, args = args.len(), "call builtin");
        if !self.arity.accepts(args.len()) {
            return Err(EvalError::Arity {
                procedure: self.name.to_string(),
                expected: self.arity,
                actual: args.len(),
            });
        }
        match self.func {
            NativeFn::Numeric(f) => {
                let mut nums = Vec::with_capacity(args.len());
                for arg in &args {
                    match arg {
                        Expr::Number(n) => nums.push(*n),
                        other => return Err(self.type_error("Number", other)),
                    }
                }
                Ok(f(&nums))
            }
            NativeFn::Logical(f) => {
                let mut bools = Vec::with_capacity(args.len());
                for arg in &args {
                    match arg {
                        Expr::Bool(b) => bools.push(*b),
                        other => return Err(self.type_error("Boolean", other)),
                    }
                }
                Ok(f(&bools))
            }
            NativeFn::Generic(f) => f(args),
        }
    }
}

impl Environment {
    #[must_use]
    pub fn standard() -> Self {
        let env = Self::empty();
        env.import_bindings(&BUILTIN_BINDINGS);
        env
    }

    pub fn import_bindings(&self, bindings: &[(&'static str, Arity, NativeFn)]) {
        for (name, arity, func) in bindings {
            self.define(
                Intern::new((*name).to_string()),
                Expr::Native(Rc::new(NativeProcedure::new(*name, *arity, *func))),
            );
        }
    }
}

/// A fresh top-level environment holding every builtin.
#[must_use]
pub fn new_env() -> Environment {
    Environment::standard()
}

fn builtin_add(nums: &[f64]) -> Expr {
    Expr::Number(nums.iter().sum())
}

fn builtin_mul(nums: &[f64]) -> Expr {
    Expr::Number(nums.iter().product())
}

fn builtin_sub(nums: &[f64]) -> Expr {
    match nums.split_first() {
        Some((first, [])) => Expr::Number(-first),
        Some((first, rest)) => Expr::Number(rest.iter().fold(*first, |acc, x| acc - x)),
        None => Expr::Number(0.0),
    }
}

fn builtin_div(nums: &[f64]) -> Expr {
    match nums.split_first() {
        Some((first, [])) => Expr::Number(1.0 / first),
        Some((first, rest)) => Expr::Number(rest.iter().fold(*first, |acc, x| acc / x)),
        None => Expr::Number(1.0),
    }
}

fn builtin_mod(nums: &[f64]) -> Expr {
    Expr::Number(nums[0].trunc() % nums[1].trunc())
}

fn builtin_abs(nums: &[f64]) -> Expr {
    Expr::Number(nums[0].abs())
}

// NaN in any position wins, unlike `f64::max` which skips it.
fn builtin_extremum(nums: &[f64], pick: fn(f64, f64) -> f64) -> Expr {
    let folded = nums.iter().copied().reduce(|acc, x| {
        if acc.is_nan() || x.is_nan() {
            f64::NAN
        } else {
            pick(acc, x)
        }
    });
    Expr::Number(folded.unwrap_or(f64::NAN))
}

fn builtin_max(nums: &[f64]) -> Expr {
    builtin_extremum(nums, f64::max)
}

fn builtin_min(nums: &[f64]) -> Expr {
    builtin_extremum(nums, f64::min)
}

type CmpFnType = fn(f64, f64) -> bool;

fn builtin_cmp(nums: &[f64], method: CmpFnType) -> Expr {
    Expr::Bool(nums.windows(2).all(|pair| method(pair[0], pair[1])))
}

fn builtin_lt(nums: &[f64]) -> Expr {
    builtin_cmp(nums, |a, b| a < b)
}

fn builtin_leq(nums: &[f64]) -> Expr {
    builtin_cmp(nums, |a, b| a <= b)
}

fn builtin_gt(nums: &[f64]) -> Expr {
    builtin_cmp(nums, |a, b| a > b)
}

fn builtin_geq(nums: &[f64]) -> Expr {
    builtin_cmp(nums, |a, b| a >= b)
}

fn builtin_isnumeq(nums: &[f64]) -> Expr {
    builtin_cmp(nums, |a, b| a == b)
}

fn builtin_and(bools: &[bool]) -> Expr {
    Expr::Bool(bools.iter().all(|b| *b))
}

fn builtin_or(bools: &[bool]) -> Expr {
    Expr::Bool(bools.iter().any(|b| *b))
}

fn builtin_not(bools: &[bool]) -> Expr {
    Expr::Bool(!bools[0])
}

fn builtin_isequal(values: Vec<Expr>) -> Result<Expr, EvalError> {
    Ok(Expr::Bool(values[0] == values[1]))
}

fn non_empty_list(name: &str, value: Expr) -> Result<Vec<Expr>, EvalError> {
    match value {
        Expr::List(v) if !v.is_empty() => Ok(v),
        Expr::List(_) => Err(EvalError::Type {
            procedure: name.to_string(),
            expected: "non-empty List",
            received: "empty List",
        }),
        other => Err(EvalError::Type {
            procedure: name.to_string(),
            expected: "List",
            received: other.kind_name(),
        }),
    }
}

fn builtin_car(mut values: Vec<Expr>) -> Result<Expr, EvalError> {
    let mut list = non_empty_list("car", values.remove(0))?;
    Ok(list.swap_remove(0))
}

fn builtin_cdr(mut values: Vec<Expr>) -> Result<Expr, EvalError> {
    let mut list = non_empty_list("cdr", values.remove(0))?;
    list.remove(0);
    Ok(Expr::List(list))
}

fn builtin_cons(values: Vec<Expr>) -> Result<Expr, EvalError> {
    let mut values = values.into_iter();
    let (Some(first), Some(rest)) = (values.next(), values.next()) else {
        return Ok(Expr::List(Vec::new()));
    };
    match rest {
        Expr::List(rest) => {
            let mut new_list = Vec::with_capacity(rest.len() + 1);
            new_list.push(first);
            new_list.extend(rest);
            Ok(Expr::List(new_list))
        }
        other => Ok(Expr::List(vec![first, other])),
    }
}

fn builtin_list(values: Vec<Expr>) -> Result<Expr, EvalError> {
    Ok(Expr::List(values))
}

fn builtin_islist(values: Vec<Expr>) -> Result<Expr, EvalError> {
    Ok(Expr::Bool(matches!(values[0], Expr::List(_))))
}
