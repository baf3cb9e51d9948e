use crate::errors::{Arity, EvalError, SyntaxError};
use crate::parser::{Expr, Keyword};
use internment::Intern;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::iter::zip;
use std::rc::Rc;
use std::str::FromStr;
use tracing::{debug, trace};

pub mod builtin;

pub use builtin::new_env;

impl Expr {
    /// `#f`, `0`, `()` and unspecified values are false; everything else is true.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Expr::Bool(b) => *b,
            Expr::Number(n) => *n != 0.0,
            Expr::List(v) => !v.is_empty(),
            Expr::Unspecified => false,
            _ => true,
        }
    }
}

#[derive(Default)]
struct EnvironmentNode {
    data: FxHashMap<Intern<String>, Expr>,
    parent: Option<Rc<RefCell<EnvironmentNode>>>,
}

impl EnvironmentNode {
    fn get(&self, key: &Intern<String>) -> Option<Expr> {
        match self.data.get(key) {
            Some(value) => Some(value.clone()),
            None => match &self.parent {
                Some(link) => link.borrow().get(key),
                None => None,
            },
        }
    }

    fn replace(&mut self, key: Intern<String>, value: Expr) -> bool {
        if let Some(slot) = self.data.get_mut(&key) {
            *slot = value;
            return true;
        }
        match &self.parent {
            Some(link) => link.borrow_mut().replace(key, value),
            None => false,
        }
    }
}

/// A scope in the environment chain.
///
/// Cloning is cheap and yields a handle on the same scope, so every closure
/// created in a scope observes later `define`s and `set!`s made there.
#[derive(Clone)]
pub struct Environment {
    head: Rc<RefCell<EnvironmentNode>>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.head.borrow();
        f.debug_struct("Environment")
            .field("bindings", &node.data.len())
            .field("has_parent", &node.parent.is_some())
            .finish()
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.head, &other.head)
    }
}

impl Environment {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            head: Rc::new(RefCell::new(EnvironmentNode::default())),
        }
    }

    /// A fresh scope whose parent is `self`.
    #[must_use]
    pub fn extend(&self) -> Self {
        let node = EnvironmentNode {
            data: FxHashMap::default(),
            parent: Some(self.head.clone()),
        };
        Self {
            head: Rc::new(RefCell::new(node)),
        }
    }

    /// Binds `key` in this scope only, shadowing any outer binding.
    pub fn define(&self, key: Intern<String>, value: Expr) {
        self.head.borrow_mut().data.insert(key, value);
    }

    pub fn lookup(&self, key: &Intern<String>) -> Result<Expr, EvalError> {
        self.head
            .borrow()
            .get(key)
            .ok_or_else(|| EvalError::UndefinedSymbol(key.to_string()))
    }

    /// Overwrites the nearest existing binding of `key`.
    pub fn assign(&self, key: Intern<String>, value: Expr) -> Result<(), EvalError> {
        if self.head.borrow_mut().replace(key, value) {
            Ok(())
        } else {
            Err(EvalError::UndefinedSymbol(key.to_string()))
        }
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Expr, EvalError> {
        match expr {
            Expr::Number(_)
            | Expr::Str(_)
            | Expr::Bool(_)
            | Expr::Closure(_)
            | Expr::Native(_)
            | Expr::Unspecified => Ok(expr.clone()),
            Expr::Symbol(s) => self.lookup(s),
            Expr::List(items) => match items.split_first() {
                None => Ok(expr.clone()),
                Some((head, args)) => self.evaluate_list(items, head, args),
            },
        }
    }

    fn evaluate_list(&self, form: &[Expr], head: &Expr, args: &[Expr]) -> Result<Expr, EvalError> {
        if let Expr::Symbol(s) = head {
            if let Ok(keyword) = Keyword::from_str(s) {
                return self.evaluate_special(keyword, form);
            }
        }
        let proc = self.evaluate(head)?;
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.evaluate(arg)?);
        }
        apply(&proc, arg_values)
    }

    fn evaluate_special(&self, keyword: Keyword, form: &[Expr]) -> Result<Expr, EvalError> {
        let arity = match keyword {
            Keyword::Quote => Arity::Exactly(2),
            Keyword::If => Arity::Exactly(4),
            Keyword::Define | Keyword::Set | Keyword::Lambda => Arity::Exactly(3),
            Keyword::Begin => Arity::AtLeast(1),
        };
        if !arity.accepts(form.len()) {
            return Err(SyntaxError::FormArity(keyword).into());
        }
        match keyword {
            Keyword::Quote => Ok(form[1].clone()),
            Keyword::If => self.evaluate_if(&form[1], &form[2], &form[3]),
            Keyword::Define => self.evaluate_define(&form[1], &form[2]),
            Keyword::Set => self.evaluate_set(&form[1], &form[2]),
            Keyword::Lambda => self.evaluate_lambda(&form[1], &form[2]),
            Keyword::Begin => self.evaluate_begin(&form[1..]),
        }
    }

    fn evaluate_if(&self, cond: &Expr, then: &Expr, otherwise: &Expr) -> Result<Expr, EvalError> {
        if self.evaluate(cond)?.is_truthy() {
            self.evaluate(then)
        } else {
            self.evaluate(otherwise)
        }
    }

    fn evaluate_define(&self, target: &Expr, value: &Expr) -> Result<Expr, EvalError> {
        let Expr::Symbol(key) = target else {
            return Err(SyntaxError::NotASymbol(Keyword::Define).into());
        };
        let value = self.evaluate(value)?;
        trace!(symbol = %key, "define");
        self.define(*key, value);
        Ok(Expr::Unspecified)
    }

    fn evaluate_set(&self, target: &Expr, value: &Expr) -> Result<Expr, EvalError> {
        let Expr::Symbol(key) = target else {
            return Err(SyntaxError::NotASymbol(Keyword::Set).into());
        };
        let value = self.evaluate(value)?;
        trace!(symbol = %key, "set!");
        self.assign(*key, value)?;
        Ok(Expr::Unspecified)
    }

    fn evaluate_lambda(&self, params: &Expr, body: &Expr) -> Result<Expr, EvalError> {
        let params = Params::from_spec(params)?;
        Ok(Expr::Closure(Rc::new(Closure {
            params,
            body: body.clone(),
            env: self.clone(),
        })))
    }

    fn evaluate_begin(&self, body: &[Expr]) -> Result<Expr, EvalError> {
        let mut out = Expr::Unspecified;
        for expr in body {
            out = self.evaluate(expr)?;
        }
        Ok(out)
    }
}

/// Evaluates `expr` in `env`.
pub fn eval(expr: &Expr, env: &Environment) -> Result<Expr, EvalError> {
    env.evaluate(expr)
}

/// Calls a procedure value with already evaluated arguments.
pub fn apply(proc: &Expr, args: Vec<Expr>) -> Result<Expr, EvalError> {
    match proc {
        Expr::Native(native) => native.call(args),
        Expr::Closure(closure) => closure.call(args),
        Expr::Unspecified => Err(EvalError::NotCallable("#<unspecified>".to_string())),
        stuff => Err(EvalError::NotCallable(stuff.to_string())),
    }
}

trait Callable {
    fn call(&self, args: Vec<Expr>) -> Result<Expr, EvalError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Fixed(Vec<Intern<String>>),
    /// A single symbol bound to the whole argument list.
    Variadic(Intern<String>),
}

impl Params {
    fn from_spec(spec: &Expr) -> Result<Self, EvalError> {
        match spec {
            Expr::Symbol(s) => Ok(Params::Variadic(*s)),
            Expr::List(items) => {
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Expr::Symbol(s) => names.push(*s),
                        other => return Err(SyntaxError::BadParameter(other.to_string()).into()),
                    }
                }
                Ok(Params::Fixed(names))
            }
            other => Err(SyntaxError::BadParameter(other.to_string()).into()),
        }
    }
}

/// A user-defined procedure: parameters, an unevaluated body and the scope
/// the `lambda` form was evaluated in.
pub struct Closure {
    params: Params,
    body: Expr,
    env: Environment,
}

impl Closure {
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    #[must_use]
    pub fn body(&self) -> &Expr {
        &self.body
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.params)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

impl Callable for Closure {
    fn call(&self, args: Vec<Expr>) -> Result<Expr, EvalError> {
        let env = self.env.extend();
        match &self.params {
            Params::Fixed(names) => {
                if names.len() != args.len() {
                    return Err(EvalError::Arity {
                        procedure: "lambda".to_string(),
                        expected: Arity::Exactly(names.len()),
                        actual: args.len(),
                    });
                }
                for (name, arg) in zip(names, args) {
                    env.define(*name, arg);
                }
            }
            Params::Variadic(name) => env.define(*name, Expr::List(args)),
        }
        debug!(body = %self.body, "apply closure");
        env.evaluate(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn intern_str(s: &str) -> Intern<String> {
        Intern::new(s.to_string())
    }

    #[test]
    fn test_environment() {
        let base = Environment::empty();
        base.define(intern_str("a"), Expr::Number(42.0));

        let child = base.extend();

        child.define(intern_str("a"), Expr::string("hello"));
        child.define(intern_str("b"), Expr::string("world"));

        assert_eq!(base.lookup(&intern_str("a")), Ok(Expr::Number(42.0)));
        assert_eq!(
            base.lookup(&intern_str("b")),
            Err(EvalError::UndefinedSymbol("b".to_string()))
        );
        assert_eq!(child.lookup(&intern_str("a")), Ok(Expr::string("hello")));
        assert_eq!(child.lookup(&intern_str("b")), Ok(Expr::string("world")));
    }

    #[test]
    fn test_assign_reaches_outer_scope() {
        let base = Environment::empty();
        base.define(intern_str("x"), Expr::Number(1.0));
        {
            let inner = base.extend().extend();
            inner.assign(intern_str("x"), Expr::Number(2.0)).unwrap();
            assert_eq!(inner.lookup(&intern_str("x")), Ok(Expr::Number(2.0)));
        }
        assert_eq!(base.lookup(&intern_str("x")), Ok(Expr::Number(2.0)));
        assert_eq!(
            base.assign(intern_str("y"), Expr::Number(0.0)),
            Err(EvalError::UndefinedSymbol("y".to_string()))
        );
    }

    #[test]
    fn test_define_shadows_locally() {
        let base = Environment::empty();
        base.define(intern_str("x"), Expr::Number(1.0));
        let inner = base.extend();
        inner.define(intern_str("x"), Expr::Number(5.0));
        inner.define(intern_str("x"), Expr::Number(6.0));
        assert_eq!(inner.lookup(&intern_str("x")), Ok(Expr::Number(6.0)));
        assert_eq!(base.lookup(&intern_str("x")), Ok(Expr::Number(1.0)));
    }

    fn validate(steps: Vec<(&str, Expr)>) {
        let env = new_env().extend();
        for (code, out) in steps {
            let expr = parse(code).unwrap();
            assert_eq!(
                env.evaluate(&expr),
                Ok(out.clone()),
                "we are testing that {} gives {}",
                code,
                out
            );
        }
    }

    fn list(items: &[f64]) -> Expr {
        Expr::List(items.iter().map(|n| Expr::Number(*n)).collect())
    }

    #[test]
    fn test_self_evaluating() {
        validate(vec![
            ("5", Expr::Number(5.0)),
            ("-2.5", Expr::Number(-2.5)),
            ("\"text\"", Expr::string("text")),
            ("#t", Expr::Bool(true)),
            ("#f", Expr::Bool(false)),
            ("()", Expr::List(vec![])),
        ]);
    }

    #[test]
    fn test_quote() {
        validate(vec![
            (
                "(quote (a b))",
                Expr::List(vec![Expr::symbol("a"), Expr::symbol("b")]),
            ),
            ("(quote undefined-name)", Expr::symbol("undefined-name")),
            ("(quote (+ 1 2))", Expr::List(vec![
                Expr::symbol("+"),
                Expr::Number(1.0),
                Expr::Number(2.0),
            ])),
        ]);
    }

    #[test]
    fn test_define_and_lookup() {
        validate(vec![
            ("(define x (+ 1 2))", Expr::Unspecified),
            ("x", Expr::Number(3.0)),
            ("(define x \"again\")", Expr::Unspecified),
            ("x", Expr::string("again")),
        ]);
    }

    #[test]
    fn test_if_truthiness() {
        validate(vec![
            ("(if #t 1 2)", Expr::Number(1.0)),
            ("(if #f 1 2)", Expr::Number(2.0)),
            ("(if 0 1 2)", Expr::Number(2.0)),
            ("(if 7 1 2)", Expr::Number(1.0)),
            ("(if () 1 2)", Expr::Number(2.0)),
            ("(if (list 0) 1 2)", Expr::Number(1.0)),
            ("(if \"\" 1 2)", Expr::Number(1.0)),
            ("(if (define y 1) 1 2)", Expr::Number(2.0)),
            ("(if #t 1 undefined)", Expr::Number(1.0)),
        ]);
    }

    #[test]
    fn test_lambda_application() {
        validate(vec![
            ("((lambda (n) (* n n)) 4)", Expr::Number(16.0)),
            ("(define square (lambda (n) (* n n)))", Expr::Unspecified),
            ("(square 4)", Expr::Number(16.0)),
            ("((lambda args args) 1 2 3)", list(&[1.0, 2.0, 3.0])),
            ("((lambda args args))", Expr::List(vec![])),
            ("((lambda () 42))", Expr::Number(42.0)),
        ]);
    }

    #[test]
    fn test_lexical_scoping() {
        validate(vec![
            ("(define n 100)", Expr::Unspecified),
            ("(define square (lambda (n) (* n n)))", Expr::Unspecified),
            ("(define call (lambda (n) (square 4)))", Expr::Unspecified),
            ("(call 7)", Expr::Number(16.0)),
            ("(define k 10)", Expr::Unspecified),
            ("(define add-k (lambda (x) (+ x k)))", Expr::Unspecified),
            ("(define shadow (lambda (k) (add-k 1)))", Expr::Unspecified),
            ("(shadow 1000)", Expr::Number(11.0)),
        ]);
    }

    #[test]
    fn test_closure_sees_later_definitions() {
        validate(vec![
            ("(define f (lambda (x) (+ a x)))", Expr::Unspecified),
            ("(define a 3)", Expr::Unspecified),
            ("(f 5)", Expr::Number(8.0)),
            ("(define a -17)", Expr::Unspecified),
            ("(f 3)", Expr::Number(-14.0)),
        ]);
    }

    #[test]
    fn test_shared_captured_scope() {
        validate(vec![
            (
                "(define make-counter
                   (lambda ()
                     (begin
                       (define count 0)
                       (lambda () (begin (set! count (+ count 1)) count)))))",
                Expr::Unspecified,
            ),
            ("(define c1 (make-counter))", Expr::Unspecified),
            ("(define c2 (make-counter))", Expr::Unspecified),
            ("(c1)", Expr::Number(1.0)),
            ("(c1)", Expr::Number(2.0)),
            ("(c2)", Expr::Number(1.0)),
        ]);
    }

    #[test]
    fn test_set_outer_binding() {
        validate(vec![
            ("(define counter 0)", Expr::Unspecified),
            (
                "(define bump (lambda () (set! counter (+ counter 1))))",
                Expr::Unspecified,
            ),
            ("(bump)", Expr::Unspecified),
            ("(bump)", Expr::Unspecified),
            ("counter", Expr::Number(2.0)),
        ]);
    }

    #[test]
    fn test_begin() {
        validate(vec![
            ("(begin 1 2 3)", Expr::Number(3.0)),
            ("(begin)", Expr::Unspecified),
            ("(begin (define z 4) (* z z))", Expr::Number(16.0)),
        ]);
    }

    #[test]
    fn test_recursion() {
        validate(vec![
            (
                "(define fact (lambda (n) (if (<= n 1) 1 (* n (fact (- n 1))))))",
                Expr::Unspecified,
            ),
            ("(fact 10)", Expr::Number(3628800.0)),
            (
                "(define fib (lambda (n) (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))))",
                Expr::Unspecified,
            ),
            ("(fib 13)", Expr::Number(233.0)),
        ]);
    }

    #[test]
    fn test_higher_order() {
        validate(vec![
            (
                "(define make-adder (lambda (n) (lambda (x) (+ x n))))",
                Expr::Unspecified,
            ),
            ("((make-adder 3) 7)", Expr::Number(10.0)),
            (
                "(define twice (lambda (f x) (f (f x))))",
                Expr::Unspecified,
            ),
            ("(twice (make-adder 5) 1)", Expr::Number(11.0)),
            ("(twice - 4)", Expr::Number(4.0)),
        ]);
    }

    fn eval_err(code: &str) -> EvalError {
        let env = new_env();
        env.evaluate(&parse(code).unwrap()).unwrap_err()
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            eval_err("undefined-thing"),
            EvalError::UndefinedSymbol("undefined-thing".to_string())
        );
        assert_eq!(
            eval_err("(foo 1 2)"),
            EvalError::UndefinedSymbol("foo".to_string())
        );
        assert_eq!(
            eval_err("(set! nowhere 1)"),
            EvalError::UndefinedSymbol("nowhere".to_string())
        );
        assert_eq!(
            eval_err("(1 2 3)"),
            EvalError::NotCallable("1".to_string())
        );
        assert!(matches!(eval_err("(+ 1 \"a\")"), EvalError::Type { .. }));
        assert_eq!(
            eval_err("((lambda (a b) (+ a b)) 1 2 3)"),
            EvalError::Arity {
                procedure: "lambda".to_string(),
                expected: Arity::Exactly(2),
                actual: 3,
            }
        );
    }

    #[test]
    fn test_special_form_syntax_errors() {
        assert_eq!(
            eval_err("(if #t 1)"),
            EvalError::Syntax(SyntaxError::FormArity(Keyword::If))
        );
        assert_eq!(
            eval_err("(quote)"),
            EvalError::Syntax(SyntaxError::FormArity(Keyword::Quote))
        );
        assert_eq!(
            eval_err("(define x)"),
            EvalError::Syntax(SyntaxError::FormArity(Keyword::Define))
        );
        assert_eq!(
            eval_err("(define 5 1)"),
            EvalError::Syntax(SyntaxError::NotASymbol(Keyword::Define))
        );
        assert_eq!(
            eval_err("(set! \"s\" 1)"),
            EvalError::Syntax(SyntaxError::NotASymbol(Keyword::Set))
        );
        assert_eq!(
            eval_err("(lambda (x 1) x)"),
            EvalError::Syntax(SyntaxError::BadParameter("1".to_string()))
        );
    }

    #[test]
    fn test_first_error_aborts_form() {
        let env = new_env().extend();
        env.evaluate(&parse("(define hits 0)").unwrap()).unwrap();
        let res = env.evaluate(&parse("(begin (set! hits 1) (car ()) (set! hits 2))").unwrap());
        assert!(res.is_err());
        assert_eq!(env.lookup(&intern_str("hits")), Ok(Expr::Number(1.0)));
    }

    #[test]
    fn test_arguments_evaluated_before_apply() {
        assert_eq!(
            eval_err("(1 undefined-name)"),
            EvalError::UndefinedSymbol("undefined-name".to_string())
        );

        let env = new_env().extend();
        env.evaluate(&parse("(define x 0)").unwrap()).unwrap();
        assert_eq!(
            env.evaluate(&parse("(1 (set! x 5))").unwrap()),
            Err(EvalError::NotCallable("1".to_string()))
        );
        assert_eq!(env.lookup(&intern_str("x")), Ok(Expr::Number(5.0)));
    }

    #[test]
    fn test_unspecified_is_not_callable() {
        let err = eval_err("((define y 1))");
        assert_eq!(err, EvalError::NotCallable("#<unspecified>".to_string()));
        assert_eq!(err.to_string(), "#<unspecified> is not callable");
    }

    #[test]
    fn test_closure_accessors() {
        let env = new_env();
        let Ok(Expr::Closure(closure)) = env.evaluate(&parse("(lambda (a b) (+ a b))").unwrap())
        else {
            panic!("lambda should produce a closure");
        };
        assert_eq!(
            closure.params(),
            &Params::Fixed(vec![intern_str("a"), intern_str("b")])
        );
        assert_eq!(closure.body().to_string(), "(+ a b)");
    }
}
