//! Expression Node Module
//!
//! Inspectable expression tree for filter predicates and projections, with
//! fluent builders and an evaluator.

use std::fmt;
use std::sync::Arc;

use crate::error::{RepositoryError, Result};
use crate::expr::Value;

// == Operators ==
/// Binary operators.
///
/// `And`/`Or` evaluate both operands; `AndAlso`/`OrElse` short-circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    AndAlso,
    OrElse,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "And",
            BinaryOp::Or => "Or",
            BinaryOp::AndAlso => "AndAlso",
            BinaryOp::OrElse => "OrElse",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// Methods callable on a target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// List membership, or substring test on strings
    Contains,
    StartsWith,
    EndsWith,
    ToLower,
    ToUpper,
    Length,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::Contains => "Contains",
            Method::StartsWith => "StartsWith",
            Method::EndsWith => "EndsWith",
            Method::ToLower => "ToLower",
            Method::ToUpper => "ToUpper",
            Method::Length => "Length",
        }
    }
}

/// Host closure embedded in an expression.
///
/// It evaluates fine but has no canonical form, so expressions containing it
/// are never cached.
#[derive(Clone)]
pub struct OpaqueFn {
    pub label: String,
    pub func: Arc<dyn Fn(&Value) -> Value + Send + Sync>,
}

impl fmt::Debug for OpaqueFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueFn").field("label", &self.label).finish()
    }
}

// == Expr ==
/// Expression tree node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// The lambda's bound parameter, by name
    Param(String),
    /// Member access, e.g. `x.Name`
    Member(Box<Expr>, String),
    Const(Value),
    /// A captured local variable, e.g. the `v` in `{ let v = 5; x.Id == v }`
    Local { name: String, value: Value },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Call {
        method: Method,
        target: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Anonymous record construction, e.g. `new { x.Id, x.Name }`
    Record(Vec<(String, Expr)>),
    Opaque { func: OpaqueFn, arg: Box<Expr> },
}

// == Builders ==
impl Expr {
    pub fn param(name: impl Into<String>) -> Self {
        Expr::Param(name.into())
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Const(value.into())
    }

    pub fn local(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Expr::Local {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Expr)>,
        K: Into<String>,
    {
        Expr::Record(fields.into_iter().map(|(k, e)| (k.into(), e)).collect())
    }

    /// Wraps a host closure; see [`OpaqueFn`].
    pub fn opaque<F>(label: impl Into<String>, arg: Expr, func: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Expr::Opaque {
            func: OpaqueFn {
                label: label.into(),
                func: Arc::new(func),
            },
            arg: Box::new(arg),
        }
    }

    pub fn member(self, name: impl Into<String>) -> Self {
        Expr::Member(Box::new(self), name.into())
    }

    pub fn binary(self, op: BinaryOp, right: impl Into<Expr>) -> Self {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right.into()),
        }
    }

    pub fn eq(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    pub fn ne(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, right)
    }

    pub fn lt(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, right)
    }

    pub fn le(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, right)
    }

    pub fn gt(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, right)
    }

    pub fn ge(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, right)
    }

    pub fn plus(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Add, right)
    }

    pub fn minus(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Sub, right)
    }

    pub fn times(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Mul, right)
    }

    pub fn divided_by(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Div, right)
    }

    pub fn and(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, right)
    }

    pub fn or(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, right)
    }

    pub fn and_also(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::AndAlso, right)
    }

    pub fn or_else(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::OrElse, right)
    }

    pub fn not(self) -> Self {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }

    pub fn negate(self) -> Self {
        Expr::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(self),
        }
    }

    pub fn call(self, method: Method, args: Vec<Expr>) -> Self {
        Expr::Call {
            method,
            target: Box::new(self),
            args,
        }
    }

    /// `self.Contains(item)`; `self` is usually a list.
    pub fn contains(self, item: impl Into<Expr>) -> Self {
        self.call(Method::Contains, vec![item.into()])
    }

    pub fn starts_with(self, prefix: impl Into<Expr>) -> Self {
        self.call(Method::StartsWith, vec![prefix.into()])
    }

    pub fn ends_with(self, suffix: impl Into<Expr>) -> Self {
        self.call(Method::EndsWith, vec![suffix.into()])
    }

    pub fn to_lower(self) -> Self {
        self.call(Method::ToLower, Vec::new())
    }

    pub fn to_upper(self) -> Self {
        self.call(Method::ToUpper, Vec::new())
    }

    pub fn length(self) -> Self {
        self.call(Method::Length, Vec::new())
    }

    // == Inspection ==
    /// True when the subtree reads the parameter named `param`.
    pub fn references(&self, param: &str) -> bool {
        match self {
            Expr::Param(name) => name == param,
            Expr::Member(target, _) => target.references(param),
            Expr::Const(_) | Expr::Local { .. } => false,
            Expr::Binary { left, right, .. } => left.references(param) || right.references(param),
            Expr::Unary { operand, .. } => operand.references(param),
            Expr::Call { target, args, .. } => {
                target.references(param) || args.iter().any(|a| a.references(param))
            }
            Expr::Record(fields) => fields.iter().any(|(_, e)| e.references(param)),
            Expr::Opaque { arg, .. } => arg.references(param),
        }
    }

    /// Renames parameter `from` to `to` throughout the tree.
    pub fn rebind(&self, from: &str, to: &str) -> Expr {
        match self {
            Expr::Param(name) if name == from => Expr::Param(to.to_string()),
            Expr::Param(_) | Expr::Const(_) | Expr::Local { .. } => self.clone(),
            Expr::Member(target, name) => Expr::Member(Box::new(target.rebind(from, to)), name.clone()),
            Expr::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: Box::new(left.rebind(from, to)),
                right: Box::new(right.rebind(from, to)),
            },
            Expr::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: Box::new(operand.rebind(from, to)),
            },
            Expr::Call {
                method,
                target,
                args,
            } => Expr::Call {
                method: *method,
                target: Box::new(target.rebind(from, to)),
                args: args.iter().map(|a| a.rebind(from, to)).collect(),
            },
            Expr::Record(fields) => Expr::Record(
                fields
                    .iter()
                    .map(|(k, e)| (k.clone(), e.rebind(from, to)))
                    .collect(),
            ),
            Expr::Opaque { func, arg } => Expr::Opaque {
                func: func.clone(),
                arg: Box::new(arg.rebind(from, to)),
            },
        }
    }

    // == Evaluation ==
    /// Evaluates the expression with `scope` providing the bound parameter.
    pub fn evaluate(&self, scope: &Scope<'_>) -> Result<Value> {
        match self {
            Expr::Param(name) => match scope.binding {
                Some((param, entity)) if param == name => entity.as_value(),
                _ => Err(RepositoryError::Evaluation(format!(
                    "parameter '{}' is not bound",
                    name
                ))),
            },
            Expr::Member(target, field) => {
                // Field reads on the parameter go straight to the entity.
                if let (Expr::Param(name), Some((param, entity))) = (target.as_ref(), scope.binding) {
                    if name == param {
                        return entity.field(field).ok_or_else(|| {
                            RepositoryError::Evaluation(format!("unknown field '{}'", field))
                        });
                    }
                }
                let value = target.evaluate(scope)?;
                value.member(field).cloned().ok_or_else(|| {
                    RepositoryError::Evaluation(format!(
                        "no member '{}' on {} value",
                        field,
                        value.type_name()
                    ))
                })
            }
            Expr::Const(value) => Ok(value.clone()),
            Expr::Local { value, .. } => Ok(value.clone()),
            Expr::Binary { op, left, right } => eval_binary(*op, left, right, scope),
            Expr::Unary { op, operand } => {
                let value = operand.evaluate(scope)?;
                match (op, value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Negate, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| RepositoryError::Evaluation("integer overflow".into())),
                    (UnaryOp::Negate, Value::Float(x)) => Ok(Value::Float(-x)),
                    (op, v) => Err(RepositoryError::Evaluation(format!(
                        "cannot apply {:?} to {}",
                        op,
                        v.type_name()
                    ))),
                }
            }
            Expr::Call {
                method,
                target,
                args,
            } => {
                let target = target.evaluate(scope)?;
                let args = args
                    .iter()
                    .map(|a| a.evaluate(scope))
                    .collect::<Result<Vec<_>>>()?;
                call_method(*method, &target, &args)
            }
            Expr::Record(fields) => {
                let mut record = std::collections::BTreeMap::new();
                for (name, expr) in fields {
                    record.insert(name.clone(), expr.evaluate(scope)?);
                }
                Ok(Value::Record(record))
            }
            Expr::Opaque { func, arg } => {
                let arg = arg.evaluate(scope)?;
                Ok((func.func)(&arg))
            }
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Const(value)
    }
}

impl From<i32> for Expr {
    fn from(v: i32) -> Self {
        Expr::Const(v.into())
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Expr::Const(v.into())
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Const(v.into())
    }
}

impl From<bool> for Expr {
    fn from(v: bool) -> Self {
        Expr::Const(v.into())
    }
}

impl From<&str> for Expr {
    fn from(v: &str) -> Self {
        Expr::Const(v.into())
    }
}

impl From<String> for Expr {
    fn from(v: String) -> Self {
        Expr::Const(v.into())
    }
}

// == Scope ==
/// Anything whose named fields an expression can read.
pub trait FieldAccess {
    fn field(&self, name: &str) -> Option<Value>;

    /// The whole object as a value; used when the bare parameter is selected.
    fn as_value(&self) -> Result<Value> {
        Err(RepositoryError::Evaluation(
            "entity cannot be converted to a value".into(),
        ))
    }
}

/// Evaluation environment: at most one bound parameter.
#[derive(Clone, Copy, Default)]
pub struct Scope<'a> {
    binding: Option<(&'a str, &'a dyn FieldAccess)>,
}

impl<'a> Scope<'a> {
    /// Scope with no bound parameter, for constant subtrees.
    pub fn empty() -> Self {
        Self { binding: None }
    }

    pub fn bind(param: &'a str, entity: &'a dyn FieldAccess) -> Self {
        Self {
            binding: Some((param, entity)),
        }
    }
}

// == Operator Semantics ==
fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, scope: &Scope<'_>) -> Result<Value> {
    match op {
        BinaryOp::AndAlso => {
            if !expect_bool(left.evaluate(scope)?, op)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(expect_bool(right.evaluate(scope)?, op)?))
        }
        BinaryOp::OrElse => {
            if expect_bool(left.evaluate(scope)?, op)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(expect_bool(right.evaluate(scope)?, op)?))
        }
        _ => {
            let l = left.evaluate(scope)?;
            let r = right.evaluate(scope)?;
            apply_binary(op, l, r)
        }
    }
}

/// Applies a non-short-circuit operator to two evaluated operands.
pub(crate) fn apply_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(l == r)),
        BinaryOp::Ne => Ok(Value::Bool(l != r)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            // Ordered comparisons against null are false, like lifted operators.
            if l.is_null() || r.is_null() {
                return Ok(Value::Bool(false));
            }
            let ord = l.cmp(&r);
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }))
        }
        BinaryOp::And => Ok(Value::Bool(expect_bool(l, op)? & expect_bool(r, op)?)),
        BinaryOp::Or => Ok(Value::Bool(expect_bool(l, op)? | expect_bool(r, op)?)),
        BinaryOp::AndAlso | BinaryOp::OrElse => {
            let l = expect_bool(l, op)?;
            let r = expect_bool(r, op)?;
            Ok(Value::Bool(if op == BinaryOp::AndAlso { l && r } else { l || r }))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, l, r)
        }
    }
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div => a.checked_div(b),
                _ => a.checked_rem(b),
            };
            result.map(Value::Int).ok_or_else(|| {
                RepositoryError::Evaluation(format!("integer overflow or division by zero in {} {} {}", a, op.symbol(), b))
            })
        }
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::Str(a + &b)),
        (l, r) => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            })),
            _ => Err(RepositoryError::Evaluation(format!(
                "cannot apply '{}' to {} and {}",
                op.symbol(),
                l.type_name(),
                r.type_name()
            ))),
        },
    }
}

fn expect_bool(value: Value, op: BinaryOp) -> Result<bool> {
    value.as_bool().ok_or_else(|| {
        RepositoryError::Evaluation(format!(
            "operator '{}' expects bool, got {}",
            op.symbol(),
            value.type_name()
        ))
    })
}

/// Applies a method to evaluated target and arguments.
pub(crate) fn call_method(method: Method, target: &Value, args: &[Value]) -> Result<Value> {
    let arg = |i: usize| {
        args.get(i).ok_or_else(|| {
            RepositoryError::Evaluation(format!("{} expects {} argument(s)", method.name(), i + 1))
        })
    };
    match (method, target) {
        (Method::Contains, Value::List(items)) => {
            let item = arg(0)?;
            Ok(Value::Bool(items.iter().any(|v| v == item)))
        }
        (Method::Contains, Value::Str(s)) => match arg(0)? {
            Value::Str(needle) => Ok(Value::Bool(s.contains(needle.as_str()))),
            other => Err(mismatch(method, other)),
        },
        (Method::StartsWith, Value::Str(s)) => match arg(0)? {
            Value::Str(p) => Ok(Value::Bool(s.starts_with(p.as_str()))),
            other => Err(mismatch(method, other)),
        },
        (Method::EndsWith, Value::Str(s)) => match arg(0)? {
            Value::Str(p) => Ok(Value::Bool(s.ends_with(p.as_str()))),
            other => Err(mismatch(method, other)),
        },
        (Method::ToLower, Value::Str(s)) => Ok(Value::Str(s.to_lowercase())),
        (Method::ToUpper, Value::Str(s)) => Ok(Value::Str(s.to_uppercase())),
        (Method::Length, Value::Str(s)) => Ok(Value::Int(s.chars().count() as i64)),
        (Method::Length, Value::List(items)) => Ok(Value::Int(items.len() as i64)),
        // Null-safe string predicates
        (Method::Contains | Method::StartsWith | Method::EndsWith, Value::Null) => {
            Ok(Value::Bool(false))
        }
        (_, other) => Err(mismatch(method, other)),
    }
}

fn mismatch(method: Method, value: &Value) -> RepositoryError {
    RepositoryError::Evaluation(format!(
        "{} is not defined for {}",
        method.name(),
        value.type_name()
    ))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        id: i64,
        name: &'static str,
    }

    impl FieldAccess for Row {
        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "Id" => Some(Value::Int(self.id)),
                "Name" => Some(Value::Str(self.name.to_string())),
                _ => None,
            }
        }
    }

    fn x() -> Expr {
        Expr::param("x")
    }

    fn eval(expr: &Expr, row: &Row) -> Result<Value> {
        expr.evaluate(&Scope::bind("x", row))
    }

    #[test]
    fn test_field_comparison() {
        let row = Row { id: 7, name: "Ann" };
        assert_eq!(eval(&x().member("Id").eq(7), &row).unwrap(), Value::Bool(true));
        assert_eq!(eval(&x().member("Id").gt(7), &row).unwrap(), Value::Bool(false));
        assert_eq!(
            eval(&x().member("Name").starts_with("A"), &row).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_unknown_field_is_error() {
        let row = Row { id: 1, name: "a" };
        let result = eval(&x().member("Missing").eq(1), &row);
        assert!(matches!(result, Err(RepositoryError::Evaluation(_))));
    }

    #[test]
    fn test_short_circuit_skips_right_side() {
        let row = Row { id: 1, name: "a" };
        // Right side would fail: unknown field.
        let expr = x().member("Id").eq(2).and_also(x().member("Missing").eq(1));
        assert_eq!(eval(&expr, &row).unwrap(), Value::Bool(false));

        let strict = x().member("Id").eq(2).and(x().member("Missing").eq(1));
        assert!(eval(&strict, &row).is_err());
    }

    #[test]
    fn test_list_contains() {
        let row = Row { id: 3, name: "a" };
        let expr = Expr::constant(vec![1, 2, 3]).contains(x().member("Id"));
        assert_eq!(eval(&expr, &row).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_arithmetic_and_overflow() {
        let scope = Scope::empty();
        let sum = Expr::constant(2).plus(3).times(2);
        assert_eq!(sum.evaluate(&scope).unwrap(), Value::Int(10));

        let div = Expr::constant(1).divided_by(0);
        assert!(div.evaluate(&scope).is_err());

        let mixed = Expr::constant(1).plus(0.5);
        assert_eq!(mixed.evaluate(&scope).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_references_and_rebind() {
        let expr = Expr::param("y").member("Id").eq(Expr::local("v", 3));
        assert!(expr.references("y"));
        assert!(!expr.references("x"));

        let rebound = expr.rebind("y", "x");
        assert!(rebound.references("x"));
        assert!(!rebound.references("y"));
    }

    #[test]
    fn test_unbound_parameter_is_error() {
        let expr = Expr::param("z").member("Id");
        assert!(expr.evaluate(&Scope::empty()).is_err());
    }

    #[test]
    fn test_null_ordering_is_false() {
        let scope = Scope::empty();
        let expr = Expr::constant(Value::Null).lt(5);
        assert_eq!(expr.evaluate(&scope).unwrap(), Value::Bool(false));
    }
}
