//! Hash Generator Module
//!
//! Turns predicate and selector lambdas into canonical text for cache keys.
//!
//! Canonicalization runs three passes over the tree:
//! 1. partial evaluation: every subtree that does not read the bound parameter
//!    is evaluated and replaced by its constant value (captured locals,
//!    arithmetic on constants, member reads on captured records);
//! 2. local collection expansion: `[..].Contains(x.F)` over a constant list
//!    becomes an `OrElse` chain of equalities over the sorted, de-duplicated list;
//! 3. rendering with the parameter normalized to a fixed name.
//!
//! Anything that cannot go through these passes is rejected with
//! `UnsupportedExpression` rather than rendered unstably.

use sha2::{Digest, Sha256};

use crate::error::{RepositoryError, Result};
use crate::expr::{Expr, Lambda, Method, Predicate, Scope, Selector, UnaryOp, Value};

/// Name the bound parameter is rendered under.
const CANONICAL_PARAM: &str = "x";

// == Hash Generator ==
/// Stateless canonicalizer for expression lambdas.
pub struct HashGenerator;

impl HashGenerator {
    /// Canonical text of a filter, or `None` when there is no filter.
    pub fn from_predicate(predicate: Option<&Predicate>) -> Result<Option<String>> {
        predicate.map(Self::canonicalize).transpose()
    }

    /// Canonical text of a projection, or `None` for the identity projection.
    pub fn from_selector(selector: Option<&Selector>) -> Result<Option<String>> {
        selector.map(Self::canonicalize).transpose()
    }

    /// Runs all canonicalization passes over one lambda.
    pub fn canonicalize(lambda: &Lambda) -> Result<String> {
        let evaluated = partial_eval(lambda.body(), lambda.param())?;
        let expanded = expand_local_collections(evaluated, lambda.param());
        let normalized = expanded.rebind(lambda.param(), CANONICAL_PARAM);
        Ok(format!("{} => {}", CANONICAL_PARAM, render(&normalized)?))
    }

    /// SHA-256 hex digest of arbitrary text.
    pub fn digest(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }
}

// == Partial Evaluation ==
fn partial_eval(expr: &Expr, param: &str) -> Result<Expr> {
    if !expr.references(param) {
        return match expr {
            Expr::Const(_) => Ok(expr.clone()),
            _ => expr.evaluate(&Scope::empty()).map(Expr::Const).map_err(|e| {
                RepositoryError::UnsupportedExpression(format!(
                    "cannot evaluate constant subtree: {}",
                    e
                ))
            }),
        };
    }

    Ok(match expr {
        Expr::Member(target, name) => {
            Expr::Member(Box::new(partial_eval(target, param)?), name.clone())
        }
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: Box::new(partial_eval(left, param)?),
            right: Box::new(partial_eval(right, param)?),
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op: *op,
            operand: Box::new(partial_eval(operand, param)?),
        },
        Expr::Call {
            method,
            target,
            args,
        } => Expr::Call {
            method: *method,
            target: Box::new(partial_eval(target, param)?),
            args: args
                .iter()
                .map(|a| partial_eval(a, param))
                .collect::<Result<Vec<_>>>()?,
        },
        Expr::Record(fields) => Expr::Record(
            fields
                .iter()
                .map(|(k, e)| Ok((k.clone(), partial_eval(e, param)?)))
                .collect::<Result<Vec<_>>>()?,
        ),
        Expr::Opaque { func, arg } => Expr::Opaque {
            func: func.clone(),
            arg: Box::new(partial_eval(arg, param)?),
        },
        // Param, Const and Local cannot reach here with a parameter reference
        // except Param itself.
        other => other.clone(),
    })
}

// == Local Collection Expansion ==
fn expand_local_collections(expr: Expr, param: &str) -> Expr {
    match expr {
        Expr::Call {
            method: Method::Contains,
            target,
            args,
        } if args.len() == 1 && args[0].references(param) => match *target {
            Expr::Const(Value::List(items)) => expand_contains(items, args, param),
            target => Expr::Call {
                method: Method::Contains,
                target: Box::new(expand_local_collections(target, param)),
                args: args
                    .into_iter()
                    .map(|a| expand_local_collections(a, param))
                    .collect(),
            },
        },
        Expr::Member(target, name) => {
            Expr::Member(Box::new(expand_local_collections(*target, param)), name)
        }
        Expr::Binary { op, left, right } => Expr::Binary {
            op,
            left: Box::new(expand_local_collections(*left, param)),
            right: Box::new(expand_local_collections(*right, param)),
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op,
            operand: Box::new(expand_local_collections(*operand, param)),
        },
        Expr::Call {
            method,
            target,
            args,
        } => Expr::Call {
            method,
            target: Box::new(expand_local_collections(*target, param)),
            args: args
                .into_iter()
                .map(|a| expand_local_collections(a, param))
                .collect(),
        },
        Expr::Record(fields) => Expr::Record(
            fields
                .into_iter()
                .map(|(k, e)| (k, expand_local_collections(e, param)))
                .collect(),
        ),
        Expr::Opaque { func, arg } => Expr::Opaque {
            func,
            arg: Box::new(expand_local_collections(*arg, param)),
        },
        other => other,
    }
}

/// `[v..].Contains(item)` as `(item == v1) OrElse (item == v2) ...` over sorted, unique values.
fn expand_contains(mut items: Vec<Value>, mut args: Vec<Expr>, param: &str) -> Expr {
    let Some(item) = args.pop() else {
        return Expr::Const(Value::Bool(false));
    };
    let item = expand_local_collections(item, param);
    // Numeric equality makes `1` and `1.0` equal; the text tie-break keeps
    // the survivor of `dedup` independent of input order.
    items.sort_by(|a, b| a.cmp(b).then_with(|| a.to_string().cmp(&b.to_string())));
    items.dedup();
    items
        .into_iter()
        .map(|v| item.clone().eq(Expr::Const(v)))
        .reduce(|acc, next| acc.or_else(next))
        .unwrap_or(Expr::Const(Value::Bool(false)))
}

// == Rendering ==
fn render(expr: &Expr) -> Result<String> {
    Ok(match expr {
        Expr::Param(name) => name.clone(),
        Expr::Member(target, name) => format!("{}.{}", render(target)?, name),
        Expr::Const(value) => value.to_string(),
        Expr::Local { name, .. } => {
            return Err(RepositoryError::UnsupportedExpression(format!(
                "captured local '{}' was not evaluated",
                name
            )))
        }
        Expr::Binary { op, left, right } => {
            format!("({} {} {})", render(left)?, op.symbol(), render(right)?)
        }
        Expr::Unary {
            op: UnaryOp::Not,
            operand,
        } => format!("Not({})", render(operand)?),
        Expr::Unary {
            op: UnaryOp::Negate,
            operand,
        } => format!("-({})", render(operand)?),
        Expr::Call {
            method,
            target,
            args,
        } => {
            let args = args.iter().map(render).collect::<Result<Vec<_>>>()?;
            format!("{}.{}({})", render(target)?, method.name(), args.join(", "))
        }
        Expr::Record(fields) => {
            let mut rendered = fields
                .iter()
                .map(|(k, e)| Ok(format!("{:?} = {}", k, render(e)?)))
                .collect::<Result<Vec<_>>>()?;
            rendered.sort();
            format!("new {{{}}}", rendered.join(", "))
        }
        Expr::Opaque { func, .. } => {
            return Err(RepositoryError::UnsupportedExpression(format!(
                "opaque function '{}' has no canonical form",
                func.label
            )))
        }
    })
}
