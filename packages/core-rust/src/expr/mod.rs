//! Embedded expression language used by custom operations.
//!
//! The engine is reached through two narrow traits so the operation executor
//! does not depend on a particular interpreter:
//!
//! - [`ExpressionEngine::compile`]: source text + [`EnvShape`] → [`Program`]
//! - [`Program::run`]: program + variable environment → value
//!
//! [`BuiltinEngine`] is the default implementation: a recursive-descent
//! parser ([`parser`]) whose AST is walked by [`eval`].

pub mod eval;
mod lexer;
pub mod parser;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::EngineError;
use crate::item::Data;

pub use parser::{BinaryOp, Expr, UnaryOp};

/// Failures raised while compiling or running an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("syntax error at offset {pos}: {message}")]
    Parse { pos: usize, message: String },
    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String },
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },
    #[error("type error: {message}")]
    Type { message: String },
    #[error("evaluation error: {message}")]
    Eval { message: String },
}

impl From<ExprError> for EngineError {
    fn from(err: ExprError) -> Self {
        EngineError::validation(format!("expression: {err}"))
    }
}

/// Structural description of an environment: variable names and the runtime
/// type of each value, without the values themselves.
///
/// Two environments with the same names and types share a signature, so a
/// program compiled for one can run against the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct EnvShape {
    vars: BTreeMap<String, &'static str>,
}

impl EnvShape {
    /// Captures the shape of `env`.
    #[must_use]
    pub fn of(env: &Data) -> Self {
        Self {
            vars: env
                .iter()
                .map(|(k, v)| (k.clone(), json_type(v)))
                .collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Stable text form, e.g. `input:map,source:map,total:int`.
    #[must_use]
    pub fn signature(&self) -> String {
        let mut out = String::new();
        for (i, (name, ty)) in self.vars.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(name);
            out.push(':');
            out.push_str(ty);
        }
        out
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// A compiled, reusable expression.
pub trait Program: Send + Sync + fmt::Debug {
    /// Source text the program was compiled from.
    fn source(&self) -> &str;

    /// Runs the program against `env`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExprError`] if evaluation fails.
    fn run(&self, env: &Data) -> Result<Value, ExprError>;
}

/// Compiles expression text into [`Program`]s.
pub trait ExpressionEngine: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Compiles `source` for environments of the given shape.
    ///
    /// # Errors
    ///
    /// Returns an [`ExprError`] on syntax errors or references to variables
    /// the shape does not define.
    fn compile(&self, source: &str, shape: &EnvShape) -> Result<Arc<dyn Program>, ExprError>;
}

/// Parsed expression ready to run.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    source: String,
    ast: Expr,
}

impl CompiledExpr {
    #[must_use]
    pub fn ast(&self) -> &Expr {
        &self.ast
    }
}

impl Program for CompiledExpr {
    fn source(&self) -> &str {
        &self.source
    }

    fn run(&self, env: &Data) -> Result<Value, ExprError> {
        eval::evaluate(&self.ast, env)
    }
}

/// Default [`ExpressionEngine`] backed by this module's parser and interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEngine;

impl ExpressionEngine for BuiltinEngine {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn compile(&self, source: &str, shape: &EnvShape) -> Result<Arc<dyn Program>, ExprError> {
        let ast = parser::parse(source)?;
        if let Some(name) = ast.free_variables().into_iter().find(|v| !shape.contains(v)) {
            return Err(ExprError::UnknownVariable { name });
        }
        collect_unknown_functions(&ast)?;
        tracing::trace!(expression = source, "compiled expression");
        Ok(Arc::new(CompiledExpr {
            source: source.to_string(),
            ast,
        }))
    }
}

fn collect_unknown_functions(expr: &Expr) -> Result<(), ExprError> {
    match expr {
        Expr::Call(name, args) => {
            if !eval::BUILTINS.contains(&name.as_str()) {
                return Err(ExprError::UnknownFunction { name: name.clone() });
            }
            args.iter().try_for_each(collect_unknown_functions)
        }
        Expr::Literal(_) | Expr::Ident(_) => Ok(()),
        Expr::Member(e, _) | Expr::Unary(_, e) => collect_unknown_functions(e),
        Expr::Index(a, b) | Expr::Binary(_, a, b) => {
            collect_unknown_functions(a)?;
            collect_unknown_functions(b)
        }
        Expr::Ternary(c, a, b) => {
            collect_unknown_functions(c)?;
            collect_unknown_functions(a)?;
            collect_unknown_functions(b)
        }
        Expr::Array(items) => items.iter().try_for_each(collect_unknown_functions),
    }
}
