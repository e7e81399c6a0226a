//! Deferred references and command arguments that may contain them

use allocative::Allocative;
use starlark::values::list::ListRef;
use starlark::values::{AllocValue, Heap, ProvidesStaticType, StarlarkValue, Value, ValueLike};
use starlark_derive::{starlark_value, NoSerialize};
use std::fmt::{self, Display};
use stevedore_errors::ExecutionError;
use stevedore_types::Deferred;

/// Script-side handle to the output of a capture step
#[derive(Debug, Clone, ProvidesStaticType, NoSerialize, Allocative)]
pub struct DeferredRef {
    #[allocative(skip)]
    cell: Deferred,
}

impl DeferredRef {
    #[must_use]
    pub fn new(cell: Deferred) -> Self {
        Self { cell }
    }

    #[must_use]
    pub fn cell(&self) -> &Deferred {
        &self.cell
    }
}

impl Display for DeferredRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<deferred {}>", self.cell.name())
    }
}

#[starlark_value(type = "deferred")]
impl<'v> StarlarkValue<'v> for DeferredRef {}

impl<'v> AllocValue<'v> for DeferredRef {
    fn alloc_value(self, heap: &'v Heap) -> Value<'v> {
        heap.alloc_simple(self)
    }
}

/// One command argument: literal now, or filled in when the step runs
#[derive(Debug, Clone)]
pub enum CommandArg {
    Literal(String),
    Deferred(Deferred),
}

impl CommandArg {
    /// Convert a script value into an argument
    ///
    /// # Errors
    ///
    /// Fails for anything other than a string or deferred reference.
    pub fn from_value(value: Value<'_>) -> anyhow::Result<Self> {
        if let Some(s) = value.unpack_str() {
            return Ok(Self::Literal(s.to_string()));
        }
        if let Some(deferred) = value.downcast_ref::<DeferredRef>() {
            return Ok(Self::Deferred(deferred.cell().clone()));
        }
        Err(anyhow::anyhow!(
            "arguments must be strings or deferred values, got {}",
            value.get_type()
        ))
    }

    /// Current value of the argument
    ///
    /// # Errors
    ///
    /// Returns `DeferredNotResolved` if the producing step has not run.
    pub fn resolve(&self) -> Result<String, ExecutionError> {
        match self {
            Self::Literal(s) => Ok(s.clone()),
            Self::Deferred(cell) => cell.get(),
        }
    }
}

impl From<&str> for CommandArg {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

/// Unpack an optional `args` parameter: `None`, a single value or a list
///
/// # Errors
///
/// Fails on elements that are neither strings nor deferred values.
pub fn unpack_args(value: Option<Value<'_>>) -> anyhow::Result<Vec<CommandArg>> {
    let Some(value) = value.filter(|v| !v.is_none()) else {
        return Ok(Vec::new());
    };
    match ListRef::from_value(value) {
        Some(list) => list.iter().map(CommandArg::from_value).collect(),
        None => Ok(vec![CommandArg::from_value(value)?]),
    }
}

/// Resolve every argument, failing on the first pending one
///
/// # Errors
///
/// Returns `DeferredNotResolved` for a reference whose step has not run.
pub fn resolve_args(args: &[CommandArg]) -> Result<Vec<String>, ExecutionError> {
    args.iter().map(CommandArg::resolve).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_reference_fails_to_resolve() {
        let cell = Deferred::new("Shell.Capture");
        let args = vec![CommandArg::from("push"), CommandArg::Deferred(cell.clone())];

        assert!(matches!(
            resolve_args(&args),
            Err(ExecutionError::DeferredNotResolved { name }) if name == "Shell.Capture"
        ));

        cell.resolve("v1.2.3".into()).unwrap();
        assert_eq!(resolve_args(&args).unwrap(), vec!["push", "v1.2.3"]);
    }
}
