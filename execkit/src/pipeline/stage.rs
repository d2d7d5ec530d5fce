//! Stage entries for the type-erased pipeline core.

use crate::errors::{ExecError, ExecutionResult};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

/// The value handle passed between stages.
///
/// Carries the concrete type name of its payload so a miscomposed chain
/// can report what it actually received, not just what was expected.
pub(crate) struct ErasedValue {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl ErasedValue {
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// A stage body over the erased value handle.
pub(crate) type StageFn =
    Arc<dyn Fn(ErasedValue) -> ExecutionResult<ErasedValue> + Send + Sync>;

/// The kind of work a stage performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Pure mapping from one value kind to another.
    Transform,
    /// Guarded mapping; identity when the guard evaluates false.
    ConditionalTransform,
    /// Guard with a failure message; halts execution on false.
    Validation,
}

/// A named, ordered unit of a pipeline. Immutable once added.
#[derive(Clone)]
pub(crate) struct StageEntry {
    pub name: String,
    pub kind: StageKind,
    pub apply: StageFn,
}

impl std::fmt::Debug for StageEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Recovers a typed value from the erased handle.
///
/// The typed builder guarantees this succeeds; a failure means the stage
/// chain was miscomposed and surfaces as a composition error rather than
/// an unchecked cast.
pub(crate) fn downcast<T: 'static>(stage: &str, value: ErasedValue) -> ExecutionResult<T> {
    let actual = value.type_name;
    value
        .value
        .downcast::<T>()
        .map(|b| *b)
        .map_err(|_| ExecError::Composition {
            stage: stage.to_string(),
            expected: std::any::type_name::<T>(),
            actual,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_success() {
        let value = ErasedValue::new(42_i32);
        let n: i32 = downcast("stage", value).unwrap();
        assert_eq!(n, 42);
    }

    #[test]
    fn test_downcast_mismatch_is_composition_error() {
        let value = ErasedValue::new("not a number".to_string());
        let result: ExecutionResult<i32> = downcast("parse", value);

        match result {
            Err(ExecError::Composition {
                stage,
                expected,
                actual,
            }) => {
                assert_eq!(stage, "parse");
                assert_eq!(expected, std::any::type_name::<i32>());
                assert_eq!(actual, std::any::type_name::<String>());
            }
            other => panic!("expected composition error, got {other:?}"),
        }
    }

    #[test]
    fn test_stage_kind_serialization() {
        let json = serde_json::to_value(StageKind::ConditionalTransform).unwrap();
        assert_eq!(json, "conditional_transform");
    }
}
