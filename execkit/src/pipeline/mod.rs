//! Staged transformation pipelines.
//!
//! A [`Pipeline<In, Out>`] is an immutable, ordered sequence of typed
//! stages over one value. Builder calls never mutate the receiver: each
//! combinator returns a new definition, so a partially built pipeline can
//! branch into several variants. Internally values travel as erased
//! handles with a checked downcast at every boundary; the typed builder
//! makes a mismatch unrepresentable, and the runtime check fails with a
//! composition error rather than miscasting.

mod stage;

pub use stage::StageKind;

use crate::errors::{BoxError, ExecError, ExecutionResult};
use crate::spec::Spec;
use stage::{downcast, ErasedValue, StageEntry};
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

/// An immutable pipeline definition from `In` to `Out`.
pub struct Pipeline<In, Out> {
    stages: Vec<StageEntry>,
    _marker: PhantomData<fn(In) -> Out>,
}

impl<In, Out> Clone for Pipeline<In, Out> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
            _marker: PhantomData,
        }
    }
}

impl<In, Out> std::fmt::Debug for Pipeline<In, Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages)
            .finish()
    }
}

impl<T: Send + 'static> Pipeline<T, T> {
    /// Creates an empty identity pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<T: Send + 'static> Default for Pipeline<T, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<In, Out> Pipeline<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    fn push(&self, entry: StageEntry) -> Vec<StageEntry> {
        let mut stages = self.stages.clone();
        stages.push(entry);
        stages
    }

    /// Appends an infallible transform stage.
    ///
    /// Returns a new definition parameterized on the stage's output type;
    /// the receiver is unchanged and remains reusable.
    #[must_use]
    pub fn stage<U, F>(&self, name: impl Into<String>, transform: F) -> Pipeline<In, U>
    where
        U: Send + 'static,
        F: Fn(Out) -> U + Send + Sync + 'static,
    {
        let name = name.into();
        let stage_name = name.clone();
        let apply = Arc::new(move |value: ErasedValue| {
            let input: Out = downcast(&stage_name, value)?;
            Ok(ErasedValue::new(transform(input)))
        });

        Pipeline {
            stages: self.push(StageEntry {
                name,
                kind: StageKind::Transform,
                apply,
            }),
            _marker: PhantomData,
        }
    }

    /// Appends a fallible transform stage.
    ///
    /// An `Err` from the stage body halts execution as a transform
    /// failure carrying the original error as its cause.
    #[must_use]
    pub fn try_stage<U, F>(&self, name: impl Into<String>, transform: F) -> Pipeline<In, U>
    where
        U: Send + 'static,
        F: Fn(Out) -> Result<U, BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        let stage_name = name.clone();
        let apply = Arc::new(move |value: ErasedValue| {
            let input: Out = downcast(&stage_name, value)?;
            match transform(input) {
                Ok(output) => Ok(ErasedValue::new(output)),
                Err(source) => Err(ExecError::transform(stage_name.clone(), source)),
            }
        });

        Pipeline {
            stages: self.push(StageEntry {
                name,
                kind: StageKind::Transform,
                apply,
            }),
            _marker: PhantomData,
        }
    }

    /// Appends a conditional transform stage.
    ///
    /// At execution the specification is evaluated against the current
    /// value; the transform applies only when it holds, otherwise the
    /// value passes through unchanged.
    #[must_use]
    pub fn stage_if<F>(
        &self,
        name: impl Into<String>,
        guard: &Spec<Out>,
        transform: F,
    ) -> Pipeline<In, Out>
    where
        F: Fn(Out) -> Out + Send + Sync + 'static,
    {
        let name = name.into();
        let stage_name = name.clone();
        let guard = guard.clone();
        let apply = Arc::new(move |value: ErasedValue| {
            let input: Out = downcast(&stage_name, value)?;
            let output = if guard.evaluate(&input) {
                transform(input)
            } else {
                input
            };
            Ok(ErasedValue::new(output))
        });

        Pipeline {
            stages: self.push(StageEntry {
                name,
                kind: StageKind::ConditionalTransform,
                apply,
            }),
            _marker: PhantomData,
        }
    }

    /// Appends a validation stage.
    ///
    /// A false evaluation halts execution with the configured message;
    /// no later stage runs.
    #[must_use]
    pub fn validate(
        &self,
        name: impl Into<String>,
        guard: &Spec<Out>,
        message: impl Into<String>,
    ) -> Pipeline<In, Out> {
        let name = name.into();
        let stage_name = name.clone();
        let message = message.into();
        let guard = guard.clone();
        let apply = Arc::new(move |value: ErasedValue| {
            let input: Out = downcast(&stage_name, value)?;
            if guard.evaluate(&input) {
                Ok(ErasedValue::new(input))
            } else {
                Err(ExecError::validation(stage_name.clone(), message.clone()))
            }
        });

        Pipeline {
            stages: self.push(StageEntry {
                name,
                kind: StageKind::Validation,
                apply,
            }),
            _marker: PhantomData,
        }
    }

    /// Executes the pipeline, applying stages strictly in insertion order.
    ///
    /// Fails fast: the first stage error propagates and no later stage
    /// runs. A panicking stage body unwinds to the caller.
    pub fn run(&self, input: In) -> ExecutionResult<Out> {
        let mut value = ErasedValue::new(input);
        for entry in &self.stages {
            value = (entry.apply)(value).map_err(|err| {
                debug!(stage = %entry.name, error = %err, "pipeline stage failed");
                err
            })?;
        }
        downcast("<output>", value)
    }

    /// Executes the pipeline, converting stage panics into errors.
    ///
    /// Identical traversal to [`run`](Self::run), but each stage body is
    /// wrapped in a panic boundary; a panic becomes a transform failure
    /// carrying the panic message, attributed to the failing stage.
    pub fn run_safe(&self, input: In) -> ExecutionResult<Out> {
        let mut value = ErasedValue::new(input);
        for entry in &self.stages {
            let applied = catch_unwind(AssertUnwindSafe(|| (entry.apply)(value)));
            value = match applied {
                Ok(result) => result.map_err(|err| {
                    debug!(stage = %entry.name, error = %err, "pipeline stage failed");
                    err
                })?,
                Err(payload) => {
                    let message = crate::errors::panic_message(payload.as_ref());
                    debug!(stage = %entry.name, panic = %message, "pipeline stage panicked");
                    return Err(ExecError::transform(
                        entry.name.clone(),
                        format!("stage panicked: {message}"),
                    ));
                }
            };
        }
        downcast("<output>", value)
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if no stages have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the stage names in insertion order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Returns the stage kinds in insertion order.
    #[must_use]
    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_empty_pipeline_is_identity() {
        let pipeline = Pipeline::<i32, i32>::new();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.run(7).unwrap(), 7);
    }

    #[test]
    fn test_stages_apply_in_insertion_order() {
        let pipeline = Pipeline::<i32, i32>::new()
            .stage("add_one", |n| n + 1)
            .stage("double", |n| n * 2)
            .stage("to_string", |n: i32| n.to_string());

        // Composition order matters: (3 + 1) * 2 = 8, not 3 * 2 + 1.
        assert_eq!(pipeline.run(3).unwrap(), "8");
        assert_eq!(pipeline.stage_names(), vec!["add_one", "double", "to_string"]);
    }

    #[test]
    fn test_builder_is_persistent() {
        let base = Pipeline::<i32, i32>::new().stage("add_one", |n| n + 1);

        // Two branches from the same prefix; the prefix stays intact.
        let doubled = base.stage("double", |n| n * 2);
        let negated = base.stage("negate", |n: i32| -n);

        assert_eq!(base.len(), 1);
        assert_eq!(base.run(1).unwrap(), 2);
        assert_eq!(doubled.run(1).unwrap(), 4);
        assert_eq!(negated.run(1).unwrap(), -2);
    }

    #[test]
    fn test_try_stage_failure_halts() {
        let later_calls = std::sync::Arc::new(AtomicUsize::new(0));
        let later = later_calls.clone();

        let pipeline = Pipeline::<i32, i32>::new()
            .try_stage("reject_negative", |n: i32| {
                if n < 0 {
                    Err("negative input".into())
                } else {
                    Ok(n)
                }
            })
            .stage("count", move |n| {
                later.fetch_add(1, Ordering::SeqCst);
                n
            });

        let err = pipeline.run(-1).unwrap_err();
        assert!(matches!(err, ExecError::Transform { .. }));
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);

        assert_eq!(pipeline.run(5).unwrap(), 5);
        assert_eq!(later_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_validation_halts_before_later_stages() {
        let later_calls = std::sync::Arc::new(AtomicUsize::new(0));
        let later = later_calls.clone();

        let positive = Spec::atom(|n: &i32| *n > 0, "positive");
        let pipeline = Pipeline::<i32, i32>::new()
            .validate("check_positive", &positive, "value must be positive")
            .stage("count", move |n| {
                later.fetch_add(1, Ordering::SeqCst);
                n
            });

        let err = pipeline.run(0).unwrap_err();
        match err {
            ExecError::Validation { stage, message } => {
                assert_eq!(stage, "check_positive");
                assert_eq!(message, "value must be positive");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stage_if_applies_only_when_guard_holds() {
        let large = Spec::atom(|n: &i32| *n > 100, "large");
        let pipeline = Pipeline::<i32, i32>::new().stage_if("halve_large", &large, |n| n / 2);

        assert_eq!(pipeline.run(200).unwrap(), 100);
        assert_eq!(pipeline.run(50).unwrap(), 50);
        assert_eq!(pipeline.stage_kinds(), vec![StageKind::ConditionalTransform]);
    }

    #[test]
    fn test_run_safe_captures_panic() {
        let pipeline = Pipeline::<i32, i32>::new()
            .stage("explode", |_: i32| -> i32 { panic!("stage blew up") });

        let err = pipeline.run_safe(1).unwrap_err();
        match err {
            ExecError::Transform { stage, source } => {
                assert_eq!(stage, "explode");
                assert!(source.to_string().contains("stage blew up"));
            }
            other => panic!("expected transform error, got {other:?}"),
        }
    }

    #[test]
    fn test_run_safe_matches_run_on_success() {
        let pipeline = Pipeline::<i32, i32>::new()
            .stage("add", |n| n + 10)
            .stage("format", |n: i32| format!("value={n}"));

        assert_eq!(pipeline.run(5).unwrap(), pipeline.run_safe(5).unwrap());
    }

    #[test]
    fn test_run_safe_preserves_validation_error() {
        let never = Spec::atom(|_: &i32| false, "never");
        let pipeline =
            Pipeline::<i32, i32>::new().validate("always_fails", &never, "nope");

        assert!(matches!(
            pipeline.run_safe(1),
            Err(ExecError::Validation { .. })
        ));
    }
}
