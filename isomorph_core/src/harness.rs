//! Cancellation Harness - races a validation against a deadline.
//!
//! The validation runs on the context's blocking pool while a timer runs
//! on the async side. Whichever finishes first decides the outcome.
//!
//! This is a cooperative race, not preemption: when the timer wins, the
//! traversal keeps running on its blocking thread until it completes, and
//! its result is discarded.

use crate::equality::Validator;
use crate::error::ValidationError;
use crate::options::ValidationOptions;
use crate::traversal::ValidationStats;
use crate::value::{ToValue, Value};
use isomorph_env::{EnvError, TokioContext, ValidationContext};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, debug_span, warn, Instrument};

const VALIDATE_TASK: &str = "validate_objects_are_equal";

/// Deadline-bounded execution over a shared [`ValidationContext`].
pub struct CancellationHarness<C: ValidationContext> {
    ctx: Arc<C>,
}

impl<C: ValidationContext> Clone for CancellationHarness<C> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<C: ValidationContext> CancellationHarness<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<C> {
        &self.ctx
    }

    /// Races `work` against `deadline`.
    ///
    /// `label` is only evaluated when the deadline fires; it identifies the
    /// state the caller was in (an iteration id, an input name).
    pub async fn execute<T, Fut, L>(
        &self,
        task_name: &str,
        deadline: Duration,
        work: Fut,
        label: L,
    ) -> Result<T, ValidationError>
    where
        Fut: Future<Output = Result<T, ValidationError>>,
        L: FnOnce() -> String,
    {
        self.race(task_name, deadline, work, Some(label)).await
    }

    /// Validates `expected` against `actual` under `options.timeout`.
    pub async fn validate<L>(
        &self,
        expected: Value,
        actual: Value,
        options: ValidationOptions,
        label: L,
    ) -> Result<ValidationStats, ValidationError>
    where
        L: FnOnce() -> String,
    {
        self.validate_inner(expected, actual, options, Some(label)).await
    }

    async fn validate_inner<L>(
        &self,
        expected: Value,
        actual: Value,
        options: ValidationOptions,
        label: Option<L>,
    ) -> Result<ValidationStats, ValidationError>
    where
        L: FnOnce() -> String,
    {
        let call_id = self.ctx.next_call_id();
        let span = debug_span!("validate", call = %call_id);
        let timeout = options.timeout;
        let validator = Validator::new(options);

        let handle = self.ctx.spawn_blocking(VALIDATE_TASK, move || {
            validator.validate(&expected, &actual)
        });
        let work = async move {
            match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(EnvError::task_failed(VALIDATE_TASK, join_error).into()),
            }
        };

        self.race(VALIDATE_TASK, timeout, work, label)
            .instrument(span)
            .await
    }

    async fn race<T, Fut, L>(
        &self,
        task_name: &str,
        deadline: Duration,
        work: Fut,
        label: Option<L>,
    ) -> Result<T, ValidationError>
    where
        Fut: Future<Output = Result<T, ValidationError>>,
        L: FnOnce() -> String,
    {
        let started = self.ctx.now();
        debug!(task = task_name, deadline_ms = deadline.as_millis() as u64, "Task started");

        tokio::select! {
            biased;

            result = work => {
                debug!(task = task_name, elapsed = ?self.ctx.now().saturating_sub(started), "Task completed");
                result
            }
            _ = self.ctx.sleep(deadline) => {
                let label = label.map(|label| label());
                warn!(task = task_name, deadline_ms = deadline.as_millis() as u64, label = ?label, "Task timed out");
                Err(ValidationError::Timeout {
                    task: task_name.to_string(),
                    timeout_ms: deadline.as_millis() as u64,
                    label,
                })
            }
        }
    }
}

/// Validates two graphs on a fresh Tokio context with `options.timeout`.
pub async fn validate_objects_are_equal<T>(
    expected: &T,
    actual: &T,
    options: ValidationOptions,
) -> Result<ValidationStats, ValidationError>
where
    T: ToValue + ?Sized,
{
    CancellationHarness::new(TokioContext::shared())
        .validate_inner(
            expected.to_value(),
            actual.to_value(),
            options,
            None::<fn() -> String>,
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_execute_returns_work_result() {
        let harness = CancellationHarness::new(TokioContext::shared());
        let value = harness
            .execute("quick", Duration::from_secs(5), async { Ok(7) }, || "never".into())
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_execute_times_out_with_label() {
        let harness = CancellationHarness::new(TokioContext::shared());
        let err = harness
            .execute(
                "slow",
                Duration::from_millis(20),
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                },
                || "iteration 3".into(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.to_string(), "Task 'slow' timed out after 20ms (iteration 3)");
    }

    #[tokio::test]
    async fn test_label_is_lazy_on_success() {
        let evaluated = Arc::new(AtomicBool::new(false));
        let harness = CancellationHarness::new(TokioContext::shared());
        let flag = Arc::clone(&evaluated);
        harness
            .validate(
                Value::object(vec![1, 2]),
                Value::object(vec![1, 2]),
                ValidationOptions::default(),
                move || {
                    flag.store(true, Ordering::SeqCst);
                    "label".into()
                },
            )
            .await
            .unwrap();
        assert!(!evaluated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_hook_panic_is_task_failure() {
        let options = ValidationOptions::default().on_member_start(|_| panic!("hook exploded"));
        let err = validate_objects_are_equal(&vec![1u8], &vec![1u8], options)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FatalTaskFailed);
    }
}
