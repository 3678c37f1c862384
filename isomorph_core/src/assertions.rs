//! Assertion helpers for tests built on the validator.

use crate::equality::Validator;
use crate::options::ValidationOptions;
use crate::traversal::ValidationStats;
use crate::value::ToValue;
use std::any::Any;
use std::fmt::{Debug, Display};
use std::panic::{self, UnwindSafe};
use tracing::{debug, error};

/// Panics with the rendered mismatch unless both graphs are structurally equal.
#[track_caller]
pub fn assert_graphs_equal<T>(expected: &T, actual: &T) -> ValidationStats
where
    T: ToValue + ?Sized,
{
    assert_graphs_equal_with(expected, actual, ValidationOptions::default())
}

/// [`assert_graphs_equal`] with explicit options. The timeout is not applied;
/// use the cancellation harness for deadline-bounded checks.
#[track_caller]
pub fn assert_graphs_equal_with<T>(expected: &T, actual: &T, options: ValidationOptions) -> ValidationStats
where
    T: ToValue + ?Sized,
{
    match Validator::new(options).validate(&expected.to_value(), &actual.to_value()) {
        Ok(stats) => stats,
        Err(err) => {
            error!(error = %err, "Graphs are not equal");
            panic!("{}", err);
        }
    }
}

/// Runs `f`, which must panic, and returns the panic message.
#[track_caller]
pub fn expect_panic<F, R>(f: F) -> String
where
    F: FnOnce() -> R + UnwindSafe,
{
    match panic::catch_unwind(f) {
        Ok(_) => panic!("expected a panic, but the closure returned normally"),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            debug!(message = %message, "Expected panic observed");
            message
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Asserts `result` is an error and returns it.
#[track_caller]
pub fn expect_error<T, E>(result: Result<T, E>) -> E
where
    T: Debug,
    E: Display,
{
    match result {
        Ok(value) => panic!("expected an error, got Ok({:?})", value),
        Err(err) => {
            debug!(error = %err, "Expected error observed");
            err
        }
    }
}
