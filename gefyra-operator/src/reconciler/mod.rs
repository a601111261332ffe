use std::time::Duration;

use kube::runtime::{controller::Action, finalizer::Error as FinalizerError};

use self::error::ReconcilerError;

pub mod admission;
pub mod bridge;
pub mod client;
pub mod context;
pub mod error;

#[cfg(test)]
mod fake;

const RECONCILE_REQUEUE_SECS: u64 = 60 * 5;
const WAITING_REQUEUE_SECS: u64 = 10;
const ERROR_REQUEUE_SECS: u64 = 10;
const TERMINAL_ERROR_REQUEUE_SECS: u64 = 60 * 5;

/// Finalizer bookkeeping failures are always worth a quick retry.
pub fn is_retryable_failure(error: &FinalizerError<ReconcilerError>) -> bool {
    match error {
        FinalizerError::ApplyFailed(err) | FinalizerError::CleanupFailed(err) => {
            err.is_retryable()
        }
        _ => true,
    }
}

pub fn failure_requeue_delay(error: &FinalizerError<ReconcilerError>) -> Duration {
    Duration::from_secs(match is_retryable_failure(error) {
        true => ERROR_REQUEUE_SECS,
        false => TERMINAL_ERROR_REQUEUE_SECS,
    })
}

fn get_error_action(error: &FinalizerError<ReconcilerError>) -> Action {
    Action::requeue(failure_requeue_delay(error))
}
