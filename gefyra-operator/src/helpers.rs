use std::future::Future;

use kube::{
    runtime::{
        controller::{Action, Error as ControllerError},
        finalizer::Error as FinalizerError,
        reflector::ObjectRef,
        watcher::Error as WatcherError,
    },
    Resource,
};
use log::{debug, error, info, log, Level};

use crate::reconciler::{error::ReconcilerError, failure_requeue_delay, is_retryable_failure};

type ReconcileFailure = FinalizerError<ReconcilerError>;

/// Logs the outcome of one reconciliation. Terminal failures are logged as
/// errors, they only clear once the object itself changes.
pub fn report_reconciliation<T>(
    result: Result<(ObjectRef<T>, Action), ControllerError<ReconcileFailure, WatcherError>>,
) -> impl Future<Output = ()>
where
    T: Resource<DynamicType = ()>,
{
    let kind = T::kind(&());

    match result {
        Ok((object, action)) => info!(
            "Reconciled {kind} '{}' in '{}'. Next action: {action:?}",
            object.name,
            object.namespace.as_deref().unwrap_or("---"),
        ),
        Err(ControllerError::ObjectNotFound(object)) => {
            debug!("{kind} '{}' was deleted before it could be reconciled", object.name)
        }
        Err(ControllerError::ReconcilerFailed(failure, object)) => {
            let (level, summary) = describe_failure(&failure);

            log!(level, "Reconciling {kind} '{}' failed, {summary}", object.name)
        }
        Err(ControllerError::QueueError(watcher_err)) => {
            error!("{kind} watcher has failed! {watcher_err}")
        }
        Err(ControllerError::RunnerError(runner_err)) => {
            error!("{kind} controller runner has failed! {runner_err}")
        }
    }

    std::future::ready(())
}

fn describe_failure(failure: &ReconcileFailure) -> (Level, String) {
    let delay = failure_requeue_delay(failure).as_secs();

    match is_retryable_failure(failure) {
        true => (Level::Warn, format!("retrying in {delay}s: {failure}")),
        false => (
            Level::Error,
            format!("terminal, rechecking in {delay}s: {failure}"),
        ),
    }
}
