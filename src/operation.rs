//! Deadlines and the long-running operation awaiter.
//!
//! Every mutating cloud call returns an [`Operation`]. [`wait_for`] polls it
//! with exponential backoff until it is done, then decodes the response
//! payload into the message type the caller expects.
//!
//! ```ignore
//! let deadline = Deadline::after(Duration::from_secs(60));
//! let op = cloud.service_accounts().create(&deadline, request).await?;
//! let account: ServiceAccount = wait_for(cloud.operations(), op, &deadline).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::cloud::proto::operation::{operation, Operation};
use crate::cloud::OperationService;
use crate::error::ProviderError;

/// First delay between operation polls.
pub const INITIAL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound for the delay between operation polls.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// The point in time by which a verb must finish.
///
/// Dropping a future raced against a deadline cancels whatever RPC it had in
/// flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// The instant at which the deadline expires.
    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Run `fut` to completion or fail with [`ProviderError::Timeout`] naming `what`.
    pub async fn run<T, F>(&self, what: &str, fut: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout_at(self.at, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(what.to_string())),
        }
    }
}

/// Wait for `operation` to finish and decode its response as `T`.
///
/// Poll failures are retried until the deadline unless they are fatal
/// (authentication or permission errors). An operation that is not yet done
/// is polled at least once before a timeout is reported.
#[instrument(skip_all, fields(operation_id = %operation.id))]
pub async fn wait_for<T>(
    operations: &dyn OperationService,
    operation: Operation,
    deadline: &Deadline,
) -> Result<T, ProviderError>
where
    T: prost::Message + prost::Name + Default,
{
    let operation_id = operation.id.clone();
    let finished = deadline
        .run(
            &format!("waiting for operation {}", operation_id),
            poll_until_done(operations, operation, deadline),
        )
        .await?;
    debug!("operation finished");
    into_response(finished)
}

async fn poll_until_done(
    operations: &dyn OperationService,
    mut operation: Operation,
    deadline: &Deadline,
) -> Result<Operation, ProviderError> {
    let mut interval = INITIAL_POLL_INTERVAL;

    while !operation.done {
        match operations.get(deadline, &operation.id).await {
            Ok(current) => operation = current,
            Err(status) => {
                let err = ProviderError::from(status);
                if err.is_fatal() {
                    return Err(err);
                }
                warn!(error = %err, "operation poll failed, retrying");
            }
        }

        if operation.done {
            break;
        }

        tokio::time::sleep(interval).await;
        interval = (interval * 2).min(MAX_POLL_INTERVAL);
    }

    Ok(operation)
}

/// Extract the typed response of a finished operation.
pub fn into_response<T>(operation: Operation) -> Result<T, ProviderError>
where
    T: prost::Message + prost::Name + Default,
{
    match operation.result {
        Some(operation::Result::Response(any)) => any.to_msg::<T>().map_err(|err| {
            ProviderError::UnexpectedResponse(format!(
                "operation {} returned {} instead of {}: {}",
                operation.id,
                any.type_url,
                T::full_name(),
                err
            ))
        }),
        Some(operation::Result::Error(status)) => Err(ProviderError::OperationFailed {
            operation_id: operation.id,
            code: status.code,
            message: status.message,
        }),
        None => Err(ProviderError::UnexpectedResponse(format!(
            "operation {} finished without a result",
            operation.id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::proto::iam::ServiceAccount;
    use crate::cloud::proto::rpc;
    use crate::cloud::proto::Empty;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tonic::Status;

    /// Replays scripted poll results; repeats a pending operation once the script runs out.
    struct ScriptedOperations {
        script: Mutex<VecDeque<Result<Operation, Status>>>,
        polls: AtomicUsize,
    }

    impl ScriptedOperations {
        fn new(script: Vec<Result<Operation, Status>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                polls: AtomicUsize::new(0),
            }
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OperationService for ScriptedOperations {
        async fn get(&self, _ctx: &Deadline, operation_id: &str) -> Result<Operation, Status> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(pending(operation_id)))
        }
    }

    fn pending(id: &str) -> Operation {
        Operation {
            id: id.to_string(),
            ..Default::default()
        }
    }

    fn done_with(id: &str, account: &ServiceAccount) -> Operation {
        Operation {
            id: id.to_string(),
            done: true,
            result: Some(operation::Result::Response(
                prost_types::Any::from_msg(account).unwrap(),
            )),
            ..Default::default()
        }
    }

    fn account() -> ServiceAccount {
        ServiceAccount {
            id: "sa-1".to_string(),
            folder_id: "f-1".to_string(),
            name: "acct".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_done_operation_returns_without_polling() {
        let ops = ScriptedOperations::new(vec![]);
        let deadline = Deadline::after(Duration::from_secs(1));

        let got: ServiceAccount = wait_for(&ops, done_with("op-1", &account()), &deadline)
            .await
            .unwrap();

        assert_eq!(got, account());
        assert_eq!(ops.polls(), 0);
    }

    #[tokio::test]
    async fn test_polls_until_done() {
        let ops = ScriptedOperations::new(vec![
            Ok(pending("op-1")),
            Ok(done_with("op-1", &account())),
        ]);
        let deadline = Deadline::after(Duration::from_secs(5));

        let got: ServiceAccount = wait_for(&ops, pending("op-1"), &deadline).await.unwrap();

        assert_eq!(got.id, "sa-1");
        assert_eq!(ops.polls(), 2);
    }

    #[tokio::test]
    async fn test_transient_poll_errors_are_retried() {
        let ops = ScriptedOperations::new(vec![
            Err(Status::unavailable("connection reset")),
            Ok(done_with("op-1", &account())),
        ]);
        let deadline = Deadline::after(Duration::from_secs(5));

        let got: ServiceAccount = wait_for(&ops, pending("op-1"), &deadline).await.unwrap();
        assert_eq!(got.id, "sa-1");
    }

    #[tokio::test]
    async fn test_fatal_poll_errors_are_surfaced() {
        let ops = ScriptedOperations::new(vec![Err(Status::permission_denied("no access"))]);
        let deadline = Deadline::after(Duration::from_secs(5));

        let err = wait_for::<ServiceAccount>(&ops, pending("op-1"), &deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
        assert_eq!(ops.polls(), 1);
    }

    #[tokio::test]
    async fn test_deadline_is_honored() {
        let ops = ScriptedOperations::new(vec![]);
        let started = std::time::Instant::now();
        let deadline = Deadline::after(Duration::from_millis(100));

        let err = wait_for::<ServiceAccount>(&ops, pending("op-slow"), &deadline)
            .await
            .unwrap_err();

        match err {
            ProviderError::Timeout(msg) => assert!(msg.contains("op-slow")),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(ops.polls() >= 1);
        let bound = Duration::from_millis(100) + INITIAL_POLL_INTERVAL + Duration::from_millis(50);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(started.elapsed() < bound, "took {:?}", started.elapsed());
    }

    #[test]
    fn test_failed_operation_keeps_server_status() {
        let op = Operation {
            id: "op-err".to_string(),
            done: true,
            result: Some(operation::Result::Error(rpc::Status {
                code: 9,
                message: "folder is not active".to_string(),
                details: vec![],
            })),
            ..Default::default()
        };

        match into_response::<ServiceAccount>(op).unwrap_err() {
            ProviderError::OperationFailed {
                operation_id,
                code,
                message,
            } => {
                assert_eq!(operation_id, "op-err");
                assert_eq!(code, 9);
                assert_eq!(message, "folder is not active");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_response_of_wrong_type_is_rejected() {
        let op = done_with("op-1", &account());
        let err = into_response::<Empty>(op).unwrap_err();
        assert!(matches!(err, ProviderError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_deadline_remaining() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() <= Duration::from_secs(60));

        let expired = Deadline::after(Duration::ZERO);
        assert_eq!(expired.remaining(), Duration::ZERO);
    }
}
