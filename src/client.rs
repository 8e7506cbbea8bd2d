use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::event::{Event, EventDraft, Filter};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(3000);

#[async_trait]
pub trait EventQuery: Send + Sync {
    /// Returns records matching any of `filters`. Implementations should stop early
    /// when `cancel` fires.
    async fn query(
        &self,
        filters: &[Filter],
        cancel: CancellationToken,
    ) -> anyhow::Result<Vec<Event>>;
}

#[async_trait]
pub trait EventPublish: Send + Sync {
    /// Stores `draft` and returns the record with author, timestamp and id filled in.
    async fn publish(&self, draft: EventDraft) -> anyhow::Result<Event>;
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("query timed out after {0:?}")]
    TimedOut(Duration),
    #[error("query cancelled")]
    Cancelled,
    #[error("query failed: {0:#}")]
    Query(#[source] anyhow::Error),
}

/// Runs a query that ends at `timeout` or when `cancel` fires, whichever comes first.
///
/// The token handed to the collaborator is a child of `cancel` and is cancelled on
/// timeout as well, so an in-flight request is told to stop.
pub async fn query_with_deadline(
    client: &dyn EventQuery,
    filters: &[Filter],
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<Vec<Event>, FetchError> {
    let token = cancel.child_token();
    let _guard = token.clone().drop_guard();

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        res = tokio::time::timeout(timeout, client.query(filters, token.clone())) => match res {
            Ok(Ok(events)) => Ok(events),
            Ok(Err(err)) => Err(FetchError::Query(err)),
            Err(_) => Err(FetchError::TimedOut(timeout)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    #[async_trait]
    impl EventQuery for Stalled {
        async fn query(
            &self,
            _filters: &[Filter],
            cancel: CancellationToken,
        ) -> anyhow::Result<Vec<Event>> {
            cancel.cancelled().await;
            anyhow::bail!("stopped by token")
        }
    }

    struct Failing;

    #[async_trait]
    impl EventQuery for Failing {
        async fn query(
            &self,
            _filters: &[Filter],
            _cancel: CancellationToken,
        ) -> anyhow::Result<Vec<Event>> {
            anyhow::bail!("relay down")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_query_times_out() {
        let cancel = CancellationToken::new();
        let err = query_with_deadline(&Stalled, &[], &cancel, DEFAULT_FETCH_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::TimedOut(_)));
    }

    #[tokio::test]
    async fn external_cancel_wins() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = query_with_deadline(&Stalled, &[], &cancel, DEFAULT_FETCH_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }

    #[tokio::test]
    async fn query_errors_are_wrapped() {
        let cancel = CancellationToken::new();
        let err = query_with_deadline(&Failing, &[], &cancel, DEFAULT_FETCH_TIMEOUT)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("relay down"));
    }
}
