//! Disconnect observation at suspension points.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{PrinterError, Result};

/// Await `fut` unless the link drops first.
pub(crate) async fn until_disconnected<T>(
    link: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = link.cancelled() => Err(PrinterError::DisconnectedMidOperation),
        res = fut => res,
    }
}

/// Sleep for `duration`; returns `true` if the link dropped meanwhile.
pub(crate) async fn sleep_or_cancel(link: &CancellationToken, duration: Duration) -> bool {
    if duration.is_zero() {
        return link.is_cancelled();
    }
    tokio::select! {
        _ = link.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_link_wins_over_pending_future() {
        let link = CancellationToken::new();
        link.cancel();
        let res = until_disconnected(&link, std::future::pending::<Result<()>>()).await;
        assert!(matches!(res, Err(PrinterError::DisconnectedMidOperation)));
    }

    #[tokio::test]
    async fn live_link_passes_result_through() {
        let link = CancellationToken::new();
        let res = until_disconnected(&link, async { Ok(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }

    #[tokio::test]
    async fn sleep_reports_cancellation() {
        let link = CancellationToken::new();
        assert!(!sleep_or_cancel(&link, Duration::from_millis(1)).await);
        link.cancel();
        assert!(sleep_or_cancel(&link, Duration::from_secs(60)).await);
        assert!(sleep_or_cancel(&link, Duration::ZERO).await);
    }
}
