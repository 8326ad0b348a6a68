use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

/// Awaits `fut`, failing with [`StoreError::Timeout`] once `limit` elapses.
/// With no limit the future runs to completion.
pub(crate) async fn with_deadline<T>(
    operation: &'static str,
    limit: Option<Duration>,
    fut: impl Future<Output = T>,
) -> Result<T, StoreError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| StoreError::Timeout { operation, limit }),
        None => Ok(fut.await),
    }
}
