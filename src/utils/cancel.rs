//! 可取消的等待

use crate::error::{OcrError, OcrResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 睡眠，被取消时立即返回 `Cancelled`
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> OcrResult<()> {
    if duration.is_zero() {
        return check(cancel);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OcrError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// 运行一个远端调用，被取消时丢弃该调用
pub async fn run_or_cancel<T, F>(cancel: &CancellationToken, fut: F) -> OcrResult<T>
where
    F: Future<Output = OcrResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OcrError::Cancelled),
        result = fut => result,
    }
}

pub fn check(cancel: &CancellationToken) -> OcrResult<()> {
    if cancel.is_cancelled() {
        Err(OcrError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let token = CancellationToken::new();
        tokio_test::assert_ok!(sleep_or_cancel(Duration::from_secs(5), &token).await);
    }

    #[tokio::test]
    async fn test_cancelled_sleep_returns_early() {
        let token = CancellationToken::new();
        token.cancel();
        let result = sleep_or_cancel(Duration::from_secs(3600), &token).await;
        assert_eq!(result, Err(OcrError::Cancelled));

        let result: OcrResult<u32> = run_or_cancel(&token, std::future::pending()).await;
        assert_eq!(result, Err(OcrError::Cancelled));
    }
}
