use std::future::Future;
use std::time::Duration;

/// Retry `f` with exponential backoff (`base × 2^i`), stopping after
/// `max_retries` additional attempts beyond the first. `should_retry`
/// decides whether a given error is worth retrying at all (spec §4.3:
/// "network/HTTP 5xx at any step is retried with exponential backoff...
/// max 2 attempts per edge"; a typed rejection is terminal and must not
/// be retried).
pub async fn with_backoff<T, E, F, Fut>(
    max_retries: u32,
    base: Duration,
    mut should_retry: impl FnMut(&E) -> bool,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_retries && should_retry(&e) => {
                let backoff = base * 2u32.pow(attempt);
                tracing::warn!(attempt, ?backoff, "retrying after failure");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(2, Duration::from_millis(1), |_| true, || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("not yet")
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(2, Duration::from_millis(1), |_| true, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err("always fails")
        })
        .await;
        assert_eq!(result, Err("always fails"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_when_should_retry_is_false() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(2, Duration::from_millis(1), |_| false, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err("terminal")
        })
        .await;
        assert_eq!(result, Err("terminal"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
