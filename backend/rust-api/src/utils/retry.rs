use std::time::Duration;

/// Bounded exponential backoff with jitter. Used to retry whole kernel
/// operations when an optimistic version claim loses a race; operations are
/// never resumed mid-way.
#[derive(Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

/// Retry `f` while `should_retry` says the error is transient. A
/// non-retryable error (say, `InsufficientFunds`) is returned immediately
/// without burning attempts or sleeping.
pub async fn retry_on<F, Fut, T, E, P>(
    config: RetryConfig,
    mut should_retry: P,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
{
    let mut attempts_left = config.max_attempts;
    let mut backoff = config.base_backoff;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempts_left = attempts_left.saturating_sub(1);
                if attempts_left == 0 || !should_retry(&e) {
                    return Err(e);
                }

                let wait = match config.jitter_max {
                    Some(jitter_max) if jitter_max.as_millis() > 0 => {
                        let jitter_ms = jitter_max.as_millis() as u64;
                        backoff + Duration::from_millis(rand::random::<u64>() % (jitter_ms + 1))
                    }
                    _ => backoff,
                };
                tokio::time::sleep(wait).await;

                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}
