use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Exponential backoff with jitter, shared by `dip-provider`'s Hetzner client
/// and `dip-remote`'s SSH reconnect loop. Retries up to `max_attempts` times,
/// doubling the delay each time starting from `base_delay`, capped at
/// `max_delay`, with +/-20% jitter to avoid synchronized retries when many
/// clusters are converging at once.
pub async fn with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
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
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(e);
                }
                let delay = jittered_delay(base_delay, max_delay, attempt);
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn jittered_delay(base_delay: Duration, max_delay: Duration, attempt: u32) -> Duration {
    let exp = base_delay.saturating_mul(1u32 << attempt.min(16)).min(max_delay);
    let jitter_frac = rand::thread_rng().gen_range(0.8..1.2);
    Duration::from_secs_f64(exp.as_secs_f64() * jitter_frac)
}

/// Poll `f` until it returns `Ok(Some(_))`, `Err(_)`, or `deadline` elapses,
/// at which point a timeout produces `None`. Used by `dip-remote` waiting
/// for cloud-init/k3s readiness and by `dip-orchestrator`'s deadline-bound
/// state transitions.
pub async fn poll_until<T, E, F, Fut>(
    deadline: Duration,
    interval: Duration,
    mut f: F,
) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let start = tokio::time::Instant::now();
    loop {
        if let Some(v) = f().await? {
            return Ok(Some(v));
        }
        if start.elapsed() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(interval).await;
    }
}
