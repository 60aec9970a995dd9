use anyhow::{anyhow, Result};
use std::{future::Future, time::Duration};

/// Bounded retry with a fixed or growing delay, applied at the store-access
/// boundary. The default mirrors the behavior the mobile app hard-coded
/// around its pre-reservation user read: three attempts, one second apart.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
            multiplier: 1,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration, multiplier: u32) -> Self {
        Self {
            attempts,
            delay,
            multiplier,
        }
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.delay;
        let mut last = None;

        for attempt in 1..=self.attempts.max(1) {
            if attempt > 1 {
                actix_web::rt::time::sleep(delay).await;
                delay *= self.multiplier.max(1);
            }
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "store access failed");
                    last = Some(err);
                }
            }
        }

        Err(last.unwrap_or_else(|| anyhow!("retry policy ran no attempts")))
    }
}

#[cfg(test)]
mod test {
    use super::RetryPolicy;
    use anyhow::anyhow;
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    fn quick() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), 1)
    }

    #[actix_web::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let value = quick()
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(anyhow!("transient"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[actix_web::test]
    async fn test_gives_up_after_budget() {
        let calls = AtomicU32::new(0);

        let result: anyhow::Result<()> = quick()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow!("down")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[actix_web::test]
    async fn test_first_try_needs_no_sleep() {
        let value = quick().run(|| async { Ok(7u32) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
