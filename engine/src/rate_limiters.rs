use std::sync::Arc;

use leaky_bucket::RateLimiter;
use tokio::time::Duration;

/// Token gate for the apply phase. One permit per write, refilled at a
/// fixed interval of 1000/max_rps ms, so dispatch *starts* are spaced;
/// completion order is up to the backend.
#[derive(Clone)]
pub struct RateLimiters {
    writes: Arc<RateLimiter>,
}

impl RateLimiters {
    pub fn new(max_rps: usize) -> Self {
        let min_interval_ms = (1000 / max_rps.max(1)) as u64;
        let writes = RateLimiter::builder()
            .initial(1)
            .interval(Duration::from_millis(min_interval_ms))
            .refill(1)
            .max(1)
            .build();

        Self {
            writes: Arc::new(writes),
        }
    }

    pub async fn acquire_one(&self) {
        self.writes.acquire_one().await;
    }
}
