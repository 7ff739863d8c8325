use reqwest::Response;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

// Client-side pacing on top of the server's quota headers.
const WINDOW: Duration = Duration::from_secs(60);
const MAX_REQUESTS_PER_WINDOW: u32 = 30;

pub struct RateLimiter {
    state: Mutex<RateLimitState>,
}

struct RateLimitState {
    remaining: u32,
    reset_at: Option<Instant>,
    requests_in_window: u32,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RateLimitState {
                remaining: 5000,
                reset_at: None,
                requests_in_window: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// Block until the next request is allowed to go out.
    pub async fn wait(&self) {
        let mut state = self.state.lock().await;

        if state.remaining == 0 {
            if let Some(reset_at) = state.reset_at {
                let now = Instant::now();
                if reset_at > now {
                    let wait_duration = reset_at - now;
                    drop(state);
                    tracing::info!("Rate limited, waiting {:?}", wait_duration);
                    sleep(wait_duration).await;
                    state = self.state.lock().await;
                    state.remaining = 1;
                }
            }
        }

        // Soft limit, to stay polite regardless of the server quota.
        let window_elapsed = state.window_start.elapsed();
        if window_elapsed < WINDOW {
            if state.requests_in_window >= MAX_REQUESTS_PER_WINDOW {
                let wait_time = WINDOW - window_elapsed;
                drop(state);
                tracing::debug!("Soft rate limiting, waiting {:?}", wait_time);
                sleep(wait_time).await;
                state = self.state.lock().await;
                state.requests_in_window = 0;
                state.window_start = Instant::now();
            }
        } else {
            state.requests_in_window = 0;
            state.window_start = Instant::now();
        }

        state.requests_in_window += 1;
    }

    /// Record the server's quota headers from a response.
    pub async fn update(&self, response: &Response) {
        let remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());
        let Some(remaining) = remaining else {
            return;
        };
        let reset = response
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let mut state = self.state.lock().await;
        state.remaining = remaining;
        if let Some(reset_timestamp) = reset {
            let now_unix = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            if reset_timestamp > now_unix {
                let wait_secs = reset_timestamp - now_unix;
                state.reset_at = Some(Instant::now() + Duration::from_secs(wait_secs));
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
