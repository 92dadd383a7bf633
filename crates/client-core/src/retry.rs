use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::response::ApiResponse;

const INITIAL_BACKOFF: Duration = Duration::from_millis(2);

/// Time budget for one retry sequence.
///
/// The deadline is fixed when the budget is created and never recomputed;
/// the backoff interval starts at 2 ms and doubles on every use, clamped to
/// whatever budget remains.
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    deadline: Instant,
    backoff: Duration,
}

impl RetryBudget {
    /// Fix the deadline at `time_limit` from now.
    pub fn new(time_limit: Duration) -> Self {
        Self {
            deadline: Instant::now() + time_limit,
            backoff: INITIAL_BACKOFF,
        }
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        Instant::now() > self.deadline
    }

    /// Whether waiting `delay` from now would end past the deadline.
    pub fn overruns(&self, delay: Duration) -> bool {
        Instant::now() + delay > self.deadline
    }

    /// Next exponential backoff delay, clamped to the remaining budget.
    ///
    /// Doubles the stored interval for the following call; the returned
    /// delays are monotonically non-decreasing until the clamp kicks in.
    pub fn next_backoff(&mut self) -> Duration {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let delay = self.backoff.min(remaining);
        self.backoff = self.backoff.saturating_mul(2);
        delay
    }
}

/// Retry a request until it yields a usable response or the time budget
/// runs out.
///
/// `request` is invoked once per attempt. A response with status below 400
/// is returned immediately. Error responses whose body cannot be decoded
/// trigger exponential backoff; a recognized rate limit (HTTP 429 with a
/// digits-only `Retry-After` header, or an `errcode` of `M_LIMIT_EXCEEDED`
/// with an integer `retry_after_ms`) waits for the server-requested delay
/// unless that wait would overrun the deadline. Any other error response is
/// returned unretried for [`check_response`](crate::response::check_response)
/// to classify.
///
/// The driver never fails on timeout: once the deadline passes, the current
/// response is returned as-is. At least one attempt is always made, and the
/// deadline is consulted before sleeping rather than before requesting, so
/// total elapsed time can exceed `time_limit` by one in-flight request.
/// Responses are released before every sleep so backoff never holds a
/// pooled connection.
///
/// Transport-level failures from `request` are not retried; they propagate
/// to the caller unchanged.
pub async fn retry<R, E, F, Fut>(time_limit: Duration, mut request: F) -> Result<R, E>
where
    R: ApiResponse + Send,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let mut budget = RetryBudget::new(time_limit);

    loop {
        let mut resp = request().await?;
        if resp.status() < 400 {
            return Ok(resp);
        }

        let body = match resp.body_json().await {
            Ok(body) => body,
            Err(err) => {
                // Does not look like a Matrix server; exponential backoff,
                // unless that would take us past the limit, in which case
                // one last response is all the caller gets.
                if budget.expired() {
                    return Ok(resp);
                }
                resp.release();
                let delay = budget.next_backoff();
                debug!(
                    status = resp.status(),
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "undecodable error response, backing off"
                );
                sleep(delay).await;
                continue;
            }
        };

        if budget.expired() {
            return Ok(resp);
        }

        if resp.status() == 429
            && let Some(delay_secs) = resp.header("Retry-After").and_then(parse_retry_after)
        {
            // The server says it will keep rejecting until the delay has
            // passed, so a wait that overruns the budget is pointless.
            let delay = Duration::from_secs(delay_secs);
            if budget.overruns(delay) {
                return Ok(resp);
            }
            resp.release();
            debug!(delay_secs, "rate limited via Retry-After, waiting");
            sleep(delay).await;
        } else if let Some(delay_ms) = rate_limit_hint(&body) {
            if budget.overruns(Duration::from_millis(delay_ms)) {
                return Ok(resp);
            }
            resp.release();
            // Whole-second sleep granularity, rounded up; the overrun check
            // above still uses the exact millisecond hint.
            let delay = Duration::from_secs(delay_ms.div_ceil(1000));
            debug!(
                retry_after_ms = delay_ms,
                "rate limited via M_LIMIT_EXCEEDED, waiting"
            );
            sleep(delay).await;
        } else {
            // Some other error; return it and let the caller classify.
            return Ok(resp);
        }
    }
}

/// Parse a `Retry-After` value in seconds. Only digits-only strings count.
fn parse_retry_after(value: &str) -> Option<u64> {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        value.parse().ok()
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    errcode: String,
    retry_after_ms: Option<u64>,
}

/// Extract the `M_LIMIT_EXCEEDED` backoff hint in milliseconds, if the body
/// carries one with an integer `retry_after_ms`.
fn rate_limit_hint(body: &Value) -> Option<u64> {
    let parsed: RateLimitBody = serde_json::from_value(body.clone()).ok()?;
    if parsed.errcode == "M_LIMIT_EXCEEDED" {
        parsed.retry_after_ms
    } else {
        None
    }
}
