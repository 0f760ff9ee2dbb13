use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Per-client send times for the `/send` limit. Keys are client IPs.
pub struct RateLimiter {
    clients: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop leading entries that fell out of `window`; times are pushed in order.
fn expire(times: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while times
        .front()
        .is_some_and(|first| now.duration_since(*first) >= window)
    {
        times.pop_front();
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            clients: Mutex::new(HashMap::new()),
        }
    }

    // A panic while holding the lock leaves the map usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count one send from `client` unless it already has `max` inside `window`.
    /// Rejected attempts are not counted.
    pub fn check_and_record(&self, client: &str, max: u64, window: Duration) -> bool {
        let now = Instant::now();
        let mut clients = self.lock();
        let times = clients.entry(client.to_string()).or_default();
        expire(times, now, window);

        if (times.len() as u64) >= max {
            return false;
        }
        times.push_back(now);
        true
    }

    /// Forget clients whose sends are all older than `window`.
    /// Returns how many were forgotten.
    pub fn cleanup(&self, window: Duration) -> usize {
        let now = Instant::now();
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, times| {
            expire(times, now, window);
            !times.is_empty()
        });
        before - clients.len()
    }

    pub fn tracked(&self) -> usize {
        self.lock().len()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("rate limit is not formatted properly - {0}")]
    Format(String),

    #[error("invalid request count '{0}'")]
    Count(String),

    #[error("invalid duration '{0}'")]
    Duration(String),
}

/// `inf` or `<count>/<duration>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    Unlimited,
    PerWindow { max: u64, window: Duration },
}

impl FromStr for RateLimit {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("inf") {
            return Ok(RateLimit::Unlimited);
        }

        let (count, duration) = s
            .split_once('/')
            .ok_or_else(|| RateLimitError::Format(s.to_string()))?;
        let max: u64 = count
            .trim()
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| RateLimitError::Count(count.to_string()))?;
        let window = parse_duration(duration.trim())
            .filter(|d| !d.is_zero())
            .ok_or_else(|| RateLimitError::Duration(duration.to_string()))?;

        Ok(RateLimit::PerWindow { max, window })
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimit::Unlimited => f.write_str("inf"),
            RateLimit::PerWindow { max, window } => write!(f, "{}/{:?}", max, window),
        }
    }
}

/// Parse `1h30m`, `10s`, `1.5s`, `250ms`. Units: ns, us, ms, s, m, h.
pub fn parse_duration(s: &str) -> Option<Duration> {
    if s.is_empty() {
        return None;
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let value: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += value * seconds;
    }

    Duration::try_from_secs_f64(total).ok()
}

/// The configured limit plus its counters, shared by every request.
pub struct Throttle {
    pub rate: RateLimit,
    pub limiter: RateLimiter,
}

impl Throttle {
    pub fn new(rate: RateLimit) -> Self {
        Throttle {
            rate,
            limiter: RateLimiter::new(),
        }
    }

    /// Record one request from `client`; false once the client is over the limit.
    pub fn admit(&self, client: &str) -> bool {
        match self.rate {
            RateLimit::Unlimited => true,
            RateLimit::PerWindow { max, window } => {
                self.limiter.check_and_record(client, max, window)
            }
        }
    }

    /// Evict clients with no attempts left inside the window.
    pub fn sweep(&self) -> usize {
        match self.rate {
            RateLimit::Unlimited => 0,
            RateLimit::PerWindow { window, .. } => self.limiter.cleanup(window),
        }
    }
}
