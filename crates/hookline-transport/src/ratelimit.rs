//! Per-route rate-limit buckets.
//!
//! Every outbound call acquires a [`BucketPermit`] from the bucket of its
//! route before it is sent and drops it when the exchange is over. A bucket
//! hands out at most `remaining` permits; further callers queue up and are
//! granted permits strictly in arrival order, either when a finished call
//! frees capacity or when the bucket's window resets.
//!
//! # Hand-off
//!
//! A queued caller is never woken to race for capacity. Whoever frees
//! capacity reserves the slot on the waiter's behalf (decrementing
//! `remaining` and counting it as outgoing) and then completes the waiter's
//! oneshot. This keeps the queue FIFO and guarantees that no more than
//! `remaining` callers are ever released at once.
//!
//! # Cool-down
//!
//! When a permit is dropped and the bucket is exhausted, a single cool-down
//! task sleeps until the bucket's window expires, resets it and hands out the
//! refilled capacity. Releasers that find a cool-down already running leave
//! the queue to it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Buckets idle for at least this long may be evicted.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Table size above which idle buckets are swept.
pub const DEFAULT_TABLE_CAPACITY: usize = 256;

/// Rate-limit headers of a successful response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitInfo {
    /// `x-ratelimit-limit`, if sent.
    pub limit: Option<u32>,
    /// `x-ratelimit-remaining`.
    pub remaining: u32,
    /// `x-ratelimit-reset-after`.
    pub reset_after: Duration,
}

impl RateLimitInfo {
    /// Reads the rate-limit headers from lowercased response headers.
    ///
    /// Returns `None` when the response carries no `x-ratelimit-remaining`,
    /// in which case the route is not rate limited by the server and the
    /// bucket keeps its local accounting.
    pub fn from_headers(headers: &HashMap<String, String>) -> Option<Self> {
        let remaining = headers.get("x-ratelimit-remaining")?.trim().parse().ok()?;
        let limit = headers
            .get("x-ratelimit-limit")
            .and_then(|v| v.trim().parse().ok());
        let reset_after = headers
            .get("x-ratelimit-reset-after")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or_default();
        Some(Self {
            limit,
            remaining,
            reset_after,
        })
    }
}

#[derive(Debug)]
struct BucketState {
    limit: u32,
    /// Permits that may still be handed out in the current window.
    remaining: u32,
    /// Permits currently held.
    outgoing: u32,
    reset_after: Duration,
    expires: Option<Instant>,
    last_used: Instant,
    cooling: bool,
    queue: VecDeque<oneshot::Sender<()>>,
}

impl BucketState {
    fn new(now: Instant) -> Self {
        Self {
            limit: 1,
            remaining: 1,
            outgoing: 0,
            reset_after: Duration::ZERO,
            expires: None,
            last_used: now,
            cooling: false,
            queue: VecDeque::new(),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires.is_some_and(|expires| now > expires)
    }

    fn reset(&mut self) {
        self.remaining = self.limit.saturating_sub(self.outgoing);
        self.expires = None;
        self.reset_after = Duration::ZERO;
    }

    /// Reserves one permit for each queued waiter while capacity lasts.
    fn grant_waiters(&mut self) -> usize {
        let mut granted = 0;
        while self.remaining > 0 {
            let Some(waiter) = self.queue.pop_front() else {
                break;
            };
            self.remaining -= 1;
            self.outgoing += 1;
            if waiter.send(()).is_ok() {
                granted += 1;
            } else {
                // the waiter was cancelled before it could be granted
                self.remaining += 1;
                self.outgoing -= 1;
            }
        }
        granted
    }
}

/// Rate-limit state of one `(method, route template)` pair.
#[derive(Debug)]
pub struct RateLimitBucket {
    key: String,
    state: Mutex<BucketState>,
}

impl RateLimitBucket {
    /// Creates a bucket that allows one call until the server says otherwise.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: Mutex::new(BucketState::new(Instant::now())),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Permits available without waiting.
    pub fn remaining(&self) -> u32 {
        self.state.lock().remaining
    }

    /// Permits currently held.
    pub fn outgoing(&self) -> u32 {
        self.state.lock().outgoing
    }

    /// Callers queued for a permit.
    pub fn waiting(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Waits for a permit.
    ///
    /// Returns immediately when capacity is available and nobody is queued;
    /// otherwise queues behind earlier callers. Dropping the returned future
    /// while queued gives up the place in line, and a permit granted to a
    /// dropped future is released again.
    pub async fn acquire(self: &Arc<Self>) -> BucketPermit {
        let receiver = {
            let mut state = self.state.lock();
            let now = Instant::now();
            state.last_used = now;
            if state.is_expired(now) {
                state.reset();
            }

            if state.remaining > 0 && state.queue.is_empty() {
                state.remaining -= 1;
                state.outgoing += 1;
                return BucketPermit::new(Arc::clone(self));
            }

            let (sender, receiver) = oneshot::channel();
            state.queue.push_back(sender);
            trace!(bucket = %self.key, queued = state.queue.len(), "Waiting for rate limit bucket");
            receiver
        };

        let mut pending = PendingGrant {
            bucket: self,
            receiver: Some(receiver),
        };
        let granted = match pending.receiver.as_mut() {
            Some(receiver) => receiver.await.is_ok(),
            None => false,
        };
        pending.receiver = None;

        if !granted {
            // sender dropped without a grant: count the permit here so the
            // release stays balanced
            let mut state = self.state.lock();
            state.remaining = state.remaining.saturating_sub(1);
            state.outgoing += 1;
        }
        BucketPermit::new(Arc::clone(self))
    }

    /// Applies the rate-limit headers of a successful response.
    pub fn update(&self, info: &RateLimitInfo) {
        let mut state = self.state.lock();
        if let Some(limit) = info.limit {
            state.limit = limit.max(1);
        }
        // the caller's own permit is still counted as outgoing
        let others = state.outgoing.saturating_sub(1);
        state.remaining = info.remaining.saturating_sub(others);
        state.reset_after = info.reset_after;
        state.expires = Some(Instant::now() + info.reset_after);
        trace!(
            bucket = %self.key,
            limit = state.limit,
            remaining = state.remaining,
            reset_after_ms = info.reset_after.as_millis() as u64,
            "Rate limit bucket updated"
        );
    }

    /// Whether the bucket can be evicted from a table.
    pub fn is_inactive(&self, idle: Duration) -> bool {
        let state = self.state.lock();
        Instant::now().saturating_duration_since(state.last_used) >= idle
            && state.queue.is_empty()
            && state.outgoing == 0
            && !state.cooling
    }

    fn release(self: &Arc<Self>) {
        let mut state = self.state.lock();
        state.outgoing = state.outgoing.saturating_sub(1);
        state.last_used = Instant::now();

        if state.cooling {
            return;
        }

        let now = Instant::now();
        if state.is_expired(now) {
            state.reset();
        }

        if state.remaining == 0 {
            self.start_cooldown(&mut state, now);
        } else if !state.queue.is_empty() {
            let granted = state.grant_waiters();
            trace!(bucket = %self.key, granted, "Released queued callers");
        }
    }

    fn start_cooldown(self: &Arc<Self>, state: &mut BucketState, now: Instant) {
        let delay = match state.expires {
            Some(expires) => expires.saturating_duration_since(now),
            None => state.reset_after,
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            state.reset();
            state.grant_waiters();
            return;
        };

        state.cooling = true;
        debug!(
            bucket = %self.key,
            delay_ms = delay.as_millis() as u64,
            "Rate limit bucket hit, cooling down"
        );

        let bucket = Arc::clone(self);
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = bucket.state.lock();
            state.reset();
            state.cooling = false;
            let granted = state.grant_waiters();
            debug!(bucket = %bucket.key, granted, "Rate limit bucket released");
        });
    }
}

/// The right to have one call in flight. Dropping it frees the slot.
#[derive(Debug)]
pub struct BucketPermit {
    bucket: Arc<RateLimitBucket>,
}

impl BucketPermit {
    fn new(bucket: Arc<RateLimitBucket>) -> Self {
        Self { bucket }
    }

    /// The bucket this permit belongs to.
    pub fn bucket(&self) -> &Arc<RateLimitBucket> {
        &self.bucket
    }

    /// Applies response headers to the bucket.
    pub fn update(&self, info: &RateLimitInfo) {
        self.bucket.update(info);
    }
}

impl Drop for BucketPermit {
    fn drop(&mut self) {
        self.bucket.release();
    }
}

/// Returns a permit granted to a caller that stopped waiting for it.
struct PendingGrant<'a> {
    bucket: &'a Arc<RateLimitBucket>,
    receiver: Option<oneshot::Receiver<()>>,
}

impl Drop for PendingGrant<'_> {
    fn drop(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.close();
            if receiver.try_recv().is_ok() {
                self.bucket.release();
            }
        }
    }
}

/// Process-wide map from bucket key to bucket.
#[derive(Debug)]
pub struct BucketTable {
    buckets: Mutex<HashMap<String, Arc<RateLimitBucket>>>,
    capacity: usize,
    idle_timeout: Duration,
}

impl Default for BucketTable {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_CAPACITY, DEFAULT_IDLE_TIMEOUT)
    }
}

impl BucketTable {
    /// Creates a table swept once it grows past `capacity` entries.
    pub fn new(capacity: usize, idle_timeout: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            capacity,
            idle_timeout,
        }
    }

    /// Returns the bucket for `key`, creating it on first use.
    pub fn get(&self, key: &str) -> Arc<RateLimitBucket> {
        let mut buckets = self.buckets.lock();
        if let Some(bucket) = buckets.get(key) {
            return Arc::clone(bucket);
        }

        let bucket = Arc::new(RateLimitBucket::new(key));
        buckets.insert(key.to_string(), Arc::clone(&bucket));

        if buckets.len() > self.capacity {
            let before = buckets.len();
            let idle = self.idle_timeout;
            buckets.retain(|_, b| Arc::strong_count(b) > 1 || !b.is_inactive(idle));
            debug!(evicted = before - buckets.len(), "Swept idle rate limit buckets");
        }
        bucket
    }

    /// Number of buckets currently tracked.
    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }
}
