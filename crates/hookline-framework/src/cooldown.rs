//! Fixed-window command cooldowns.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hookline_core::{Interaction, Snowflake};
use parking_lot::Mutex;

/// What a cooldown is shared across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BucketType {
    /// One window for everyone.
    #[default]
    Default,
    /// One window per user.
    User,
    /// One window per user in each guild.
    Member,
    /// One window per guild.
    Guild,
    /// One window per channel.
    Channel,
}

impl BucketType {
    /// The window key of an interaction.
    pub fn key(self, interaction: &Interaction) -> (u64, u64) {
        let id = |s: Option<Snowflake>| s.map_or(0, |s| s.0);
        match self {
            Self::Default => (0, 0),
            Self::User => (id(interaction.author_id()), 0),
            Self::Member => (id(interaction.guild_id), id(interaction.author_id())),
            Self::Guild => (id(interaction.guild_id), 0),
            Self::Channel => (id(interaction.channel_id), 0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: f64,
    tokens: i64,
    last: f64,
}

/// Allows `rate` invocations per `per` for each bucket key.
///
/// Time is taken from the interaction's creation time, so a burst of
/// deliveries is judged by when the user acted rather than when the
/// request arrived.
#[derive(Debug)]
pub struct Cooldown {
    rate: u32,
    per: Duration,
    bucket: BucketType,
    windows: Mutex<HashMap<(u64, u64), Window>>,
}

impl Cooldown {
    pub fn new(rate: u32, per: Duration, bucket: BucketType) -> Self {
        Self {
            rate,
            per,
            bucket,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn per(&self) -> Duration {
        self.per
    }

    pub fn bucket(&self) -> BucketType {
        self.bucket
    }

    /// Spends one token for `interaction`.
    ///
    /// Returns how long until the window resets when no token was left.
    pub fn hit(&self, interaction: &Interaction) -> Option<Duration> {
        self.update(self.bucket.key(interaction), interaction.created_at())
    }

    /// Spends one token in the window `key` at time `now`.
    pub fn update(&self, key: (u64, u64), now: DateTime<Utc>) -> Option<Duration> {
        let now = now.timestamp_millis() as f64 / 1000.0;
        let per = self.per.as_secs_f64();
        let rate = i64::from(self.rate);

        let mut windows = self.windows.lock();
        if self.bucket != BucketType::Default {
            windows.retain(|_, w| now <= w.last + per);
        }
        let window = windows.entry(key).or_insert(Window {
            start: 0.0,
            tokens: rate,
            last: 0.0,
        });

        window.last = now;
        if now > window.start + per {
            window.tokens = rate;
        }
        window.tokens = window.tokens.max(0);
        if window.tokens == rate {
            window.start = now;
        }
        window.tokens -= 1;

        (window.tokens < 0).then(|| Duration::from_secs_f64((per - (now - window.start)).max(0.0)))
    }

    /// Number of tracked windows.
    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_window_allows_rate_then_limits() {
        let cooldown = Cooldown::new(2, Duration::from_secs(10), BucketType::User);
        assert_eq!(cooldown.update((1, 0), at(0)), None);
        assert_eq!(cooldown.update((1, 0), at(1)), None);
        assert_eq!(cooldown.update((1, 0), at(4)), Some(Duration::from_secs(6)));
        // Other users have their own window.
        assert_eq!(cooldown.update((2, 0), at(4)), None);
    }

    #[test]
    fn test_window_resets_after_period() {
        let cooldown = Cooldown::new(1, Duration::from_secs(5), BucketType::Default);
        assert_eq!(cooldown.update((0, 0), at(0)), None);
        assert!(cooldown.update((0, 0), at(2)).is_some());
        assert_eq!(cooldown.update((0, 0), at(6)), None);
    }

    #[test]
    fn test_idle_windows_are_dropped() {
        let cooldown = Cooldown::new(1, Duration::from_secs(5), BucketType::Channel);
        cooldown.update((1, 0), at(0));
        cooldown.update((2, 0), at(1));
        assert_eq!(cooldown.len(), 2);
        cooldown.update((3, 0), at(30));
        assert_eq!(cooldown.len(), 1);
    }

    #[test]
    fn test_member_key_combines_guild_and_user() {
        let interaction: Interaction = serde_json::from_value(serde_json::json!({
            "id": "1000000000000000000",
            "type": 2,
            "guild_id": "3",
            "channel_id": "4",
            "member": {"user": {"id": "5"}},
        }))
        .unwrap();
        assert_eq!(BucketType::Member.key(&interaction), (3, 5));
        assert_eq!(BucketType::Channel.key(&interaction), (4, 0));
        assert_eq!(BucketType::Default.key(&interaction), (0, 0));
    }
}
