use std::time::Duration;

/// The configuration shared by every room
#[derive(Debug, Clone)]
pub struct Config {
    /// How many signals a room buffers before senders have to wait
    pub signal_buffer_size: usize,
    /// The score a suggested track must reach to be queued, unless the room sets its own
    pub default_minimum_score_to_be_played: u32,
    /// Whether suggesting a track also counts as the suggester voting for it
    pub suggestion_counts_as_vote: bool,
    /// Whether position constraints actually gate voting, or are only recorded
    pub enforce_position_constraints: bool,
    /// How many times a notification is attempted before it is given up on
    pub notification_attempts: u32,
    /// How long to wait before retrying a notification, doubled on every failure
    pub notification_retry_delay_in_seconds: f32,
}

impl Config {
    /// Returns the delay before the given retry, starting at 1
    pub fn notification_retry_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1)) as f32;

        Duration::from_secs_f32(self.notification_retry_delay_in_seconds * factor)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signal_buffer_size: 64,
            // A single vote is enough unless a room asks for more
            default_minimum_score_to_be_played: 1,
            suggestion_counts_as_vote: true,
            enforce_position_constraints: true,
            notification_attempts: 5,
            notification_retry_delay_in_seconds: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_doubles() {
        let config = Config::default();

        assert_eq!(config.notification_retry_delay(1), Duration::from_millis(500));
        assert_eq!(config.notification_retry_delay(2), Duration::from_secs(1));
        assert_eq!(config.notification_retry_delay(4), Duration::from_secs(4));
    }
}
