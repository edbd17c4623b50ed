use std::time::Duration;

use filmgen_core::regeneration::DEFAULT_MAX_ATTEMPTS;
use filmgen_gateway::poll::{PollPolicy, DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL};

/// Workflow tuning.
#[derive(Debug, Clone)]
pub struct RegenerationConfig {
    /// Attempt budget when the approver does not choose one.
    pub default_max_attempts: i32,
    /// Video job polling cadence and cap.
    pub poll: PollPolicy,
    /// A request `generating` for longer than this is considered abandoned.
    pub stale_after: Duration,
    /// How often the reaper looks for abandoned attempts.
    pub reaper_interval: Duration,
}

impl Default for RegenerationConfig {
    fn default() -> Self {
        Self {
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll: PollPolicy::default(),
            stale_after: Duration::from_secs(15 * 60),
            reaper_interval: Duration::from_secs(60),
        }
    }
}

impl RegenerationConfig {
    /// Longest time a video attempt may spend polling for its result.
    pub fn poll_window(&self) -> Duration {
        self.poll.interval * self.poll.max_polls
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `REGENERATION_MAX_ATTEMPTS`   | `3`     |
    /// | `VIDEO_POLL_INTERVAL_SECS`    | `5`     |
    /// | `VIDEO_MAX_POLLS`             | `120`   |
    /// | `STALE_ATTEMPT_SECS`          | `900`   |
    /// | `STALE_REAPER_INTERVAL_SECS`  | `60`    |
    pub fn from_env() -> Self {
        let default_max_attempts: i32 = std::env::var("REGENERATION_MAX_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_MAX_ATTEMPTS.to_string())
            .parse()
            .expect("REGENERATION_MAX_ATTEMPTS must be a valid i32");

        let poll_interval_secs: u64 = std::env::var("VIDEO_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL.as_secs().to_string())
            .parse()
            .expect("VIDEO_POLL_INTERVAL_SECS must be a valid u64");

        let max_polls: u32 = std::env::var("VIDEO_MAX_POLLS")
            .unwrap_or_else(|_| DEFAULT_MAX_POLLS.to_string())
            .parse()
            .expect("VIDEO_MAX_POLLS must be a valid u32");

        let stale_secs: u64 = std::env::var("STALE_ATTEMPT_SECS")
            .unwrap_or_else(|_| "900".into())
            .parse()
            .expect("STALE_ATTEMPT_SECS must be a valid u64");

        let reaper_secs: u64 = std::env::var("STALE_REAPER_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("STALE_REAPER_INTERVAL_SECS must be a valid u64");

        Self {
            default_max_attempts,
            poll: PollPolicy {
                interval: Duration::from_secs(poll_interval_secs),
                max_polls,
            },
            stale_after: Duration::from_secs(stale_secs),
            reaper_interval: Duration::from_secs(reaper_secs),
        }
    }
}
