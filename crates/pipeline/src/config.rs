use std::time::Duration;

const DEFAULT_TTL_HOURS: i64 = 24;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Session lifecycle configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle time after which a session expires (default: `24`).
    pub ttl_hours: i64,
    /// How often the sweeper removes expired sessions (default: `300`).
    pub sweep_interval_secs: u64,
    /// Run view detection in the background after each upload (default: `true`).
    pub background_detection: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: DEFAULT_TTL_HOURS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            background_detection: true,
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `SESSION_TTL_HOURS`           | `24`    |
    /// | `SESSION_SWEEP_INTERVAL_SECS` | `300`   |
    /// | `BACKGROUND_DETECTION`        | `true`  |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SessionConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let ttl_hours: i64 = lookup("SESSION_TTL_HOURS")
            .unwrap_or_else(|| DEFAULT_TTL_HOURS.to_string())
            .parse()
            .expect("SESSION_TTL_HOURS must be a valid i64");
        assert!(ttl_hours > 0, "SESSION_TTL_HOURS must be positive");

        let sweep_interval_secs: u64 = lookup("SESSION_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|| DEFAULT_SWEEP_INTERVAL_SECS.to_string())
            .parse()
            .expect("SESSION_SWEEP_INTERVAL_SECS must be a valid u64");
        assert!(sweep_interval_secs > 0, "SESSION_SWEEP_INTERVAL_SECS must be positive");

        let background_detection = match lookup("BACKGROUND_DETECTION") {
            None => true,
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => panic!("BACKGROUND_DETECTION must be a boolean, got '{other}'"),
            },
        };

        Self {
            ttl_hours,
            sweep_interval_secs,
            background_detection,
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
