use serde::Deserialize;

/// Main configuration structure for linkward
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,

    #[serde(default)]
    pub checker: CheckerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            user_agent: UserAgentConfig::default(),
            checker: CheckerConfig::default(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "./linkward.db".to_string()
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the checker
    #[serde(rename = "checker-name", default = "default_checker_name")]
    pub checker_name: String,

    /// Version of the checker
    #[serde(rename = "checker-version", default = "default_checker_version")]
    pub checker_version: String,

    /// Contact URL advertised in the user agent string
    #[serde(rename = "contact-url", default)]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            checker_name: default_checker_name(),
            checker_version: default_checker_version(),
            contact_url: String::new(),
        }
    }
}

fn default_checker_name() -> String {
    "Linkward".to_string()
}

fn default_checker_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl UserAgentConfig {
    /// Formats the full user agent string: `Name/Version (+ContactURL)`
    pub fn user_agent_string(&self) -> String {
        if self.contact_url.is_empty() {
            format!("{}/{}", self.checker_name, self.checker_version)
        } else {
            format!(
                "{}/{} (+{})",
                self.checker_name, self.checker_version, self.contact_url
            )
        }
    }
}

/// Check pacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CheckerConfig {
    /// Request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Delay between successive checks of the same site, in seconds.
    /// Applied by the CLI between checks; the core never sleeps.
    #[serde(rename = "delay-secs", default = "default_delay")]
    pub delay_secs: u64,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout(),
            delay_secs: default_delay(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_delay() -> u64 {
    2
}
