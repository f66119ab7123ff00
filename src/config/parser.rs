use crate::config::types::Config;
use crate::ConfigError;
use std::path::Path;

/// Reads, parses and validates the TOML configuration file at `path`.
/// Missing sections fall back to their defaults before validation runs.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Validates a parsed configuration
fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.storage.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "storage.database-path must not be empty".to_string(),
        ));
    }

    if config.user_agent.checker_name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent.checker-name must not be empty".to_string(),
        ));
    }

    if config.checker.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "checker.request-timeout-secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[storage]
database-path = "./test.db"

[user-agent]
checker-name = "TestChecker"
checker-version = "1.0"
contact-url = "https://example.com/about"

[checker]
request-timeout-secs = 10
delay-secs = 1
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.storage.database_path, "./test.db");
        assert_eq!(config.user_agent.checker_name, "TestChecker");
        assert_eq!(config.checker.request_timeout_secs, 10);
        assert_eq!(config.checker.delay_secs, 1);
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let file = create_temp_config("");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.storage.database_path, "./linkward.db");
        assert_eq!(config.checker.delay_secs, 2);
        assert_eq!(config.user_agent.checker_name, "Linkward");
    }

    #[test]
    fn test_user_agent_string_with_contact() {
        let config_content = r#"
[user-agent]
checker-name = "TestChecker"
checker-version = "2.0"
contact-url = "https://example.com/bot"
"#;
        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();
        assert_eq!(
            config.user_agent.user_agent_string(),
            "TestChecker/2.0 (+https://example.com/bot)"
        );
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[checker]
request-timeout-secs = 0
"#;
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
