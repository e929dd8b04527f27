//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use crate::Result;
use crate::error::Error;

/// Environment variable that overrides the configured client id
pub const CLIENT_ID_ENV: &str = "TEAMSLINK_CLIENT_ID";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Azure application (client) id
    #[serde(default)]
    pub client_id: String,

    /// Azure AD tenant ("common" accepts work and personal accounts)
    #[serde(default = "default_tenant")]
    pub tenant: String,

    /// OAuth2 scopes requested at login and refresh
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Base URL of the authorization server
    #[serde(default = "default_authority_base_url")]
    pub authority_base_url: String,

    /// Base URL of Microsoft Graph
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,

    /// Loopback port the login redirect lands on
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,

    /// How long to wait for the browser login to finish
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,

    /// Length of generated meetings
    #[serde(default = "default_meeting_duration_minutes")]
    pub meeting_duration_minutes: i64,

    /// Number of recent links kept in the history
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Retry behaviour for Graph calls
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Exponential backoff settings for server errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

fn default_tenant() -> String {
    "common".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "OnlineMeetings.ReadWrite".to_string(),
        "User.Read".to_string(),
        "offline_access".to_string(),
    ]
}

fn default_authority_base_url() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_graph_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_redirect_port() -> u16 {
    8085
}

fn default_login_timeout_secs() -> u64 {
    300
}

fn default_meeting_duration_minutes() -> i64 {
    60
}

fn default_history_limit() -> usize {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            tenant: default_tenant(),
            scopes: default_scopes(),
            authority_base_url: default_authority_base_url(),
            graph_base_url: default_graph_base_url(),
            redirect_port: default_redirect_port(),
            login_timeout_secs: default_login_timeout_secs(),
            meeting_duration_minutes: default_meeting_duration_minutes(),
            history_limit: default_history_limit(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Authorization endpoint for the configured tenant
    pub fn authorize_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/authorize",
            self.authority_base_url.trim_end_matches('/'),
            self.tenant
        )
    }

    /// Token endpoint for the configured tenant
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_base_url.trim_end_matches('/'),
            self.tenant
        )
    }

    /// Space-separated scope string, as sent to the token endpoint
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Fixed redirect URI registered with the Azure application
    pub fn redirect_uri(&self) -> String {
        format!(
            "http://{}:{}{}",
            crate::auth::CALLBACK_HOST,
            self.redirect_port,
            crate::auth::CALLBACK_PATH
        )
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    /// Check the configuration is usable for talking to Microsoft
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config(format!(
                "Azure application (client) id is not set. Run 'teamslink onboard' or set {}.",
                CLIENT_ID_ENV
            )));
        }
        if self.scopes.is_empty() {
            return Err(Error::Config("At least one OAuth scope is required".to_string()));
        }
        if self.history_limit == 0 {
            return Err(Error::Config("history_limit must be at least 1".to_string()));
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(client_id) = std::env::var(CLIENT_ID_ENV) {
            if !client_id.is_empty() {
                tracing::debug!("Using client id from {}", CLIENT_ID_ENV);
                self.client_id = client_id;
            }
        }
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".teamslink")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from file, falling back to defaults when absent
pub fn load() -> Result<Config> {
    let mut config = load_from(&config_path())?;
    config.apply_env();
    Ok(config)
}

fn load_from(path: &std::path::Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("No config at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save(config: &Config) -> Result<()> {
    let path = config_path();

    // Create parent directory
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(())
}

/// Interactive first-run setup
pub fn onboard() -> Result<()> {
    use crate::ui;
    use inquire::{Confirm, Text};

    ui::print_header("Setup Wizard");
    println!("  Register an application in the Azure portal with the redirect URI below,");
    println!("  then paste its Application (client) ID here.\n");

    let mut config = load_from(&config_path())?;

    ui::print_step(&format!("Redirect URI: {}", config.redirect_uri()));

    let client_id = Text::new("Azure Application (client) ID:")
        .with_default(&config.client_id)
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;
    if client_id.trim().is_empty() {
        return Err(Error::Config("Client id cannot be empty".to_string()));
    }
    config.client_id = client_id.trim().to_string();

    let single_tenant = Confirm::new("Restrict sign-in to a single tenant?")
        .with_default(false)
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;

    if single_tenant {
        let tenant = Text::new("Tenant id or domain:")
            .prompt()
            .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;
        config.tenant = tenant.trim().to_string();
    }

    ui::print_thinking("Saving configuration");
    save(&config)?;

    println!();
    ui::print_success("Setup complete!");
    ui::print_step("Run 'teamslink login' to sign in, then 'teamslink meet'.");

    Ok(())
}

/// Remove all configuration, credentials and history
pub fn reset() -> Result<()> {
    use inquire::Confirm;
    use crate::ui;

    ui::print_warning("CAUTION: This will delete the configuration, stored sign-in and link history.");

    let confirmed = Confirm::new("Are you absolutely sure you want to reset teamslink?")
        .with_default(false)
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;

    if confirmed {
        let dir = config_dir();
        if dir.exists() {
            ui::print_thinking(&format!("Deleting {:?}", dir));
            std::fs::remove_dir_all(dir)?;
            ui::print_success("teamslink has been reset.");
        } else {
            ui::print_step("No configuration directory found.");
        }
    } else {
        ui::print_step("Reset cancelled.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_client_id() {
        std::env::set_var(CLIENT_ID_ENV, "from-env");
        let mut config = Config::default();
        config.apply_env();
        std::env::remove_var(CLIENT_ID_ENV);
        assert_eq!(config.client_id, "from-env");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tenant, "common");
        assert_eq!(config.history_limit, 3);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_delay_ms, 1000);
        assert_eq!(
            config.scope_string(),
            "OnlineMeetings.ReadWrite User.Read offline_access"
        );
    }

    #[test]
    fn test_endpoints() {
        let config = Config::default();
        assert_eq!(
            config.authorize_url(),
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize"
        );
        assert_eq!(
            config.token_url(),
            "https://login.microsoftonline.com/common/oauth2/v2.0/token"
        );
        assert_eq!(config.redirect_uri(), "http://127.0.0.1:8085/callback");
    }

    #[test]
    fn test_validate_requires_client_id() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        config.client_id = "abc".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"client_id": "xyz", "retry": {"max_retries": 5}}"#).unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.client_id, "xyz");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 1000);
        assert_eq!(config.graph_base_url, "https://graph.microsoft.com/v1.0");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("nope.json")).unwrap();
        assert!(config.client_id.is_empty());
    }
}
