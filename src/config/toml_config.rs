use crate::config::{read_timeout_from_seconds, BasicAuth, LokiClientConfig, DEFAULT_URI};
use crate::utils::error::{LokiError, Result};
use crate::utils::validation::Validate;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub client: ClientSection,
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientSection {
    pub uri: Option<String>,
    pub read_timeout_seconds: Option<u64>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| LokiError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn to_client_config(&self) -> Result<LokiClientConfig> {
        let client = &self.client;
        let mut config =
            LokiClientConfig::new(client.uri.clone().unwrap_or_else(|| DEFAULT_URI.to_string()));

        if let Some(seconds) = client.read_timeout_seconds {
            config = config.with_read_timeout(read_timeout_from_seconds(seconds)?);
        }
        config.basic_auth = BasicAuth::from_parts(client.username.clone(), client.password.clone())?;
        config.tenant_id = client.tenant_id.clone();

        Ok(config)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }

    pub fn json_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.to_client_config()?.validate()
    }
}

/// Replace `${VAR}` with the value of the environment variable. Unset
/// variables are left as written.
fn substitute_env_vars(content: &str) -> String {
    static ENV_VAR: OnceLock<Regex> = OnceLock::new();
    let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

    re.replace_all(content, |caps: &Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
