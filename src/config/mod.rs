#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::utils::error::{LokiError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_url, validate_username, Validate,
};
use std::fmt;
use std::time::Duration;
use url::Url;

pub const DEFAULT_URI: &str = "http://localhost:3100";
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Static credentials sent as `Authorization: Basic ...` on every request.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let username = username.into();
        validate_username("username", &username)?;
        Ok(Self {
            username,
            password: password.into(),
        })
    }

    /// Credentials only apply when both halves are present.
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Result<Option<Self>> {
        match (username, password) {
            (Some(username), Some(password)) => Self::new(username, password).map(Some),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!("Ignoring basic auth: username and password must both be set");
                Ok(None)
            }
            (None, None) => Ok(None),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LokiClientConfig {
    pub uri: String,
    pub read_timeout: Duration,
    pub basic_auth: Option<BasicAuth>,
    pub tenant_id: Option<String>,
}

impl Default for LokiClientConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            basic_auth: None,
            tenant_id: None,
        }
    }
}

impl LokiClientConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self::default().with_uri(uri)
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Fails right away when the username contains ':'.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        self.basic_auth = Some(BasicAuth::new(username, password)?);
        Ok(self)
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Parsed base URI. Only scheme, host and port are used for requests.
    pub fn base_url(&self) -> Result<Url> {
        validate_url("uri", &self.uri)
    }
}

impl Validate for LokiClientConfig {
    fn validate(&self) -> Result<()> {
        self.base_url()?;

        if self.read_timeout.is_zero() {
            return Err(LokiError::InvalidConfigValue {
                field: "read_timeout".to_string(),
                value: format!("{:?}", self.read_timeout),
                reason: "Timeout must be greater than zero".to_string(),
            });
        }

        if let Some(auth) = &self.basic_auth {
            validate_username("username", auth.username())?;
        }

        if let Some(tenant_id) = &self.tenant_id {
            validate_non_empty_string("tenant_id", tenant_id)?;
        }

        Ok(())
    }
}

pub(crate) fn read_timeout_from_seconds(seconds: u64) -> Result<Duration> {
    validate_positive_number("read_timeout_seconds", seconds, 1)?;
    Ok(Duration::from_secs(seconds))
}
