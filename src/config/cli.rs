use crate::config::toml_config::TomlConfig;
use crate::config::{read_timeout_from_seconds, BasicAuth, LokiClientConfig};
use crate::core::time::instant_from_seconds;
use crate::domain::model::Labels;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "loki-client")]
#[command(about = "Push log lines to Loki and query them back")]
pub struct CliConfig {
    #[arg(long, help = "Loki base URI [default: http://localhost:3100]")]
    pub uri: Option<String>,

    #[arg(long, help = "Read timeout in seconds [default: 10]")]
    pub timeout: Option<u64>,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    #[arg(long, help = "Tenant sent as X-Scope-OrgID")]
    pub tenant_id: Option<String>,

    #[arg(long, help = "TOML config file; flags override its values")]
    pub config: Option<PathBuf>,

    #[arg(long, short, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Push one log line
    Push {
        /// Stream label as key=value, repeatable
        #[arg(long = "label", value_parser = parse_label, required = true)]
        labels: Vec<(String, String)>,

        /// RFC 3339 timestamp of the line [default: now]
        #[arg(long, value_parser = parse_timestamp)]
        timestamp: Option<DateTime<Utc>>,

        line: String,
    },
    /// Run a range query and print entries or samples
    Query {
        query: String,

        /// RFC 3339 start of the window [default: end - since]
        #[arg(long, value_parser = parse_timestamp)]
        start: Option<DateTime<Utc>>,

        /// RFC 3339 end of the window [default: now]
        #[arg(long, value_parser = parse_timestamp)]
        end: Option<DateTime<Utc>>,

        /// Window length when --start is not given, e.g. 30s, 15m, 1h, 2d
        #[arg(long, default_value = "1h", value_parser = parse_since)]
        since: Duration,

        #[arg(long)]
        limit: Option<u32>,
    },
    /// Print whether a query produces streams or a matrix
    Kind { query: String },
    /// Flush ingester memory to storage
    Flush,
    /// Check that Loki is ready
    Ready,
}

impl CliConfig {
    pub fn load_file(&self) -> Result<TomlConfig> {
        match &self.config {
            Some(path) => TomlConfig::from_file(path),
            None => Ok(TomlConfig::default()),
        }
    }

    /// File values with command line flags on top.
    pub fn client_config(&self, file: &TomlConfig) -> Result<LokiClientConfig> {
        let mut config = file.to_client_config()?;

        if let Some(uri) = &self.uri {
            config.uri = uri.clone();
        }
        if let Some(seconds) = self.timeout {
            config.read_timeout = read_timeout_from_seconds(seconds)?;
        }
        if self.username.is_some() || self.password.is_some() {
            let username = self.username.clone().or_else(|| file.client.username.clone());
            let password = self.password.clone().or_else(|| file.client.password.clone());
            config.basic_auth = BasicAuth::from_parts(username, password)?;
        }
        if let Some(tenant_id) = &self.tenant_id {
            config.tenant_id = Some(tenant_id.clone());
        }

        Ok(config)
    }
}

pub fn labels_from_pairs(pairs: &[(String, String)]) -> Labels {
    pairs.iter().cloned().collect()
}

/// `[start, end]` of a query: `end` defaults to now, `start` to `end - since`.
pub fn query_window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    since: Duration,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = end.unwrap_or_else(Utc::now);
    let start = start.unwrap_or_else(|| {
        chrono::Duration::from_std(since)
            .ok()
            .and_then(|since| end.checked_sub_signed(since))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    });
    (start, end)
}

fn parse_label(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    if key.trim().is_empty() {
        return Err(format!("empty label name in '{}'", raw));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

/// RFC 3339 (`2024-07-01T12:00:00Z`) or whole epoch seconds (`1719835200`).
fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(seconds) = raw.parse::<i64>() {
        return instant_from_seconds(seconds)
            .ok_or_else(|| format!("epoch seconds out of range: {}", raw));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}' (RFC 3339 or epoch seconds): {}", raw, e))
}

fn parse_since(raw: &str) -> std::result::Result<Duration, String> {
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("missing unit in '{}' (use s, m, h or d)", raw))?;
    let (amount, unit) = raw.split_at(split);
    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("invalid duration '{}'", raw))?;
    let seconds = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        other => return Err(format!("unknown unit '{}' in '{}'", other, raw)),
    };
    amount
        .checked_mul(seconds)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", raw))
}
