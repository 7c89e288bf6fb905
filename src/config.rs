use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::run_state::Thresholds;
use crate::domain::sync_service::SyncOptions;

const ENV_PREFIX: &str = "STATUSPAGE_SYNC_";
const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub zabbix: ZabbixConfig,
    #[serde(default)]
    pub statuspage: StatuspageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

/// Environment values that look like numbers or booleans reach serde as such
/// (`STATUSPAGE_SYNC_ZABBIX__ROOT_SERVICE_ID=42`); read them back as text.
fn string_or_scalar<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Signed(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    })
}

// ── Zabbix ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZabbixConfig {
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub api_host: String,
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub username: String,
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub password: String,
    /// Zabbix service ids are numeric; accepted quoted or bare.
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub root_service_id: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

impl Default for ZabbixConfig {
    fn default() -> Self {
        Self {
            api_host: String::new(),
            username: String::new(),
            password: String::new(),
            root_service_id: String::new(),
            timeout_secs: default_api_timeout(),
        }
    }
}

// ── Statuspage ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatuspageConfig {
    #[serde(default = "default_statuspage_host", deserialize_with = "string_or_scalar")]
    pub api_host: String,
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub page_id: String,
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub api_key: String,
    /// Delete components and groups that no longer exist in Zabbix.
    #[serde(default)]
    pub allow_dangling_delete: bool,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

impl Default for StatuspageConfig {
    fn default() -> Self {
        Self {
            api_host: default_statuspage_host(),
            page_id: String::new(),
            api_key: String::new(),
            allow_dangling_delete: false,
            timeout_secs: default_api_timeout(),
        }
    }
}

fn default_statuspage_host() -> String {
    "https://api.statuspage.io".to_string()
}

fn default_api_timeout() -> u64 {
    10
}

// ── Sync loop ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Delay between the end of one cycle and the start of the next.
    #[serde(default = "default_update_delay")]
    pub update_delay_ms: u64,
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            update_delay_ms: default_update_delay(),
            dry_run: false,
        }
    }
}

fn default_update_delay() -> u64 {
    60_000
}

// ── Alerting ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub webhook_url: String,
    #[serde(default = "default_fail_attempts")]
    pub fail_attempts: u32,
    #[serde(default)]
    pub bail_attempts: u32,
    #[serde(default)]
    pub include_exception: bool,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            fail_attempts: default_fail_attempts(),
            bail_attempts: 0,
            include_exception: false,
            timeout_secs: default_webhook_timeout(),
        }
    }
}

fn default_fail_attempts() -> u32 {
    3
}

fn default_webhook_timeout() -> u64 {
    60
}

// ── Logging / status endpoint ──────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Listen address of the read-only status endpoint; empty disables it.
    #[serde(default)]
    pub http_addr: String,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join("statuspage-sync").join("config.yaml"))
    }

    /// Defaults, then the YAML file, then `STATUSPAGE_SYNC_*` environment variables.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("zabbix.api_host", &self.zabbix.api_host),
            ("zabbix.username", &self.zabbix.username),
            ("zabbix.password", &self.zabbix.password),
            ("zabbix.root_service_id", &self.zabbix.root_service_id),
            ("statuspage.api_host", &self.statuspage.api_host),
            ("statuspage.page_id", &self.statuspage.page_id),
            ("statuspage.api_key", &self.statuspage.api_key),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            bail!("missing required configuration: {}", missing.join(", "));
        }
        if self.sync.update_delay_ms == 0 {
            bail!("sync.update_delay_ms must be greater than 0");
        }
        Ok(())
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            root_service_id: self.zabbix.root_service_id.clone(),
            allow_dangling_delete: self.statuspage.allow_dangling_delete,
            dry_run: self.sync.dry_run,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            alert_after: self.alert.fail_attempts,
            bail_after: self.alert.bail_attempts,
        }
    }

    /// Copy with credentials replaced, safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for secret in [&mut copy.zabbix.password, &mut copy.statuspage.api_key] {
            if !secret.is_empty() {
                *secret = REDACTED.to_string();
            }
        }
        copy
    }
}

/// Merge the configuration layers without validating them. `path` overrides
/// the default location; a missing file is not an error so deployments can
/// configure through env only.
pub fn read(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => Config::default_path()?,
    };
    Config::figment(&path)
        .extract()
        .with_context(|| format!("loading configuration from {}", path.display()))
}

pub fn load(path: Option<&Path>) -> Result<Config> {
    let config = read(path)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const FULL: &str = r#"
zabbix:
  api_host: https://zabbix.example.com
  username: sync
  password: hunter2
  root_service_id: "42"
statuspage:
  page_id: page-1
  api_key: key-1
  allow_dangling_delete: true
sync:
  update_delay_ms: 5000
alert:
  webhook_url: https://hooks.example.com/x
  fail_attempts: 2
  bail_attempts: 10
  include_exception: true
log:
  format: json
"#;

    #[test]
    fn loads_yaml_with_defaults_filled_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, FULL).unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.zabbix.root_service_id, "42");
        assert_eq!(config.zabbix.timeout_secs, 10);
        assert_eq!(config.statuspage.api_host, "https://api.statuspage.io");
        assert!(config.statuspage.allow_dangling_delete);
        assert_eq!(config.sync.update_delay_ms, 5000);
        assert!(!config.sync.dry_run);
        assert_eq!(
            config.thresholds(),
            Thresholds {
                alert_after: 2,
                bail_after: 10
            }
        );
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.level, "info");
        assert!(config.status.http_addr.is_empty());
    }

    #[test]
    fn reports_every_missing_required_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "statuspage:\n  page_id: page-1\n").unwrap();

        let err = load(Some(&path)).unwrap_err().to_string();
        assert!(err.contains("zabbix.api_host"));
        assert!(err.contains("zabbix.root_service_id"));
        assert!(err.contains("statuspage.api_key"));
        assert!(!err.contains("statuspage.page_id"));
    }

    #[test]
    fn deletion_is_opt_in() {
        assert!(!Config::default().statuspage.allow_dangling_delete);
        assert_eq!(Config::default().alert.bail_attempts, 0);
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", FULL)?;
            jail.set_env("STATUSPAGE_SYNC_STATUSPAGE__API_KEY", "from-env");
            jail.set_env("STATUSPAGE_SYNC_ALERT__BAIL_ATTEMPTS", "0");

            let config = load(Some(Path::new("config.yaml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.statuspage.api_key, "from-env");
            assert_eq!(config.alert.bail_attempts, 0);
            assert_eq!(config.zabbix.username, "sync");
            Ok(())
        });
    }

    #[test]
    fn environment_only_with_numeric_values() {
        Jail::expect_with(|jail| {
            jail.set_env("STATUSPAGE_SYNC_ZABBIX__API_HOST", "https://zabbix.example.com");
            jail.set_env("STATUSPAGE_SYNC_ZABBIX__USERNAME", "sync");
            jail.set_env("STATUSPAGE_SYNC_ZABBIX__PASSWORD", "123456");
            jail.set_env("STATUSPAGE_SYNC_ZABBIX__ROOT_SERVICE_ID", "42");
            jail.set_env("STATUSPAGE_SYNC_STATUSPAGE__PAGE_ID", "1001");
            jail.set_env("STATUSPAGE_SYNC_STATUSPAGE__API_KEY", "true");
            jail.set_env("STATUSPAGE_SYNC_SYNC__UPDATE_DELAY_MS", "5000");

            let config = load(Some(Path::new("missing.yaml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.zabbix.root_service_id, "42");
            assert_eq!(config.zabbix.password, "123456");
            assert_eq!(config.statuspage.page_id, "1001");
            assert_eq!(config.statuspage.api_key, "true");
            assert_eq!(config.sync.update_delay_ms, 5000);
            assert_eq!(config.sync_options().root_service_id, "42");
            Ok(())
        });
    }

    #[test]
    fn bare_numeric_root_id_in_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, FULL.replace("root_service_id: \"42\"", "root_service_id: 42")).unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.zabbix.root_service_id, "42");
    }

    #[test]
    fn redaction_hides_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, FULL).unwrap();

        let redacted = load(Some(&path)).unwrap().redacted();
        assert_eq!(redacted.zabbix.password, REDACTED);
        assert_eq!(redacted.statuspage.api_key, REDACTED);
        assert_eq!(redacted.zabbix.username, "sync");
    }
}
