/*!
Configuration for the account lifecycle service
*/

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountsConfig {
    /// Persistent account storage settings
    pub store: StoreConfig,
    /// Pending-deletion sweeper settings
    pub sweep: SweepConfig,
    /// Registration validation policy
    pub policy: PolicyConfig,
    /// Deletion audit sinks
    pub audit: Vec<AuditConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Path to the account database
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepConfig {
    /// How often the sweeper looks for interrupted deletions (in milliseconds)
    pub interval_ms: u64,
    /// Maximum number of accounts resumed per pass
    pub batch_size: usize,
}

/// Bounds applied when validating registration input. Character-set
/// rules (letters and digits only, uppercase and digit required in
/// passwords) are fixed; only the lengths are configurable.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PolicyConfig {
    pub username_min: usize,
    pub username_max: usize,
    pub password_min: usize,
    pub password_max: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Audit sink type
    pub sink: AuditSinkKind,
    /// Whether this sink is enabled
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub enum AuditSinkKind {
    Json { path: PathBuf, pretty: bool },
    Webhook { url: String, auth_token: Option<String> },
    Terminal { format: TerminalFormat },
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub enum TerminalFormat {
    Plain,
    Json,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                db_path: PathBuf::from("./marketpulse-accounts.db"),
            },
            sweep: SweepConfig {
                interval_ms: 60_000,
                batch_size: 25,
            },
            policy: PolicyConfig::default(),
            audit: vec![AuditConfig {
                sink: AuditSinkKind::Terminal {
                    format: TerminalFormat::Plain,
                },
                enabled: true,
            }],
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            username_min: 3,
            username_max: 14,
            password_min: 9,
            password_max: 24,
        }
    }
}

/// Load a configuration file in TOML format.
pub async fn load_config<P: AsRef<Path>>(
    path: P,
) -> Result<AccountsConfig, Box<dyn std::error::Error>> {
    let content = tokio::fs::read_to_string(path).await?;
    let config: AccountsConfig = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            [store]
            db_path = "/var/lib/marketpulse/accounts.db"

            [sweep]
            interval_ms = 30000
            batch_size = 10

            [policy]
            username_min = 3
            username_max = 14
            password_min = 9
            password_max = 24

            [[audit]]
            enabled = true
            sink = { Json = { path = "./deletions.jsonl", pretty = false } }

            [[audit]]
            enabled = false
            sink = { Webhook = { url = "https://hooks.example.com/deletions" } }
        "#;

        let config: AccountsConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.sweep.batch_size, 10);
        assert_eq!(config.audit.len(), 2);
        assert!(matches!(config.audit[0].sink, AuditSinkKind::Json { .. }));
        assert!(!config.audit[1].enabled);
    }

    #[test]
    fn test_default_policy_bounds() {
        let policy = PolicyConfig::default();
        assert_eq!(policy.username_min, 3);
        assert_eq!(policy.username_max, 14);
        assert_eq!(policy.password_min, 9);
        assert_eq!(policy.password_max, 24);
    }
}
