/*!
Deletion audit trail with pluggable sinks
*/

use std::fs::OpenOptions;
use std::io::Write;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auth::RequesterRole;
use crate::config::{AuditConfig, AuditSinkKind, TerminalFormat};

/// Record emitted once per completed account deletion.
///
/// Contact data is carried as a blake3 fingerprint, never raw, so the
/// audit trail itself holds no PII for a deleted account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionAudit {
    pub account_id: String,
    pub requester: String,
    pub requester_role: RequesterRole,
    pub contact_fingerprint: Option<String>,
    pub resources_removed: u64,
    pub completed_at: i64,
}

/// Trait for audit sinks
#[async_trait]
pub trait AuditSink: Send {
    /// Name of the sink
    fn name(&self) -> &'static str;

    /// Initialize the sink (open files, probe endpoints)
    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>>;

    /// Record a completed deletion
    async fn record(&mut self, audit: &DeletionAudit) -> Result<(), Box<dyn std::error::Error>>;

    /// Flush any buffered records
    async fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

/// Fans deletion audit records out to every enabled sink.
///
/// A failing sink is logged and skipped; audit delivery never changes
/// the outcome of a deletion that already completed.
pub struct AuditManager {
    sinks: Vec<Box<dyn AuditSink>>,
}

impl AuditManager {
    pub fn from_config(configs: &[AuditConfig]) -> Self {
        let mut sinks: Vec<Box<dyn AuditSink>> = Vec::new();

        for config in configs {
            if !config.enabled {
                continue;
            }

            let sink: Box<dyn AuditSink> = match &config.sink {
                AuditSinkKind::Json { path, pretty } => {
                    Box::new(JsonAuditSink::new(path.clone(), *pretty))
                }
                AuditSinkKind::Webhook { url, auth_token } => {
                    Box::new(WebhookAuditSink::new(url.clone(), auth_token.clone()))
                }
                AuditSinkKind::Terminal { format } => Box::new(TerminalAuditSink::new(*format)),
            };

            sinks.push(sink);
        }

        info!("audit manager configured with {} sinks", sinks.len());
        Self { sinks }
    }

    pub async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        for sink in &mut self.sinks {
            sink.initialize().await?;
            info!("initialized audit sink: {}", sink.name());
        }
        Ok(())
    }

    /// Deliver an audit record to all sinks, logging per-sink failures.
    pub async fn record(&mut self, audit: &DeletionAudit) {
        for sink in &mut self.sinks {
            if let Err(e) = sink.record(audit).await {
                error!(
                    "audit sink {} failed to record deletion of {}: {}",
                    sink.name(),
                    audit.account_id,
                    e
                );
            }
        }
    }

    pub async fn flush(&mut self) {
        for sink in &mut self.sinks {
            if let Err(e) = sink.flush().await {
                error!("audit sink {} failed to flush: {}", sink.name(), e);
            }
        }
    }
}

/// Appends one JSON document per deletion to a file.
pub struct JsonAuditSink {
    file_path: std::path::PathBuf,
    pretty: bool,
    file: Option<std::fs::File>,
}

impl JsonAuditSink {
    pub fn new(file_path: std::path::PathBuf, pretty: bool) -> Self {
        Self {
            file_path,
            pretty,
            file: None,
        }
    }
}

#[async_trait]
impl AuditSink for JsonAuditSink {
    fn name(&self) -> &'static str {
        "JSON"
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.file = Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.file_path)?,
        );
        Ok(())
    }

    async fn record(&mut self, audit: &DeletionAudit) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(ref mut file) = self.file {
            let json_str = if self.pretty {
                serde_json::to_string_pretty(audit)?
            } else {
                serde_json::to_string(audit)?
            };

            writeln!(file, "{}", json_str)?;
            file.flush()?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(ref mut file) = self.file {
            file.flush()?;
        }
        Ok(())
    }
}

/// Delivers audit records to an HTTP endpoint.
pub struct WebhookAuditSink {
    url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl WebhookAuditSink {
    pub fn new(url: String, auth_token: Option<String>) -> Self {
        Self {
            url,
            auth_token,
            client: reqwest::Client::new(),
        }
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let mut request = self.client.post(&self.url);
        if let Some(ref token) = self.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        request
    }
}

#[async_trait]
impl AuditSink for WebhookAuditSink {
    fn name(&self) -> &'static str {
        "Webhook"
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Probe the endpoint so a dead webhook is caught at startup
        let probe = serde_json::json!({
            "test": true,
            "timestamp": chrono::Utc::now().timestamp()
        });

        let response = self.request().json(&probe).send().await?;
        if !response.status().is_success() {
            return Err(format!("webhook probe failed: {}", response.status()).into());
        }
        Ok(())
    }

    async fn record(&mut self, audit: &DeletionAudit) -> Result<(), Box<dyn std::error::Error>> {
        let response = self.request().json(audit).send().await?;
        if !response.status().is_success() {
            return Err(format!("webhook delivery failed: {}", response.status()).into());
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

/// Prints audit records to stdout.
pub struct TerminalAuditSink {
    format: TerminalFormat,
}

impl TerminalAuditSink {
    pub fn new(format: TerminalFormat) -> Self {
        Self { format }
    }

    fn format_audit(&self, audit: &DeletionAudit) -> String {
        match self.format {
            TerminalFormat::Plain => {
                format!(
                    "ACCOUNT DELETED: {} by {} ({:?}) at {} ({} owned resources removed)",
                    audit.account_id,
                    audit.requester,
                    audit.requester_role,
                    chrono::DateTime::from_timestamp(audit.completed_at, 0)
                        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                    audit.resources_removed,
                )
            }
            TerminalFormat::Json => serde_json::to_string_pretty(audit)
                .unwrap_or_else(|_| "JSON serialization failed".to_string()),
        }
    }
}

#[async_trait]
impl AuditSink for TerminalAuditSink {
    fn name(&self) -> &'static str {
        "Terminal"
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    async fn record(&mut self, audit: &DeletionAudit) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", self.format_audit(audit));
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_audit() -> DeletionAudit {
        DeletionAudit {
            account_id: "acct-1".to_string(),
            requester: "acct-1".to_string(),
            requester_role: RequesterRole::User,
            contact_fingerprint: Some(crate::account::contact_fingerprint("test@example.com")),
            resources_removed: 2,
            completed_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn test_json_sink_appends_records() {
        let path = std::env::temp_dir().join(format!(
            "marketpulse-audit-{}.jsonl",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let mut sink = JsonAuditSink::new(path.clone(), false);
        sink.initialize().await.unwrap();
        sink.record(&sample_audit()).await.unwrap();
        sink.record(&sample_audit()).await.unwrap();
        sink.flush().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        let parsed: DeletionAudit = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.account_id, "acct-1");
        assert_eq!(parsed.resources_removed, 2);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_terminal_plain_format() {
        let sink = TerminalAuditSink::new(TerminalFormat::Plain);
        let line = sink.format_audit(&sample_audit());
        assert!(line.contains("acct-1"));
        assert!(line.contains("2 owned resources removed"));
    }

    #[tokio::test]
    async fn test_manager_skips_disabled_sinks() {
        let configs = vec![
            AuditConfig {
                sink: AuditSinkKind::Terminal {
                    format: TerminalFormat::Plain,
                },
                enabled: false,
            },
            AuditConfig {
                sink: AuditSinkKind::Terminal {
                    format: TerminalFormat::Json,
                },
                enabled: true,
            },
        ];

        let manager = AuditManager::from_config(&configs);
        assert_eq!(manager.sinks.len(), 1);
    }
}
