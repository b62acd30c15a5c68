use crate::bidding::BidSettlement;
use crate::error::{AppError, AppResult};
use crate::models::{Bid, Case};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub event_type: String, // "case_status_changed", "bid_placed", "bid_settled"
    pub case_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub details: serde_json::Value,
}

struct AuditSink {
    directory: PathBuf,
    date: String,
    file: std::fs::File,
}

fn open_day_file(directory: &PathBuf, date: &str) -> AppResult<std::fs::File> {
    let log_file = directory.join(format!("audit_{}.log", date));
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .map_err(|e| AppError::Message(format!("Failed to open audit log file: {}", e)))
}

/// Append-only JSON-lines audit trail, one file per day
pub struct AuditTrailService {
    sink: Option<Arc<Mutex<AuditSink>>>,
}

impl AuditTrailService {
    pub fn new(log_directory: PathBuf) -> AppResult<Self> {
        std::fs::create_dir_all(&log_directory)
            .map_err(|e| AppError::Message(format!("Failed to create log directory: {}", e)))?;

        let date = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let file = open_day_file(&log_directory, &date)?;

        info!("Audit trail initialized in {:?}", log_directory);

        Ok(Self {
            sink: Some(Arc::new(Mutex::new(AuditSink {
                directory: log_directory,
                date,
                file,
            }))),
        })
    }

    /// Audit trail that drops every entry
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub async fn log(&self, entry: AuditLogEntry) -> AppResult<()> {
        let Some(sink) = &self.sink else {
            return Ok(());
        };

        let json = serde_json::to_string(&entry)?;
        let mut sink = sink.lock().await;

        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        if sink.date != today {
            sink.file = open_day_file(&sink.directory, &today)?;
            sink.date = today;
        }

        writeln!(sink.file, "{}", json)
            .map_err(|e| AppError::Message(format!("Failed to write audit log: {}", e)))?;
        sink.file
            .flush()
            .map_err(|e| AppError::Message(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    /// Audit failures never fail the request
    async fn record(&self, entry: AuditLogEntry) {
        if let Err(e) = self.log(entry).await {
            warn!("Audit write failed: {}", e);
        }
    }

    pub async fn log_case_status_changed(&self, case: &Case, from: &str, actor_id: Option<Uuid>) {
        self.record(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "case_status_changed".to_string(),
            case_id: Some(case.id),
            actor_id,
            details: serde_json::json!({
                "from": from,
                "to": case.status,
                "provider_id": case.provider_id,
            }),
        })
        .await
    }

    pub async fn log_bid_placed(&self, bid: &Bid, points_balance: i64) {
        self.record(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "bid_placed".to_string(),
            case_id: Some(bid.case_id),
            actor_id: Some(bid.provider_id),
            details: serde_json::json!({
                "bid_id": bid.id,
                "proposed_price": bid.proposed_price.to_string(),
                "points_spent": bid.points_spent,
                "points_balance": points_balance,
            }),
        })
        .await
    }

    pub async fn log_bid_settled(&self, case_id: Uuid, settlement: &BidSettlement) {
        self.record(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "bid_settled".to_string(),
            case_id: Some(case_id),
            actor_id: Some(settlement.provider_id),
            details: serde_json::json!({
                "bid_id": settlement.bid_id,
                "status": settlement.status.as_str(),
                "refund": settlement.refund,
            }),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entries_are_json_lines() {
        let dir = std::env::temp_dir().join(format!("majstor-audit-{}", Uuid::new_v4()));
        let audit = AuditTrailService::new(dir.clone()).unwrap();

        for event_type in ["bid_placed", "bid_settled"] {
            audit
                .log(AuditLogEntry {
                    timestamp: 0,
                    event_type: event_type.to_string(),
                    case_id: None,
                    actor_id: None,
                    details: serde_json::json!({}),
                })
                .await
                .unwrap();
        }

        let date = chrono::Utc::now().format("%Y-%m-%d");
        let content = std::fs::read_to_string(dir.join(format!("audit_{}.log", date))).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: AuditLogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.event_type, "bid_placed");

        std::fs::remove_dir_all(dir).ok();
    }
}
