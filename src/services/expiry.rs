use crate::config::ExpiryConfig;
use crate::error::AppResult;
use crate::services::CaseService;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::time;
use tracing::{error, info};

const SWEEP_BATCH: i64 = 100;

/// Background task that cancels pending cases nobody picked up
pub struct CaseExpirySweeper {
    cases: Arc<CaseService>,
    config: ExpiryConfig,
}

impl CaseExpirySweeper {
    pub fn new(cases: Arc<CaseService>, config: ExpiryConfig) -> Self {
        Self { cases, config }
    }

    pub async fn start(self) {
        let mut interval = time::interval(self.config.sweep_interval());
        info!(
            "Case expiry sweeper started: every {:?}, expiring after {}h",
            self.config.sweep_interval(),
            self.config.case_expiry_hours
        );

        loop {
            interval.tick().await;

            if let Err(e) = self.sweep().await {
                error!("Error expiring cases: {}", e);
            }
        }
    }

    /// One pass; returns the number of expired cases
    pub async fn sweep(&self) -> AppResult<usize> {
        let cutoff = Utc::now().naive_utc() - ChronoDuration::hours(self.config.case_expiry_hours);
        let mut total = 0;

        loop {
            let expired = self.cases.expire_stale(cutoff, SWEEP_BATCH).await?;
            total += expired;
            if expired < SWEEP_BATCH as usize {
                break;
            }
        }

        if total > 0 {
            info!("Expired {} stale cases", total);
        }
        Ok(total)
    }
}
