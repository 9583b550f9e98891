//! Export dispatcher.
//!
//! Drains the durable outbox on an interval (and on explicit flush),
//! giving each record a bounded number of delivery attempts with
//! exponential backoff. Fatal rejections and exhausted budgets are
//! marked failed with the error retained, never silently dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use applebites_common::config::ExportConfig;

use super::transport::ExportTransport;
use crate::store::{AssessmentStore, ExportRecord, ExportStatus};

/// How many outbox records one dispatch pass picks up.
const DISPATCH_BATCH_SIZE: usize = 50;

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DispatchSummary {
    /// Exports delivered this pass
    pub delivered: u32,
    /// Exports marked failed this pass
    pub failed: u32,
    /// Exports still pending after this pass
    pub remaining: u64,
    /// When the pass finished
    pub finished_at: DateTime<Utc>,
}

/// Background dispatcher for CRM exports.
pub struct ExportDispatcher {
    store: Arc<AssessmentStore>,
    transport: Arc<dyn ExportTransport>,
    max_attempts: u32,
    base_backoff: Duration,
    interval: Duration,
    last_dispatch: Mutex<Option<DispatchSummary>>,
}

impl ExportDispatcher {
    /// Create a dispatcher over a store and transport.
    pub fn new(
        store: Arc<AssessmentStore>,
        transport: Arc<dyn ExportTransport>,
        config: &ExportConfig,
    ) -> Self {
        Self {
            store,
            transport,
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            interval: Duration::from_secs(config.dispatch_interval_secs.max(1)),
            last_dispatch: Mutex::new(None),
        }
    }

    /// Transport kind for the status endpoint.
    pub fn transport_kind(&self) -> &'static str {
        self.transport.kind()
    }

    /// Summary of the most recent dispatch pass.
    pub fn last_dispatch(&self) -> Option<DispatchSummary> {
        *self.last_dispatch.lock().unwrap()
    }

    /// Run the dispatch loop until the process exits.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let summary = self.flush().await;
            if summary.delivered > 0 || summary.failed > 0 {
                tracing::info!(
                    delivered = summary.delivered,
                    failed = summary.failed,
                    remaining = summary.remaining,
                    "Export dispatch pass complete"
                );
            }
        }
    }

    /// Run one dispatch pass over the pending outbox.
    pub async fn flush(&self) -> DispatchSummary {
        let mut delivered = 0u32;
        let mut failed = 0u32;

        let pending = match self.store.pending_exports(DISPATCH_BATCH_SIZE) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read export outbox");
                vec![]
            }
        };

        for record in pending {
            match self.deliver_with_retry(&record).await {
                Ok(()) => delivered += 1,
                Err(()) => failed += 1,
            }
        }

        let remaining = self.store.export_queue_depth().unwrap_or(0);
        let summary = DispatchSummary {
            delivered,
            failed,
            remaining,
            finished_at: Utc::now(),
        };
        *self.last_dispatch.lock().unwrap() = Some(summary);
        summary
    }

    /// Attempt one record within the attempt budget.
    ///
    /// Ok means delivered; Err means the record was marked failed.
    async fn deliver_with_retry(&self, record: &ExportRecord) -> Result<(), ()> {
        let mut attempts = record.attempts;
        let mut last_error = None;

        while attempts < self.max_attempts {
            attempts += 1;

            match self.transport.deliver(&record.payload).await {
                Ok(()) => {
                    tracing::info!(
                        export_id = %record.id,
                        assessment_id = %record.assessment_id,
                        attempts,
                        transport = self.transport.kind(),
                        "Export delivered"
                    );
                    if let Err(e) =
                        self.store
                            .update_export(&record.id, ExportStatus::Delivered, attempts, None)
                    {
                        tracing::error!(export_id = %record.id, error = %e, "Failed to mark export delivered");
                    }
                    return Ok(());
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        export_id = %record.id,
                        attempt = attempts,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Export delivery failed, will retry"
                    );
                    last_error = Some(e.to_string());

                    if attempts < self.max_attempts {
                        // Exponential backoff: base * 2^(attempt-1)
                        let backoff = self.base_backoff * 2u32.saturating_pow(attempts - 1);
                        tokio::time::sleep(backoff).await;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        export_id = %record.id,
                        error = %e,
                        "Export rejected, not retrying"
                    );
                    self.mark_failed(&record.id, attempts, &e.to_string());
                    return Err(());
                }
            }
        }

        let error = last_error.unwrap_or_else(|| "attempt budget exhausted".into());
        tracing::error!(
            export_id = %record.id,
            attempts,
            error = %error,
            "Export attempt budget exhausted"
        );
        self.mark_failed(&record.id, attempts, &error);
        Err(())
    }

    fn mark_failed(&self, id: &str, attempts: u32, error: &str) {
        if let Err(e) = self
            .store
            .update_export(id, ExportStatus::Failed, attempts, Some(error))
        {
            tracing::error!(export_id = %id, error = %e, "Failed to mark export failed");
        }
    }
}
