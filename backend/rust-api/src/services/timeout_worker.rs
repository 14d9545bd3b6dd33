use chrono::Utc;
use mongodb::Database;
use redis::aio::ConnectionManager;

use super::attempt_service::AttemptService;
use crate::config::Config;
use crate::metrics::TIMEOUT_SWEEPS_TOTAL;
use crate::models::AbandonOrigin;

const SWEEP_BATCH_SIZE: i64 = 100;

/// The idle-timeout collaborator. It owns no state-machine logic of its own:
/// each sweep just calls the same `abandon` entry point a user would, with a
/// timeout origin, and relies on that path's idempotence.
pub struct TimeoutWorker {
    attempts: AttemptService,
    config: Config,
}

impl TimeoutWorker {
    pub fn new(mongo: Database, redis: ConnectionManager, config: Config) -> Self {
        Self {
            attempts: AttemptService::new(mongo, redis),
            config,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let interval = std::time::Duration::from_secs(self.config.timeout_poll_secs);
        tracing::info!(
            "timeout worker started: idle_timeout={}s, poll={}s",
            self.config.attempt_idle_timeout_secs,
            self.config.timeout_poll_secs
        );

        loop {
            match self.sweep_once().await {
                Ok(abandoned) => {
                    TIMEOUT_SWEEPS_TOTAL.with_label_values(&["ok"]).inc();
                    if abandoned > 0 {
                        tracing::info!("timeout sweep abandoned {} stale attempts", abandoned);
                    }
                }
                Err(e) => {
                    TIMEOUT_SWEEPS_TOTAL.with_label_values(&["error"]).inc();
                    tracing::error!("timeout sweep failed: {:#}", e);
                }
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// One pass: abandon every attempt idle past the threshold. Per-attempt
    /// failures are logged and skipped; the next sweep picks them up again.
    pub async fn sweep_once(&self) -> anyhow::Result<usize> {
        let cutoff_ms = Utc::now().timestamp_millis()
            - (self.config.attempt_idle_timeout_secs as i64) * 1000;

        let stale = self.attempts.find_stale(cutoff_ms, SWEEP_BATCH_SIZE).await?;
        let mut abandoned = 0usize;

        for attempt in stale {
            match self
                .attempts
                .abandon_internal(&attempt.id, AbandonOrigin::IdleTimeout)
                .await
            {
                Ok(_) => abandoned += 1,
                Err(e) => {
                    tracing::warn!("failed to abandon stale attempt {}: {:#}", attempt.id, e);
                }
            }
        }

        Ok(abandoned)
    }
}
