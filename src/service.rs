use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::reporter::Reporter;
use crate::sampler::{Sampler, SystemSampler};
use crate::sink::{build_sink, Sink};
use crate::types::{LoopState, ReportSummary};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Owns a sampler, a sink and the background reporter task.
///
/// `start` hands the sampler and sink to a spawned task; `stop` cancels it and
/// waits for it, which drops the sampler and releases its OS handle.
/// The task runs on a child of the caller's token, so cancelling the caller's
/// token stops the monitor but `stop` and drop never cancel the caller's token.
pub struct ResourceMonitor {
    reporter: Reporter,
    parts: Option<(Box<dyn Sampler>, Box<dyn Sink>)>,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<Result<ReportSummary>>>,
    failed: Arc<AtomicBool>,
}

impl ResourceMonitor {
    pub fn new(reporter: Reporter, sampler: Box<dyn Sampler>, sink: Box<dyn Sink>) -> Self {
        Self {
            reporter,
            parts: Some((sampler, sink)),
            cancel: None,
            handle: None,
            failed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn from_config(config: &MonitorConfig) -> Result<Self> {
        config.validate()?;

        let reporter = Reporter::new(config.interval())?
            .with_failure_policy(config.failure_policy)
            .with_format(config.output_format);
        let sampler = SystemSampler::new()?;
        let sink = build_sink(config).await?;

        Ok(Self::new(reporter, Box::new(sampler), sink))
    }

    pub fn start(&mut self, cancel: CancellationToken) -> Result<()> {
        let (mut sampler, mut sink) = self
            .parts
            .take()
            .ok_or_else(|| Error::Lifecycle("monitor has already been started".to_string()))?;

        info!(
            "Starting resource monitor (interval {} ms, {:?} on failure)",
            self.reporter.interval().as_millis(),
            self.reporter.failure_policy()
        );

        let reporter = self.reporter.clone();
        let token = cancel.child_token();
        let run_token = token.clone();
        let failed = self.failed.clone();
        let handle = tokio::spawn(async move {
            let result = reporter.run(sampler.as_mut(), sink.as_mut(), &run_token).await;
            if result.is_err() {
                failed.store(true, Ordering::SeqCst);
            }
            if let Err(e) = sink.flush().await {
                debug!("Final sink flush failed: {}", e);
            }
            drop(sampler);
            result
        });

        self.cancel = Some(token);
        self.handle = Some(handle);

        Ok(())
    }

    /// Raises the cancellation signal and waits for the run to end.
    pub async fn stop(&mut self) -> Result<ReportSummary> {
        let cancel = self
            .cancel
            .as_ref()
            .ok_or_else(|| Error::Lifecycle("monitor was never started".to_string()))?;

        debug!("Stopping resource monitor");
        cancel.cancel();

        self.wait().await
    }

    /// Waits for the run to end without cancelling it.
    pub async fn wait(&mut self) -> Result<ReportSummary> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| Error::Lifecycle("monitor is not running".to_string()))?;

        let summary = handle
            .await
            .map_err(|e| Error::Lifecycle(format!("reporter task failed: {e}")))??;

        info!(
            "Resource monitor stopped: {} samples written, {} skipped",
            summary.samples_written, summary.samples_skipped
        );

        Ok(summary)
    }

    pub fn state(&self) -> LoopState {
        if self.failed.load(Ordering::SeqCst) {
            return LoopState::Failed;
        }

        match (&self.cancel, &self.handle) {
            (None, _) => LoopState::Idle,
            (Some(cancel), Some(handle)) if !cancel.is_cancelled() && !handle.is_finished() => {
                LoopState::Running
            }
            _ => LoopState::Cancelled,
        }
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }
}
