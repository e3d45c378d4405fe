use crate::error::{Error, Result};
use crate::sampler::Sampler;
use crate::sink::Sink;
use crate::types::{FailurePolicy, OutputFormat, ReportSummary};
use std::time::{Duration, SystemTime};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Drives the sample, format, write cycle on a fixed interval.
#[derive(Debug, Clone)]
pub struct Reporter {
    interval: Duration,
    failure_policy: FailurePolicy,
    format: OutputFormat,
}

impl Reporter {
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::Configuration(
                "report interval must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            interval,
            failure_policy: FailurePolicy::default(),
            format: OutputFormat::default(),
        })
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Runs until `cancel` fires. The first sample is taken immediately.
    ///
    /// Cancellation wins over a ready tick, so a token that is already
    /// cancelled produces no samples. Under `FailurePolicy::Terminate` the
    /// first sampling or write error ends the run.
    pub async fn run<S, K>(
        &self,
        sampler: &mut S,
        sink: &mut K,
        cancel: &CancellationToken,
    ) -> Result<ReportSummary>
    where
        S: Sampler + ?Sized,
        K: Sink + ?Sized,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut summary = ReportSummary::default();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(
                        "Reporter cancelled after {} samples ({} skipped)",
                        summary.samples_written, summary.samples_skipped
                    );
                    break;
                }
                _ = ticker.tick() => {}
            }

            match self.report_once(sampler, sink).await {
                Ok(()) => summary.samples_written += 1,
                Err(e) if self.failure_policy == FailurePolicy::Skip && e.is_transient() => {
                    warn!("Skipping sample: {}", e);
                    summary.samples_skipped += 1;
                }
                Err(e) => {
                    error!("Reporter stopped: {}", e);
                    return Err(e);
                }
            }
        }

        Ok(summary)
    }

    async fn report_once<S, K>(&self, sampler: &mut S, sink: &mut K) -> Result<()>
    where
        S: Sampler + ?Sized,
        K: Sink + ?Sized,
    {
        let reading = sampler.read()?;
        let line = reading.render(self.format, SystemTime::now())?;
        sink.write_line(&line).await
    }
}
