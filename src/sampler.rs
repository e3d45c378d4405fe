use crate::error::{Error, Result};
use crate::types::ResourceReading;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::debug;

const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// Source of instantaneous CPU and memory readings.
pub trait Sampler: Send {
    fn read(&mut self) -> Result<ResourceReading>;
}

impl<F> Sampler for F
where
    F: FnMut() -> Result<ResourceReading> + Send,
{
    fn read(&mut self) -> Result<ResourceReading> {
        self()
    }
}

/// Reads global CPU usage and available RAM through `sysinfo`.
///
/// The `System` handle is kept for the sampler's lifetime so CPU usage is
/// computed against the previous refresh. The first reading after
/// construction may report 0% until the OS has accumulated a delta.
pub struct SystemSampler {
    system: System,
}

impl SystemSampler {
    pub fn new() -> Result<Self> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(Error::SamplingUnavailable(format!(
                "resource counters are not supported on {}",
                std::env::consts::OS
            )));
        }

        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::new().with_cpu_usage())
                .with_memory(MemoryRefreshKind::new().with_ram()),
        );

        if system.cpus().is_empty() {
            return Err(Error::SamplingUnavailable(
                "no processors reported by the OS".to_string(),
            ));
        }

        debug!(
            "System sampler ready: {} cpus, {} MB total memory",
            system.cpus().len(),
            system.total_memory() / BYTES_PER_MEGABYTE
        );

        Ok(Self { system })
    }
}

impl Sampler for SystemSampler {
    fn read(&mut self) -> Result<ResourceReading> {
        self.system.refresh_cpu_usage();
        self.system
            .refresh_memory_specifics(MemoryRefreshKind::new().with_ram());

        if self.system.cpus().is_empty() {
            return Err(Error::SamplingUnavailable(
                "no processors reported by the OS".to_string(),
            ));
        }

        if self.system.total_memory() == 0 {
            return Err(Error::SamplingUnavailable(
                "memory counters returned no data".to_string(),
            ));
        }

        let available_mb = self.system.available_memory() / BYTES_PER_MEGABYTE;

        Ok(ResourceReading {
            cpu_usage_percent: self.system.global_cpu_usage(),
            available_memory_mb: available_mb as f32,
        })
    }
}
