use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single CPU and memory sample. Not retained after it is written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceReading {
    pub cpu_usage_percent: f32,
    pub available_memory_mb: f32,
}

impl ResourceReading {
    pub fn new(cpu_usage_percent: f32, available_memory_mb: f32) -> Self {
        Self {
            cpu_usage_percent,
            available_memory_mb,
        }
    }

    /// Renders the reading as a newline-terminated line in the given format.
    pub fn render(&self, format: OutputFormat, sampled_at: SystemTime) -> Result<String> {
        match format {
            OutputFormat::Text => Ok(format!("{}\n", self)),
            OutputFormat::Json => {
                let record = ReadingRecord {
                    timestamp_ms: sampled_at
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_millis() as u64)
                        .unwrap_or(0),
                    reading: *self,
                };
                let mut line = serde_json::to_string(&record)?;
                line.push('\n');
                Ok(line)
            }
        }
    }
}

impl fmt::Display for ResourceReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CPU Usage: {:.2}% | Available Memory: {} MB",
            self.cpu_usage_percent, self.available_memory_mb
        )
    }
}

#[derive(Debug, Serialize)]
struct ReadingRecord {
    timestamp_ms: u64,
    #[serde(flatten)]
    reading: ResourceReading,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::Configuration(format!(
                "unknown output format '{other}'"
            ))),
        }
    }
}

/// What the reporter loop does when a sample or a write fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// End the run and return the error to the owner.
    #[default]
    Terminate,
    /// Log the failure and wait for the next tick.
    Skip,
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "terminate" => Ok(FailurePolicy::Terminate),
            "skip" => Ok(FailurePolicy::Skip),
            other => Err(Error::Configuration(format!(
                "unknown failure policy '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Stdout,
    Stderr,
    File,
    Log,
}

impl FromStr for SinkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "stdout" => Ok(SinkKind::Stdout),
            "stderr" => Ok(SinkKind::Stderr),
            "file" => Ok(SinkKind::File),
            "log" => Ok(SinkKind::Log),
            other => Err(Error::Configuration(format!("unknown sink '{other}'"))),
        }
    }
}

/// `Cancelled` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Idle,
    Running,
    /// The run ended because its cancellation signal was raised.
    Cancelled,
    /// The run ended with a sampling or sink error.
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub samples_written: u64,
    pub samples_skipped: u64,
}
