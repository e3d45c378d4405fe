// Copyright (c) Abstract Machines

//! resmon - periodic system resource reporter
//!
//! Samples global CPU usage and available memory on a fixed interval and
//! writes one formatted line per sample to a configurable sink, until a
//! cancellation signal is raised.

pub mod config;
pub mod error;
pub mod reporter;
pub mod sampler;
pub mod service;
pub mod sink;
pub mod types;

// Re-export commonly used types
pub use config::MonitorConfig;
pub use error::{Error, Result};
pub use reporter::Reporter;
pub use sampler::{Sampler, SystemSampler};
pub use service::ResourceMonitor;
pub use sink::{LogSink, MemorySink, Sink, WriterSink};
pub use tokio_util::sync::CancellationToken;
pub use types::{FailurePolicy, LoopState, OutputFormat, ReportSummary, ResourceReading, SinkKind};
