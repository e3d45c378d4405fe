use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::types::SinkKind;
use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt, Stderr, Stdout};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Destination for formatted report lines. Lines arrive newline-terminated.
#[async_trait]
pub trait Sink: Send {
    async fn write_line(&mut self, line: &str) -> Result<()>;

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes each line to an async writer and flushes it immediately.
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl WriterSink<Stderr> {
    pub fn stderr() -> Self {
        Self::new(tokio::io::stderr())
    }
}

impl WriterSink<File> {
    pub async fn append_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(Error::SinkWriteFailure)?;

        debug!("Appending report lines to {}", path.display());
        Ok(Self::new(file))
    }
}

#[async_trait]
impl<W> Sink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(Error::SinkWriteFailure)?;
        self.writer.flush().await.map_err(Error::SinkWriteFailure)
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await.map_err(Error::SinkWriteFailure)
    }
}

/// Emits each line as a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl Sink for LogSink {
    async fn write_line(&mut self, line: &str) -> Result<()> {
        info!(target: "resmon::report", "{}", line.trim_end());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryBuffer {
    lines: Vec<String>,
    closed: bool,
}

/// In-memory line buffer. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    buffer: Arc<Mutex<MemoryBuffer>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lines(&self) -> Vec<String> {
        self.buffer.lock().await.lines.clone()
    }

    /// Rejects every later write, as a closed stream would.
    pub async fn close(&self) {
        self.buffer.lock().await.closed = true;
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write_line(&mut self, line: &str) -> Result<()> {
        let mut buffer = self.buffer.lock().await;
        if buffer.closed {
            return Err(Error::SinkWriteFailure(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "memory sink is closed",
            )));
        }
        buffer.lines.push(line.to_string());
        Ok(())
    }
}

pub async fn build_sink(config: &MonitorConfig) -> Result<Box<dyn Sink>> {
    let sink: Box<dyn Sink> = match config.sink {
        SinkKind::Stdout => Box::new(WriterSink::stdout()),
        SinkKind::Stderr => Box::new(WriterSink::stderr()),
        SinkKind::Log => Box::new(LogSink),
        SinkKind::File => {
            let path = config.output_path.as_deref().ok_or_else(|| {
                Error::Configuration("file sink requires output_path".to_string())
            })?;
            Box::new(WriterSink::append_file(path).await?)
        }
    };

    Ok(sink)
}
