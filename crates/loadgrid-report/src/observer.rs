//! Report sinks.

use std::io::Write;
use std::sync::Mutex;

use tracing::info;

use crate::report::UtilizationReport;

/// Receives every utilization report.
///
/// A returned error is logged by the reporter and does not stop reporting.
pub trait UtilizationObserver: Send + Sync {
    fn observe(&self, report: &UtilizationReport) -> anyhow::Result<()>;
}

/// Logs one `info` event per node.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl UtilizationObserver for TracingObserver {
    fn observe(&self, report: &UtilizationReport) -> anyhow::Result<()> {
        for n in &report.nodes {
            info!(
                node_id = n.node_id,
                used = n.used,
                capacity = n.capacity,
                percent = n.percent,
                "node utilization"
            );
        }
        Ok(())
    }
}

/// Output encoding of a [`WriterObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable block, one line per node.
    Text,
    /// One JSON object per report, newline-terminated.
    Json,
}

/// Writes reports to any `Write` sink.
pub struct WriterObserver {
    format: ReportFormat,
    out: Mutex<Box<dyn Write + Send>>,
}

impl WriterObserver {
    pub fn new(format: ReportFormat, out: Box<dyn Write + Send>) -> Self {
        Self {
            format,
            out: Mutex::new(out),
        }
    }

    pub fn stdout(format: ReportFormat) -> Self {
        Self::new(format, Box::new(std::io::stdout()))
    }
}

impl UtilizationObserver for WriterObserver {
    fn observe(&self, report: &UtilizationReport) -> anyhow::Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("report writer lock poisoned"))?;
        match self.format {
            ReportFormat::Text => writeln!(out, "{report}")?,
            ReportFormat::Json => {
                serde_json::to_writer(&mut *out, report)?;
                writeln!(out)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for WriterObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterObserver")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}
