//! Report output
//!
//! Open ports are written as they are discovered, one `Port <N> open` line
//! each, and flushed immediately so a pipe sees them without batching.

use crate::network::PortReport;
use crate::scanner::ScanStream;
use futures::StreamExt;
use std::io::{self, Write};

/// Writes report lines to any sink
pub struct ReportPrinter<W: Write> {
    out: W,
    written: usize,
}

impl ReportPrinter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ReportPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    /// Write one report line and flush
    pub fn print(&mut self, report: &PortReport) -> io::Result<()> {
        writeln!(self.out, "{}", report)?;
        self.out.flush()?;
        self.written += 1;
        Ok(())
    }

    /// Print every report of `stream` as it arrives; returns the number printed
    pub async fn drain(&mut self, stream: &mut ScanStream) -> io::Result<usize> {
        while let Some(report) = stream.next().await {
            self.print(&report)?;
        }
        Ok(self.written)
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
