//! Text sink - human-readable per-run files
//!
//! Writes one text file per acquisition run, easy to grep and eyeball
//! during commissioning. Every flush becomes a column-header line, a
//! timestamp line, and one row per element.
//!
//! # Output Format
//!
//! ```text
//! # runID: 7
//! # digitizerID: 137
//! #       137    channel       time     charge
//! @1000
//!        137          2         50        400
//!        137          0        100        385
//! ```

use std::collections::HashSet;
use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use readout_format::{BatchMeta, ColumnHeader, EventBuffer};

use crate::common::{EventSink, SinkError, SinkMetrics, SinkMetricsHandle};

/// Sink that renders batches as aligned text rows, one file per run
pub struct TextSink {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
    /// Digitizers already announced with a `# digitizerID:` line
    seen: HashSet<u32>,
    /// Reusable formatting buffer
    block: String,
    metrics: Arc<SinkMetrics>,
}

impl TextSink {
    /// Open `<dir>/readout-run-<run_id>.txt` and write the run preamble
    pub fn new(
        name: impl Into<String>,
        dir: impl AsRef<Path>,
        run_id: u64,
    ) -> Result<Self, SinkError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("readout-run-{run_id}.txt"));
        let file = File::create(&path)
            .map_err(|e| SinkError::init(format!("could not open {}: {e}", path.display())))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "# runID: {run_id}")?;
        writer.flush()?;

        Ok(Self {
            name: name.into(),
            path,
            writer,
            seen: HashSet::new(),
            block: String::new(),
            metrics: Arc::new(SinkMetrics::new()),
        })
    }

    /// Path of the file being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metrics handle that stays valid after `drive` consumes the sink
    pub fn metrics_handle(&self) -> SinkMetricsHandle {
        SinkMetricsHandle::new(self.name.clone(), Arc::clone(&self.metrics))
    }
}

impl EventSink for TextSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    fn accept(&mut self, meta: &BatchMeta, buffer: &EventBuffer) -> Result<(), SinkError> {
        self.block.clear();
        if self.seen.insert(meta.digitizer_id) {
            writeln!(self.block, "# digitizerID: {}", meta.digitizer_id)
                .map_err(|e| SinkError::write(e.to_string()))?;
        }
        writeln!(
            self.block,
            "#{:>10} {}",
            meta.digitizer_id,
            ColumnHeader(buffer.kind())
        )
        .map_err(|e| SinkError::write(e.to_string()))?;
        writeln!(self.block, "@{}", meta.global_time)
            .map_err(|e| SinkError::write(e.to_string()))?;
        for element in buffer {
            writeln!(self.block, " {:>10} {element}", meta.digitizer_id)
                .map_err(|e| SinkError::write(e.to_string()))?;
        }

        self.writer.write_all(self.block.as_bytes())?;
        self.writer.flush()?;
        self.metrics
            .batch_written(buffer.len() as u64, self.block.len() as u64);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "text_test.rs"]
mod text_test;
