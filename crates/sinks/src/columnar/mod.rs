//! Columnar sink - self-describing binary column files
//!
//! Stores batches in a block-structured file whose schema blocks are
//! generated from each element kind's compound layout, so an offline
//! reader needs nothing but the file to interpret the records. Optional
//! LZ4 frame compression wraps the whole stream.
//!
//! # File Format
//!
//! All integers native-order, matching the wire format.
//!
//! ```text
//! preamble:  "RCOL" | u16 version
//! blocks:    u8 tag (1=schema, 2=batch) followed by the block body
//!
//! schema:    u32 digitizer | u16 kind | u16 samples | u32 record_size
//!            u16 field_count | fields...
//! field:     u8 name_len | name | u32 offset | u8 type_code | u16 array_len
//! batch:     u32 digitizer | u16 kind | u32 seq | u64 run_id
//!            u64 global_time | u16 count | u32 payload_len | payload
//! ```
//!
//! The schema for a `(digitizer, kind)` stream is fixed by its first
//! non-empty batch; later batches whose waveform sample count differs
//! are rejected with `SchemaMismatch` rather than silently widening the
//! records.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use readout_format::{
    BatchMeta, CompoundLayout, Element, ElementKind, EventBuffer, FieldType, CURRENT_VERSION,
};

use crate::common::{EventSink, SinkError, SinkMetrics, SinkMetricsHandle};

/// File magic for columnar output
pub const COLUMNAR_MAGIC: [u8; 4] = *b"RCOL";

const BLOCK_SCHEMA: u8 = 1;
const BLOCK_BATCH: u8 = 2;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the columnar sink
#[derive(Debug, Clone)]
pub struct ColumnarConfig {
    /// Output directory
    pub dir: PathBuf,

    /// Wrap the stream in an LZ4 frame
    pub compress: bool,
}

impl Default for ColumnarConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            compress: false,
        }
    }
}

// =============================================================================
// Writer side
// =============================================================================

enum BlockWriter {
    Plain(BufWriter<File>),
    Lz4(FrameEncoder<BufWriter<File>>),
}

impl BlockWriter {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.write_all(buf),
            Self::Lz4(w) => w.write_all(buf),
        }
    }

    fn finish(self) -> Result<(), SinkError> {
        match self {
            Self::Plain(mut w) => {
                w.flush()?;
                Ok(())
            }
            Self::Lz4(w) => {
                let mut inner = w.finish().map_err(|e| SinkError::write(e.to_string()))?;
                inner.flush()?;
                Ok(())
            }
        }
    }
}

/// Sink that writes self-describing columnar files
pub struct ColumnarSink {
    name: String,
    path: PathBuf,
    writer: Option<BlockWriter>,
    /// Sample count fixed per `(digitizer, kind)` stream
    schemas: HashMap<(u32, u16), u16>,
    scratch: BytesMut,
    metrics: Arc<SinkMetrics>,
}

impl ColumnarSink {
    /// Open `<dir>/readout-run-<run_id>.cols[.lz4]` and write the preamble
    pub fn new(
        name: impl Into<String>,
        config: &ColumnarConfig,
        run_id: u64,
    ) -> Result<Self, SinkError> {
        std::fs::create_dir_all(&config.dir)?;
        let suffix = if config.compress { ".cols.lz4" } else { ".cols" };
        let path = config.dir.join(format!("readout-run-{run_id}{suffix}"));
        let file = File::create(&path)
            .map_err(|e| SinkError::init(format!("could not open {}: {e}", path.display())))?;
        let buffered = BufWriter::new(file);
        let mut writer = if config.compress {
            BlockWriter::Lz4(FrameEncoder::new(buffered))
        } else {
            BlockWriter::Plain(buffered)
        };

        let mut preamble = [0u8; 6];
        preamble[..4].copy_from_slice(&COLUMNAR_MAGIC);
        preamble[4..].copy_from_slice(&CURRENT_VERSION.to_ne_bytes());
        writer.write_all(&preamble)?;

        Ok(Self {
            name: name.into(),
            path,
            writer: Some(writer),
            schemas: HashMap::new(),
            scratch: BytesMut::new(),
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

    fn encode_schema(out: &mut BytesMut, digitizer_id: u32, kind: ElementKind, samples: u16) {
        let layout = CompoundLayout::for_kind(kind, samples);
        out.put_u8(BLOCK_SCHEMA);
        out.put_u32_ne(digitizer_id);
        out.put_u16_ne(kind.as_u16());
        out.put_u16_ne(samples);
        out.put_u32_ne(layout.byte_size() as u32);
        out.put_u16_ne(layout.fields().len() as u16);
        for field in layout.fields() {
            out.put_u8(field.name.len() as u8);
            out.extend_from_slice(field.name.as_bytes());
            out.put_u32_ne(field.offset as u32);
            out.put_u8(field.ty.code());
            let array_len = match field.ty {
                FieldType::U16Array(n) => n,
                _ => 0,
            };
            out.put_u16_ne(array_len);
        }
    }

    fn encode_batch(out: &mut BytesMut, meta: &BatchMeta, buffer: &EventBuffer) {
        out.put_u8(BLOCK_BATCH);
        out.put_u32_ne(meta.digitizer_id);
        out.put_u16_ne(buffer.kind().as_u16());
        out.put_u32_ne(meta.seq_num);
        out.put_u64_ne(meta.run_id);
        out.put_u64_ne(meta.global_time);
        out.put_u16_ne(buffer.len() as u16);
        out.put_u32_ne(buffer.byte_size() as u32);
        for element in buffer {
            element.encode(out);
        }
    }
}

impl EventSink for ColumnarSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    fn accept(&mut self, meta: &BatchMeta, buffer: &EventBuffer) -> Result<(), SinkError> {
        if buffer.is_empty() {
            // Nothing to record; empty flushes only matter to network
            // consumers watching sequence numbers.
            tracing::trace!(sink = %self.name, digitizer = meta.digitizer_id, "skipping empty batch");
            return Ok(());
        }

        let kind = buffer.kind();
        let key = (meta.digitizer_id, kind.as_u16());
        let first_samples = buffer
            .iter()
            .next()
            .map(Element::num_samples)
            .unwrap_or(0);
        let samples = *self.schemas.get(&key).unwrap_or(&first_samples);

        // Every record in a stream must match its schema exactly.
        for element in buffer {
            if element.num_samples() != samples {
                return Err(SinkError::schema_mismatch(
                    meta.digitizer_id,
                    format!(
                        "{} with {} samples in a stream fixed at {}",
                        kind,
                        element.num_samples(),
                        samples
                    ),
                ));
            }
        }

        self.scratch.clear();
        if !self.schemas.contains_key(&key) {
            Self::encode_schema(&mut self.scratch, meta.digitizer_id, kind, samples);
            self.schemas.insert(key, samples);
        }
        Self::encode_batch(&mut self.scratch, meta, buffer);

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SinkError::write("columnar sink already closed"))?;
        writer.write_all(&self.scratch)?;
        self.metrics
            .batch_written(buffer.len() as u64, self.scratch.len() as u64);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        match self.writer.take() {
            Some(writer) => writer.finish(),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Reader side
// =============================================================================

/// Schema block decoded from a columnar file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaBlock {
    pub digitizer_id: u32,
    pub kind: ElementKind,
    pub samples: u16,
    pub record_size: u32,
    /// `(name, offset, type_code, array_len)` per field
    pub fields: Vec<(String, u32, u8, u16)>,
}

/// Batch block decoded from a columnar file
#[derive(Debug, Clone)]
pub struct BatchBlock {
    pub meta: BatchMeta,
    pub kind: ElementKind,
    pub elements: Vec<Element>,
}

/// One decoded block
#[derive(Debug, Clone)]
pub enum ColumnarBlock {
    Schema(SchemaBlock),
    Batch(BatchBlock),
}

/// Sequential reader over a columnar file's contents
///
/// Used by offline tooling and tests; hand it the raw plain bytes or
/// let `from_file` handle LZ4 detection by file extension.
#[derive(Debug)]
pub struct ColumnarReader {
    data: Vec<u8>,
    pos: usize,
}

impl ColumnarReader {
    /// Parse the preamble of an in-memory columnar stream
    pub fn new(data: Vec<u8>) -> Result<Self, SinkError> {
        if data.len() < 6 {
            return Err(SinkError::write("columnar stream shorter than preamble"));
        }
        if data[..4] != COLUMNAR_MAGIC {
            return Err(SinkError::write("bad columnar magic"));
        }
        let version = u16::from_ne_bytes([data[4], data[5]]);
        if readout_format::version_major(version) != readout_format::version_major(CURRENT_VERSION)
        {
            return Err(SinkError::write(format!(
                "unsupported columnar version {version:#06x}"
            )));
        }
        Ok(Self { data, pos: 6 })
    }

    /// Open a file, transparently decompressing `.lz4` streams
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let mut raw = Vec::new();
        let file = File::open(path)?;
        if path.extension().is_some_and(|ext| ext == "lz4") {
            FrameDecoder::new(file).read_to_end(&mut raw)?;
        } else {
            io::BufReader::new(file).read_to_end(&mut raw)?;
        }
        Self::new(raw)
    }

    fn rest(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    fn take(&mut self, n: usize) -> Result<&[u8], SinkError> {
        if self.rest().len() < n {
            return Err(SinkError::write("truncated columnar block"));
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }

    fn take_u8(&mut self) -> Result<u8, SinkError> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, SinkError> {
        let b = self.take(2)?;
        Ok(u16::from_ne_bytes([b[0], b[1]]))
    }

    fn take_u32(&mut self) -> Result<u32, SinkError> {
        let b = self.take(4)?;
        Ok(u32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn take_u64(&mut self) -> Result<u64, SinkError> {
        let b = self.take(8)?;
        Ok(u64::from_ne_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn take_kind(&mut self) -> Result<ElementKind, SinkError> {
        let tag = self.take_u16()?;
        ElementKind::from_u16(tag)
            .ok_or_else(|| SinkError::write(format!("unknown element kind {tag:#06x}")))
    }

    /// Decode the next block, or `None` at end of stream
    pub fn next_block(&mut self) -> Result<Option<ColumnarBlock>, SinkError> {
        if self.rest().is_empty() {
            return Ok(None);
        }
        match self.take_u8()? {
            BLOCK_SCHEMA => {
                let digitizer_id = self.take_u32()?;
                let kind = self.take_kind()?;
                let samples = self.take_u16()?;
                let record_size = self.take_u32()?;
                let field_count = self.take_u16()?;
                let mut fields = Vec::with_capacity(field_count as usize);
                for _ in 0..field_count {
                    let name_len = self.take_u8()? as usize;
                    let name = String::from_utf8(self.take(name_len)?.to_vec())
                        .map_err(|e| SinkError::write(e.to_string()))?;
                    let offset = self.take_u32()?;
                    let type_code = self.take_u8()?;
                    let array_len = self.take_u16()?;
                    fields.push((name, offset, type_code, array_len));
                }
                Ok(Some(ColumnarBlock::Schema(SchemaBlock {
                    digitizer_id,
                    kind,
                    samples,
                    record_size,
                    fields,
                })))
            }
            BLOCK_BATCH => {
                let digitizer_id = self.take_u32()?;
                let kind = self.take_kind()?;
                let seq_num = self.take_u32()?;
                let run_id = self.take_u64()?;
                let global_time = self.take_u64()?;
                let count = self.take_u16()?;
                let payload_len = self.take_u32()? as usize;
                let mut payload = self.take(payload_len)?;
                let mut elements = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    elements.push(Element::decode(kind, &mut payload)?);
                }
                if payload.has_remaining() {
                    return Err(SinkError::write("batch payload has trailing bytes"));
                }
                Ok(Some(ColumnarBlock::Batch(BatchBlock {
                    meta: BatchMeta {
                        run_id,
                        global_time,
                        digitizer_id,
                        seq_num,
                    },
                    kind,
                    elements,
                })))
            }
            other => Err(SinkError::write(format!("unknown block tag {other}"))),
        }
    }
}

#[cfg(test)]
#[path = "columnar_test.rs"]
mod columnar_test;
