//! Tests for the columnar sink and its reader

use readout_format::{
    BatchMeta, Element, ElementKind, EventBuffer, ListElement422, Waveform, Waveform422Element,
};

use crate::columnar::{ColumnarBlock, ColumnarConfig, ColumnarReader, ColumnarSink};
use crate::common::{EventSink, SinkError};

fn meta(digitizer_id: u32, seq_num: u32) -> BatchMeta {
    BatchMeta {
        run_id: 7,
        global_time: 1000 + u64::from(seq_num),
        digitizer_id,
        seq_num,
    }
}

fn list_buffer(rows: &[(u32, u16, u16)]) -> EventBuffer {
    let mut buffer = EventBuffer::unbounded(ElementKind::List422);
    for &(time, channel, charge) in rows {
        buffer
            .append(Element::List422(ListElement422 {
                time,
                channel,
                charge,
            }))
            .unwrap();
    }
    buffer
}

fn waveform_buffer(samples_per_element: &[usize]) -> EventBuffer {
    let mut buffer = EventBuffer::unbounded(ElementKind::Waveform422);
    for (i, &n) in samples_per_element.iter().enumerate() {
        buffer
            .append(Element::Waveform422(Waveform422Element {
                base: ListElement422 {
                    time: i as u32 * 10,
                    channel: i as u16,
                    charge: 100,
                },
                waveform: Waveform::new(vec![7; n]),
            }))
            .unwrap();
    }
    buffer
}

fn read_blocks(path: &std::path::Path) -> Vec<ColumnarBlock> {
    let mut reader = ColumnarReader::from_file(path).unwrap();
    let mut blocks = Vec::new();
    while let Some(block) = reader.next_block().unwrap() {
        blocks.push(block);
    }
    blocks
}

// =============================================================================
// Writer + reader round trips
// =============================================================================

#[test]
fn schema_then_batches_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = ColumnarConfig {
        dir: dir.path().to_path_buf(),
        compress: false,
    };
    let mut sink = ColumnarSink::new("columnar", &config, 7).unwrap();

    let first = list_buffer(&[(50, 2, 400), (100, 0, 385)]);
    let second = list_buffer(&[(150, 1, 390)]);
    sink.accept(&meta(137, 0), &first).unwrap();
    sink.accept(&meta(137, 1), &second).unwrap();
    sink.close().unwrap();

    let blocks = read_blocks(sink.path());
    assert_eq!(blocks.len(), 3);

    // Schema is written once, before the first batch of the stream.
    match &blocks[0] {
        ColumnarBlock::Schema(schema) => {
            assert_eq!(schema.digitizer_id, 137);
            assert_eq!(schema.kind, ElementKind::List422);
            assert_eq!(schema.record_size, 8);
            let names: Vec<&str> = schema.fields.iter().map(|f| f.0.as_str()).collect();
            assert_eq!(names, ["time", "channel", "charge"]);
        }
        other => panic!("expected schema block, got {other:?}"),
    }

    match &blocks[1] {
        ColumnarBlock::Batch(batch) => {
            assert_eq!(batch.meta, meta(137, 0));
            assert_eq!(batch.kind, ElementKind::List422);
            assert_eq!(batch.elements.len(), 2);
            assert_eq!(
                batch.elements[0],
                Element::List422(ListElement422 {
                    time: 50,
                    channel: 2,
                    charge: 400,
                })
            );
        }
        other => panic!("expected batch block, got {other:?}"),
    }

    match &blocks[2] {
        ColumnarBlock::Batch(batch) => {
            assert_eq!(batch.meta.seq_num, 1);
            assert_eq!(batch.elements.len(), 1);
        }
        other => panic!("expected batch block, got {other:?}"),
    }
}

#[test]
fn each_stream_gets_its_own_schema() {
    let dir = tempfile::tempdir().unwrap();
    let config = ColumnarConfig {
        dir: dir.path().to_path_buf(),
        compress: false,
    };
    let mut sink = ColumnarSink::new("columnar", &config, 7).unwrap();

    sink.accept(&meta(1, 0), &list_buffer(&[(10, 0, 1)])).unwrap();
    sink.accept(&meta(2, 0), &list_buffer(&[(20, 1, 2)])).unwrap();
    sink.accept(&meta(1, 1), &list_buffer(&[(30, 2, 3)])).unwrap();
    sink.close().unwrap();

    let schemas: Vec<u32> = read_blocks(sink.path())
        .iter()
        .filter_map(|b| match b {
            ColumnarBlock::Schema(s) => Some(s.digitizer_id),
            ColumnarBlock::Batch(_) => None,
        })
        .collect();
    assert_eq!(schemas, [1, 2]);
}

#[test]
fn lz4_stream_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let config = ColumnarConfig {
        dir: dir.path().to_path_buf(),
        compress: true,
    };
    let mut sink = ColumnarSink::new("columnar", &config, 7).unwrap();
    assert!(sink.path().to_string_lossy().ends_with(".cols.lz4"));

    sink.accept(&meta(137, 0), &list_buffer(&[(50, 2, 400)]))
        .unwrap();
    sink.close().unwrap();

    let blocks = read_blocks(sink.path());
    assert_eq!(blocks.len(), 2);
    match &blocks[1] {
        ColumnarBlock::Batch(batch) => assert_eq!(batch.elements.len(), 1),
        other => panic!("expected batch block, got {other:?}"),
    }
}

// =============================================================================
// Schema discipline
// =============================================================================

#[test]
fn waveform_schema_is_fixed_by_first_batch() {
    let dir = tempfile::tempdir().unwrap();
    let config = ColumnarConfig {
        dir: dir.path().to_path_buf(),
        compress: false,
    };
    let mut sink = ColumnarSink::new("columnar", &config, 7).unwrap();

    sink.accept(&meta(1, 0), &waveform_buffer(&[16, 16])).unwrap();

    // A later batch with a different sample count is rejected whole.
    let err = sink
        .accept(&meta(1, 1), &waveform_buffer(&[32]))
        .unwrap_err();
    assert!(matches!(err, SinkError::SchemaMismatch { digitizer_id: 1, .. }));

    // Matching batches keep flowing.
    sink.accept(&meta(1, 2), &waveform_buffer(&[16])).unwrap();
    sink.close().unwrap();

    let blocks = read_blocks(sink.path());
    assert_eq!(blocks.len(), 3);
    match &blocks[0] {
        ColumnarBlock::Schema(schema) => {
            assert_eq!(schema.samples, 16);
            assert_eq!(schema.record_size, 8 + 2 + 16 * 2);
            // Array field advertises its fixed length.
            let (name, _, code, array_len) = schema.fields.last().unwrap();
            assert_eq!(name, "samples");
            assert_eq!(*code, 5);
            assert_eq!(*array_len, 16);
        }
        other => panic!("expected schema block, got {other:?}"),
    }
}

#[test]
fn mixed_sample_counts_within_a_batch_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = ColumnarConfig {
        dir: dir.path().to_path_buf(),
        compress: false,
    };
    let mut sink = ColumnarSink::new("columnar", &config, 7).unwrap();

    let err = sink
        .accept(&meta(1, 0), &waveform_buffer(&[16, 8]))
        .unwrap_err();
    assert!(matches!(err, SinkError::SchemaMismatch { .. }));

    // Nothing was committed, so the stream is still unfixed.
    sink.accept(&meta(1, 1), &waveform_buffer(&[8])).unwrap();
    sink.close().unwrap();

    match &read_blocks(sink.path())[0] {
        ColumnarBlock::Schema(schema) => assert_eq!(schema.samples, 8),
        other => panic!("expected schema block, got {other:?}"),
    }
}

#[test]
fn empty_batches_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let config = ColumnarConfig {
        dir: dir.path().to_path_buf(),
        compress: false,
    };
    let mut sink = ColumnarSink::new("columnar", &config, 7).unwrap();

    sink.accept(&meta(1, 0), &EventBuffer::unbounded(ElementKind::List422))
        .unwrap();
    sink.close().unwrap();

    assert!(read_blocks(sink.path()).is_empty());
    assert_eq!(sink.metrics().snapshot().batches_written, 0);
}

// =============================================================================
// Reader validation
// =============================================================================

#[test]
fn reader_rejects_bad_magic() {
    let err = ColumnarReader::new(b"NOPE\x01\x03rest".to_vec()).unwrap_err();
    assert!(err.to_string().contains("magic"));
}

#[test]
fn reader_rejects_truncated_preamble() {
    let err = ColumnarReader::new(b"RCO".to_vec()).unwrap_err();
    assert!(err.to_string().contains("preamble"));
}
