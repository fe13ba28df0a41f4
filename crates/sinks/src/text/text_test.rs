//! Tests for the text sink

use readout_format::{BatchMeta, Element, ElementKind, EventBuffer, ListElement422};

use crate::common::EventSink;
use crate::text::TextSink;

fn meta(digitizer_id: u32, seq_num: u32, global_time: u64) -> BatchMeta {
    BatchMeta {
        run_id: 7,
        global_time,
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

#[test]
fn writes_run_preamble_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let sink = TextSink::new("text", dir.path(), 7).unwrap();

    let content = std::fs::read_to_string(sink.path()).unwrap();
    assert_eq!(content, "# runID: 7\n");
}

#[test]
fn announces_each_digitizer_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = TextSink::new("text", dir.path(), 7).unwrap();

    sink.accept(&meta(137, 0, 1000), &list_buffer(&[(50, 2, 400)]))
        .unwrap();
    sink.accept(&meta(137, 1, 2000), &list_buffer(&[(60, 3, 410)]))
        .unwrap();
    sink.accept(&meta(9, 0, 2000), &list_buffer(&[(70, 0, 420)]))
        .unwrap();

    let content = std::fs::read_to_string(sink.path()).unwrap();
    let announcements: Vec<&str> = content
        .lines()
        .filter(|l| l.starts_with("# digitizerID:"))
        .collect();
    assert_eq!(announcements, ["# digitizerID: 137", "# digitizerID: 9"]);
}

#[test]
fn batch_renders_header_timestamp_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = TextSink::new("text", dir.path(), 7).unwrap();

    sink.accept(
        &meta(137, 0, 1000),
        &list_buffer(&[(50, 2, 400), (100, 0, 385)]),
    )
    .unwrap();
    sink.close().unwrap();

    let content = std::fs::read_to_string(sink.path()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "# runID: 7");
    assert_eq!(lines[1], "# digitizerID: 137");

    // Column header carries the digitizer and the kind's column names.
    assert!(lines[2].starts_with('#'));
    let header: Vec<&str> = lines[2][1..].split_whitespace().collect();
    assert_eq!(header, ["137", "channel", "time", "charge"]);

    assert_eq!(lines[3], "@1000");

    // Rows are digitizer then the element columns, in append order.
    let row: Vec<&str> = lines[4].split_whitespace().collect();
    assert_eq!(row, ["137", "2", "50", "400"]);
    let row: Vec<&str> = lines[5].split_whitespace().collect();
    assert_eq!(row, ["137", "0", "100", "385"]);
    assert_eq!(lines.len(), 6);
}

#[test]
fn metrics_count_rendered_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = TextSink::new("text", dir.path(), 7).unwrap();

    sink.accept(&meta(1, 0, 1000), &list_buffer(&[(50, 2, 400)]))
        .unwrap();

    let snapshot = sink.metrics().snapshot();
    assert_eq!(snapshot.batches_written, 1);
    assert_eq!(snapshot.elements_written, 1);
    assert!(snapshot.bytes_written > 0);
}
