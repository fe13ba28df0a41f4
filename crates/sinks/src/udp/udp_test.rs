//! Tests for the UDP sink

use std::net::UdpSocket;
use std::time::Duration;

use readout_format::{
    decode_frame, BatchMeta, Element, ElementKind, EventBuffer, Header, ListElement422,
    DEFAULT_PAYLOAD_CEILING,
};

use crate::common::{EventSink, SinkError};
use crate::udp::UdpSink;

fn meta(seq_num: u32) -> BatchMeta {
    BatchMeta {
        run_id: 7,
        global_time: 1000,
        digitizer_id: 137,
        seq_num,
    }
}

fn list_buffer(count: u16) -> EventBuffer {
    let mut buffer = EventBuffer::unbounded(ElementKind::List422);
    for i in 0..count {
        buffer
            .append(Element::List422(ListElement422 {
                time: u32::from(i) * 10,
                channel: i,
                charge: 400,
            }))
            .unwrap();
    }
    buffer
}

fn local_receiver() -> UdpSocket {
    let socket = UdpSocket::bind(("127.0.0.1", 0)).unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    socket
}

#[test]
fn transmits_one_decodable_frame_per_batch() {
    let receiver = local_receiver();
    let mut sink = UdpSink::new(
        "udp",
        receiver.local_addr().unwrap(),
        DEFAULT_PAYLOAD_CEILING,
    )
    .unwrap();
    assert!(sink.is_network());

    let buffer = list_buffer(3);
    sink.accept(&meta(5), &buffer).unwrap();

    let mut datagram = [0u8; 9000];
    let received = receiver.recv(&mut datagram).unwrap();
    assert_eq!(received, Header::SIZE + buffer.byte_size());

    let (header, elements) = decode_frame(&datagram[..received]).unwrap();
    assert_eq!(header.digitizer_id, 137);
    assert_eq!(header.seq_num, 5);
    assert_eq!(header.num_elements, 3);
    assert_eq!(elements.len(), 3);
    assert_eq!(
        elements[1],
        Element::List422(ListElement422 {
            time: 10,
            channel: 1,
            charge: 400,
        })
    );
}

#[test]
fn empty_batches_still_produce_a_header_frame() {
    let receiver = local_receiver();
    let mut sink = UdpSink::new(
        "udp",
        receiver.local_addr().unwrap(),
        DEFAULT_PAYLOAD_CEILING,
    )
    .unwrap();

    sink.accept(&meta(9), &EventBuffer::unbounded(ElementKind::List422))
        .unwrap();

    let mut datagram = [0u8; 128];
    let received = receiver.recv(&mut datagram).unwrap();
    assert_eq!(received, Header::SIZE);

    let (header, elements) = decode_frame(&datagram[..received]).unwrap();
    assert_eq!(header.seq_num, 9);
    assert!(elements.is_empty());
}

#[test]
fn rejects_frames_over_the_datagram_budget() {
    let receiver = local_receiver();
    // Ceiling of 100 leaves 72 bytes for the whole frame.
    let mut sink = UdpSink::new("udp", receiver.local_addr().unwrap(), 100).unwrap();
    assert_eq!(sink.budget(), 72);

    // 6 elements of 8 bytes plus the 32-byte header is 80 bytes.
    let err = sink.accept(&meta(0), &list_buffer(6)).unwrap_err();
    match err {
        SinkError::PayloadTooLarge { size, budget } => {
            assert_eq!(size, 80);
            assert_eq!(budget, 72);
        }
        other => panic!("expected PayloadTooLarge, got {other:?}"),
    }

    // Five elements fit exactly.
    sink.accept(&meta(0), &list_buffer(5)).unwrap();
    let mut datagram = [0u8; 128];
    assert_eq!(receiver.recv(&mut datagram).unwrap(), 72);
}
