//! Tests for the event buffer

use crate::buffer::{net_payload_budget, EventBuffer};
use crate::element::{Element, ListElement422, ListElement8222, Waveform422Element};
use crate::kind::ElementKind;
use crate::waveform::Waveform;
use crate::{FormatError, DEFAULT_PAYLOAD_CEILING};

fn list422(time: u32, channel: u16) -> Element {
    Element::List422(ListElement422 {
        time,
        channel,
        charge: 0,
    })
}

/// 40-byte element: 8-byte base + 2-byte count + 15 two-byte samples
fn forty_byte_element() -> Element {
    let e = Element::Waveform422(Waveform422Element {
        base: ListElement422::default(),
        waveform: Waveform::new(vec![0; 15]),
    });
    assert_eq!(e.byte_size(), 40);
    e
}

// =============================================================================
// Budget derivation
// =============================================================================

#[test]
fn test_net_payload_budget() {
    assert_eq!(net_payload_budget(9000), 9000 - 20 - 8);
    assert_eq!(net_payload_budget(DEFAULT_PAYLOAD_CEILING), 8972);
    assert_eq!(net_payload_budget(1500), 1472);
}

// =============================================================================
// Append and budget law
// =============================================================================

#[test]
fn test_new_buffer_is_empty() {
    let buffer = EventBuffer::new(ElementKind::List422, 1024);
    assert!(buffer.is_empty());
    assert_eq!(buffer.len(), 0);
    assert_eq!(buffer.byte_size(), 0);
    assert_eq!(buffer.kind(), ElementKind::List422);
    assert_eq!(buffer.budget(), 1024);
}

#[test]
fn test_append_accumulates_bytes() {
    let mut buffer = EventBuffer::new(ElementKind::List422, 1024);
    buffer.append(list422(1, 0)).unwrap();
    buffer.append(list422(2, 0)).unwrap();
    assert_eq!(buffer.len(), 2);
    assert_eq!(buffer.byte_size(), 16);
}

#[test]
fn test_append_never_exceeds_budget() {
    // 100-byte budget, 40-byte elements: two fit, the third must fail
    // leaving the buffer untouched
    let mut buffer = EventBuffer::new(ElementKind::Waveform422, 100);

    buffer.append(forty_byte_element()).unwrap();
    buffer.append(forty_byte_element()).unwrap();
    assert_eq!(buffer.byte_size(), 80);

    let err = buffer.append(forty_byte_element()).unwrap_err();
    assert!(matches!(
        err,
        FormatError::BudgetExceeded {
            current: 80,
            element_bytes: 40,
            budget: 100
        }
    ));
    assert!(err.is_recoverable());

    // no partial apply
    assert_eq!(buffer.len(), 2);
    assert_eq!(buffer.byte_size(), 80);
}

#[test]
fn test_append_exactly_at_budget_succeeds() {
    let mut buffer = EventBuffer::new(ElementKind::Waveform422, 80);
    buffer.append(forty_byte_element()).unwrap();
    buffer.append(forty_byte_element()).unwrap();
    assert_eq!(buffer.byte_size(), buffer.budget());
}

#[test]
fn test_append_rejects_wrong_kind() {
    let mut buffer = EventBuffer::new(ElementKind::List422, 1024);
    let err = buffer
        .append(Element::List8222(ListElement8222::default()))
        .unwrap_err();
    assert!(matches!(
        err,
        FormatError::KindMismatch {
            expected: ElementKind::List422,
            found: ElementKind::List8222
        }
    ));
    assert!(buffer.is_empty());
}

#[test]
fn test_unbounded_buffer_takes_everything() {
    let mut buffer = EventBuffer::unbounded(ElementKind::List422);
    for i in 0..10_000 {
        buffer.append(list422(i, 0)).unwrap();
    }
    assert_eq!(buffer.len(), 10_000);
}

// =============================================================================
// Iteration order (scenario: append order, sorted only on demand)
// =============================================================================

#[test]
fn test_iteration_is_append_order_not_sorted() {
    let mut buffer = EventBuffer::new(ElementKind::List422, 1024);
    buffer.append(list422(100, 1)).unwrap();
    buffer.append(list422(100, 0)).unwrap();
    buffer.append(list422(50, 2)).unwrap();

    let order: Vec<(u32, u16)> = buffer
        .iter()
        .map(|e| match e {
            Element::List422(l) => (l.time, l.channel),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(order, [(100, 1), (100, 0), (50, 2)]);

    // a stable sort by the kind's comparison yields the key order
    let mut sorted: Vec<Element> = buffer.iter().cloned().collect();
    sorted.sort_by(|a, b| a.cmp_key(b));
    let sorted: Vec<(u32, u16)> = sorted
        .iter()
        .map(|e| match e {
            Element::List422(l) => (l.time, l.channel),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(sorted, [(50, 2), (100, 0), (100, 1)]);
}

#[test]
fn test_iteration_is_restartable() {
    let mut buffer = EventBuffer::new(ElementKind::List422, 1024);
    buffer.append(list422(1, 0)).unwrap();
    buffer.append(list422(2, 0)).unwrap();

    assert_eq!(buffer.iter().count(), 2);
    assert_eq!(buffer.iter().count(), 2);
    assert_eq!((&buffer).into_iter().count(), 2);
}

// =============================================================================
// Seal / take
// =============================================================================

#[test]
fn test_take_seals_and_replaces() {
    let mut buffer = EventBuffer::new(ElementKind::List422, 64);
    buffer.append(list422(1, 0)).unwrap();

    let sealed = buffer.take();
    assert_eq!(sealed.len(), 1);
    assert_eq!(sealed.budget(), 64);

    assert!(buffer.is_empty());
    assert_eq!(buffer.kind(), ElementKind::List422);
    assert_eq!(buffer.budget(), 64);
}
