//! Frame encode/decode
//!
//! One frame is the 32-byte header followed by `num_elements` elements
//! of the header's kind, back to back with no padding. This is the
//! exact byte sequence a network sink puts in a datagram and a reader
//! takes apart, gated first on version, then on element type.

use bytes::{Bytes, BytesMut};

use crate::buffer::{BatchMeta, EventBuffer};
use crate::element::Element;
use crate::error::FormatError;
use crate::header::Header;
use crate::Result;

/// Serialize a sealed batch into one wire frame
pub fn encode_frame(meta: &BatchMeta, buffer: &EventBuffer) -> Bytes {
    let header = Header::for_batch(meta, buffer.kind(), buffer.len() as u16);
    let mut bytes = BytesMut::with_capacity(Header::SIZE + buffer.byte_size());
    bytes.extend_from_slice(&header.encode());
    for element in buffer {
        element.encode(&mut bytes);
    }
    bytes.freeze()
}

/// Parse one wire frame back into its header and elements
///
/// The whole input must be consumed: a short payload fails with
/// `Truncated`, leftover bytes fail with `TrailingBytes`. Either way
/// the frame is dropped as a unit; a malformed frame never crashes the
/// stream.
pub fn decode_frame(bytes: &[u8]) -> Result<(Header, Vec<Element>)> {
    if bytes.len() < Header::SIZE {
        return Err(FormatError::too_short(Header::SIZE, bytes.len()));
    }
    let header = Header::decode(&bytes[..Header::SIZE])?;

    let mut payload = &bytes[Header::SIZE..];
    let mut elements = Vec::with_capacity(header.num_elements as usize);
    for index in 0..header.num_elements {
        match Element::decode(header.element_type, &mut payload) {
            Ok(element) => elements.push(element),
            Err(FormatError::TooShort { expected, actual }) => {
                return Err(FormatError::Truncated {
                    index,
                    count: header.num_elements,
                    needed: expected - actual,
                });
            }
            Err(e) => return Err(e),
        }
    }

    if !payload.is_empty() {
        return Err(FormatError::TrailingBytes(payload.len()));
    }

    Ok((header, elements))
}
