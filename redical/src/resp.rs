pub use redis_protocol::resp2::types::OwnedFrame as Frame;

use crate::error::{Error, Result};

/// Worst-case encoded size of a frame. Bulk strings dominate: header,
/// payload and trailing CRLF. 32 bytes of slack per element covers every
/// length prefix RESP2 can produce.
fn encoded_size(frame: &Frame) -> usize {
    match frame {
        Frame::BulkString(data) => data.len() + 32,
        Frame::SimpleString(data) => data.len() + 32,
        Frame::Error(msg) => msg.len() + 32,
        Frame::Integer(_) => 32,
        Frame::Null => 8,
        Frame::Array(items) => items.iter().map(encoded_size).sum::<usize>() + 32,
    }
}

/// Parse a frame from a byte buffer.
///
/// Returns the frame and how many bytes were consumed, or `None` if the
/// buffer does not yet hold a complete frame.
pub fn parse_frame(buffer: &[u8]) -> Result<Option<(Frame, usize)>> {
    if buffer.is_empty() {
        return Ok(None);
    }

    match redis_protocol::resp2::decode::decode(buffer) {
        Ok(Some((frame, len))) => Ok(Some((frame, len))),
        Ok(None) => Ok(None),
        Err(e) => {
            if e.to_string().contains("incomplete") {
                // Need more data
                Ok(None)
            } else {
                Err(Error::Protocol(e.to_string()))
            }
        }
    }
}

/// Encode a frame to bytes.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>> {
    let mut buffer = vec![0; encoded_size(frame)];

    match redis_protocol::resp2::encode::encode(&mut buffer, frame, false) {
        Ok(len) => {
            buffer.truncate(len);
            Ok(buffer)
        }
        Err(e) => {
            if e.to_string().contains("Buffer too small") {
                // retry with a bigger buffer in case the estimate is short
                let mut larger = vec![0; buffer.len() * 2 + 64];
                let len = redis_protocol::resp2::encode::encode(&mut larger, frame, false)
                    .map_err(|e| Error::Protocol(e.to_string()))?;
                larger.truncate(len);
                Ok(larger)
            } else {
                Err(Error::Protocol(e.to_string()))
            }
        }
    }
}
