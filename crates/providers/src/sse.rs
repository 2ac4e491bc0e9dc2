//! Shared SSE streaming infrastructure.
//!
//! Receive a `reqwest::Response`, buffer chunks, split on blank lines,
//! extract `data:` payloads and feed each payload to a stateful parser.

use crate::util::from_reqwest;
use tc_domain::error::Result;
use tc_domain::stream::{BoxStream, StreamChunk};

/// Provider-specific payload parser.
///
/// `finish` runs once after the body closes and must end with a
/// [`StreamChunk::Done`].
pub(crate) trait StreamParser: Send + 'static {
    fn parse(&mut self, data: &str) -> Vec<Result<StreamChunk>>;
    fn finish(&mut self) -> Vec<Result<StreamChunk>>;
}

/// Extract complete `data:` payloads from an SSE buffer.
///
/// Events are delimited by `\n\n`; carriage returns must already be
/// stripped. Consumed bytes are removed and any trailing partial event
/// remains for the next call.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        for line in block.lines() {
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

/// Move the longest valid UTF-8 prefix of `pending` into `buffer`,
/// dropping carriage returns. An incomplete trailing sequence waits for
/// the next chunk.
pub(crate) fn push_utf8(pending: &mut Vec<u8>, buffer: &mut String) {
    let valid = match std::str::from_utf8(pending.as_slice()) {
        Ok(_) => Some(pending.len()),
        Err(e) if e.error_len().is_none() => Some(e.valid_up_to()),
        Err(_) => None,
    };
    let Some(valid) = valid else {
        let text = String::from_utf8_lossy(pending.as_slice()).into_owned();
        buffer.extend(text.chars().filter(|c| *c != '\r'));
        pending.clear();
        return;
    };
    let rest = pending.split_off(valid);
    if let Ok(text) = std::str::from_utf8(pending.as_slice()) {
        buffer.extend(text.chars().filter(|c| *c != '\r'));
    }
    *pending = rest;
}

/// Build a [`BoxStream`] from an SSE response and a parser.
pub(crate) fn sse_response_stream<P: StreamParser>(
    response: reqwest::Response,
    mut parser: P,
) -> BoxStream<'static, Result<StreamChunk>> {
    let stream = async_stream::stream! {
        let mut response = response;
        let mut pending: Vec<u8> = Vec::new();
        let mut buffer = String::new();

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    pending.extend_from_slice(&bytes);
                    push_utf8(&mut pending, &mut buffer);
                    for data in drain_data_lines(&mut buffer) {
                        for chunk in parser.parse(&data) {
                            yield chunk;
                        }
                    }
                }
                Ok(None) => {
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for data in drain_data_lines(&mut buffer) {
                            for chunk in parser.parse(&data) {
                                yield chunk;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    return;
                }
            }
        }

        for chunk in parser.finish() {
            yield chunk;
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_single_complete_event() {
        let mut buf = String::from("event: message\ndata: {\"hello\":\"world\"}\n\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["{\"hello\":\"world\"}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_partial_event_stays_in_buffer() {
        let mut buf = String::from("data: complete\n\ndata: partial");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["complete"]);
        assert_eq!(buf, "data: partial");
    }

    #[test]
    fn drain_skips_empty_data_lines() {
        let mut buf = String::from("data: \n\n");
        assert!(drain_data_lines(&mut buf).is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn crlf_delimited_events_are_split() {
        let mut pending = b"data: one\r\n\r\ndata: two\r\n\r\n".to_vec();
        let mut buf = String::new();
        push_utf8(&mut pending, &mut buf);
        assert_eq!(drain_data_lines(&mut buf), vec!["one", "two"]);
        assert!(pending.is_empty());
    }

    #[test]
    fn split_multibyte_char_waits_for_next_chunk() {
        let bytes = "data: é\n\n".as_bytes();
        // Cut inside the two-byte 'é'.
        let cut = bytes.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let mut pending = bytes[..cut].to_vec();
        let mut buf = String::new();
        push_utf8(&mut pending, &mut buf);
        assert_eq!(pending.len(), 1);
        assert!(drain_data_lines(&mut buf).is_empty());

        pending.extend_from_slice(&bytes[cut..]);
        push_utf8(&mut pending, &mut buf);
        assert_eq!(drain_data_lines(&mut buf), vec!["é"]);
    }

    #[test]
    fn drain_incremental_buffering() {
        let mut buf = String::from("data: chunk1");
        assert!(drain_data_lines(&mut buf).is_empty());
        buf.push_str("\n\ndata: chunk2\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["chunk1", "chunk2"]);
        assert!(buf.is_empty());
    }
}
