//! Incremental Server-Sent Events decoder.
//!
//! Network reads do not line up with event boundaries, so bytes are buffered
//! until a blank line closes an event. Only `data:` fields matter here;
//! `event:`, `id:`, `retry:` and comment lines are dropped.

use bytes::{Buf, BytesMut};

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: BytesMut,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the data payloads of every completed event.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some((end, sep_len)) = find_event_end(&self.buf) {
            let raw = self.buf.split_to(end);
            self.buf.advance(sep_len);
            if let Some(data) = parse_event(&raw) {
                events.push(data);
            }
        }
        events
    }

    /// Flush a trailing event that was not closed by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let raw = self.buf.split();
        parse_event(&raw)
    }
}

/// Locate the first blank-line separator, returning (event length, separator length).
fn find_event_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i..].starts_with(b"\r\n\r\n") {
            return Some((i, 4));
        }
        if buf[i..].starts_with(b"\n\n") {
            return Some((i, 2));
        }
        i += 1;
    }
    None
}

fn parse_event(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let mut data: Option<String> = None;

    for line in text.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    data.filter(|d| d != "[DONE]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_split_across_reads() {
        let mut dec = SseDecoder::new();
        assert!(dec.push(b"data: {\"a\":").is_empty());
        assert!(dec.push(b"1}\n").is_empty());
        assert_eq!(dec.push(b"\ndata: x\n\n"), vec!["{\"a\":1}", "x"]);
        assert!(dec.finish().is_none());
    }

    #[test]
    fn test_crlf_and_multiline_data() {
        let mut dec = SseDecoder::new();
        let out = dec.push(b"event: message\r\ndata: one\r\ndata: two\r\n\r\n");
        assert_eq!(out, vec!["one\ntwo"]);
    }

    #[test]
    fn test_comments_and_done_are_dropped() {
        let mut dec = SseDecoder::new();
        let out = dec.push(b": keep-alive\n\ndata: [DONE]\n\n");
        assert!(out.is_empty());
    }

    #[test]
    fn test_finish_flushes_trailing_event() {
        let mut dec = SseDecoder::new();
        assert!(dec.push(b"data: tail").is_empty());
        assert_eq!(dec.finish().as_deref(), Some("tail"));
        assert!(dec.finish().is_none());
    }
}
