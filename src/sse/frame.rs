//! Incremental SSE frame reader.
//!
//! Bytes are buffered until a blank line closes a frame. Line endings are
//! normalised to LF as they arrive, and frame bytes are only decoded as UTF-8
//! once the frame is complete, so chunk boundaries (even inside a multibyte
//! character) never change the result.

use serde_json::{json, Value};
use tracing::trace;

use super::events::{Frame, RawEvent, RawFrame};

/// End-of-stream marker some producers send as a data line.
pub const DONE_MARKER: &str = "[DONE]";

/// Stateful reader turning byte chunks into frames.
#[derive(Debug, Default)]
pub struct FrameReader {
    /// LF-normalised bytes not yet part of a complete frame
    buffer: Vec<u8>,
    /// Last byte pushed was a CR; swallow a following LF
    skip_lf: bool,
    /// Buffer offset already known to contain no delimiter
    scan_from: usize,
}

impl FrameReader {
    /// Create a new reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.reserve(chunk.len());
        for &byte in chunk {
            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }
            if byte == b'\r' {
                self.buffer.push(b'\n');
                self.skip_lf = true;
            } else {
                self.buffer.push(byte);
            }
        }
        self.drain_frames()
    }

    /// Flush whatever is left once the byte source ended.
    ///
    /// Returns at most one frame; the reader is empty afterwards.
    pub fn finish(&mut self) -> Option<Frame> {
        self.skip_lf = false;
        self.scan_from = 0;
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        parse_frame(&rest)
    }

    /// Bytes currently buffered.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut start = 0;
        let mut cursor = self.scan_from;

        while let Some(offset) = find_delimiter(&self.buffer[cursor..]) {
            let end = cursor + offset;
            if let Some(frame) = parse_frame(&self.buffer[start..end]) {
                frames.push(frame);
            }
            start = end + 2;
            cursor = start;
        }

        self.buffer.drain(..start);
        // A lone trailing LF may still become half of a delimiter.
        self.scan_from = self.buffer.len().saturating_sub(1);
        frames
    }
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == b"\n\n")
}

/// Parse one LF-normalised frame body.
fn parse_frame(bytes: &[u8]) -> Option<Frame> {
    let text = String::from_utf8_lossy(bytes);
    let mut event_name: Option<String> = None;
    let mut data_lines: Vec<String> = Vec::new();
    let mut seen_content = false;

    for line in text.split('\n') {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with(':') {
            if !seen_content {
                trace!("SSE heartbeat frame");
                return Some(Frame::Heartbeat);
            }
            continue;
        }
        seen_content = true;

        if let Some(rest) = line.strip_prefix("event:") {
            let name = rest.trim();
            event_name = (!name.is_empty()).then(|| name.to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        } else {
            data_lines.push(line.to_string());
        }
    }

    if event_name.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(Frame::Event(RawFrame {
        event_name,
        data_lines,
    }))
}

/// Decode a frame's data into a raw event.
///
/// Never fails: undecodable data degrades to `{"text": raw}` for `chunk`
/// frames and to an empty object otherwise.
pub fn decode(frame: &RawFrame) -> RawEvent {
    let data = frame.data();

    if data.is_empty() {
        return RawEvent {
            event_type: frame.event_name.clone(),
            payload: None,
        };
    }

    if data.trim() == DONE_MARKER {
        return RawEvent {
            event_type: Some(
                frame
                    .event_name
                    .clone()
                    .unwrap_or_else(|| "done".to_string()),
            ),
            payload: Some(json!({ "done": true })),
        };
    }

    let payload = match serde_json::from_str::<Value>(&data) {
        Ok(value) => value,
        Err(e) => {
            trace!(
                "SSE data is not JSON ({}), event={:?}",
                e,
                frame.event_name
            );
            if frame.event_name.as_deref() == Some("chunk") {
                json!({ "text": data })
            } else {
                json!({})
            }
        }
    };

    RawEvent {
        event_type: frame.event_name.clone(),
        payload: Some(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events_of(frames: Vec<Frame>) -> Vec<RawEvent> {
        frames
            .into_iter()
            .filter_map(|f| match f {
                Frame::Event(raw) => Some(decode(&raw)),
                Frame::Heartbeat => None,
            })
            .collect()
    }

    #[test]
    fn test_single_frame() {
        let mut reader = FrameReader::new();
        let frames = reader.push(b"event: chunk\ndata: {\"text\":\"Ol\xc3\xa1\"}\n\n");
        let events = events_of(frames);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_deref(), Some("chunk"));
        assert_eq!(events[0].payload.as_ref().unwrap()["text"], "Olá");
    }

    #[test]
    fn test_incomplete_frame_is_buffered() {
        let mut reader = FrameReader::new();
        assert!(reader.push(b"event: chunk\ndata: {\"te").is_empty());
        assert!(reader.pending_len() > 0);
        let frames = reader.push(b"xt\":\"a\"}\n\n");
        assert_eq!(events_of(frames)[0].payload.as_ref().unwrap()["text"], "a");
        assert_eq!(reader.pending_len(), 0);
    }

    #[test]
    fn test_crlf_and_cr_normalised() {
        let mut reader = FrameReader::new();
        let frames = reader.push(b"event: done\r\ndata: {}\r\n\r\nevent: meta\rdata: {}\r\r");
        let events = events_of(frames);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type.as_deref(), Some("meta"));
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut reader = FrameReader::new();
        assert!(reader.push(b"data: {\"text\":\"x\"}\r").is_empty());
        assert!(reader.push(b"\n\r").len() == 1);
        assert!(reader.push(b"\n").is_empty());
        assert_eq!(reader.pending_len(), 0);
    }

    #[test]
    fn test_heartbeat_frame() {
        let mut reader = FrameReader::new();
        let frames = reader.push(b": ping\n\nevent: chunk\ndata: {\"text\":\"a\"}\n\n");
        assert_eq!(frames[0], Frame::Heartbeat);
        assert_eq!(events_of(frames).len(), 1);
    }

    #[test]
    fn test_comment_after_content_is_ignored() {
        let mut reader = FrameReader::new();
        let frames = reader.push(b"event: chunk\n: note\ndata: {\"text\":\"a\"}\n\n");
        let events = events_of(frames);
        assert_eq!(events[0].payload.as_ref().unwrap()["text"], "a");
    }

    #[test]
    fn test_multiple_data_lines_joined() {
        let mut reader = FrameReader::new();
        let frames = reader.push(b"event: chunk\ndata: {\"text\":\ndata: \"multi\"}\n\n");
        assert_eq!(events_of(frames)[0].payload.as_ref().unwrap()["text"], "multi");
    }

    #[test]
    fn test_event_without_space_and_raw_line() {
        let mut reader = FrameReader::new();
        let frames = reader.push(b"event:chunk\nplain words\n\n");
        match &frames[0] {
            Frame::Event(raw) => {
                assert_eq!(raw.event_name.as_deref(), Some("chunk"));
                assert_eq!(raw.data_lines, vec!["plain words".to_string()]);
            }
            other => panic!("expected event frame, got {:?}", other),
        }
        // Non-JSON chunk data becomes text
        assert_eq!(
            events_of(frames)[0].payload.as_ref().unwrap()["text"],
            "plain words"
        );
    }

    #[test]
    fn test_non_json_non_chunk_becomes_empty_object() {
        let raw = RawFrame {
            event_name: Some("meta".to_string()),
            data_lines: vec!["not json".to_string()],
        };
        assert_eq!(decode(&raw).payload, Some(json!({})));
    }

    #[test]
    fn test_done_marker() {
        let raw = RawFrame {
            event_name: None,
            data_lines: vec!["[DONE]".to_string()],
        };
        let event = decode(&raw);
        assert_eq!(event.event_type.as_deref(), Some("done"));
        assert_eq!(event.payload, Some(json!({"done": true})));

        let raw = RawFrame {
            event_name: Some("control".to_string()),
            data_lines: vec!["[DONE]".to_string()],
        };
        assert_eq!(decode(&raw).event_type.as_deref(), Some("control"));
    }

    #[test]
    fn test_empty_data_has_no_payload() {
        let raw = RawFrame {
            event_name: Some("prompt_ready".to_string()),
            data_lines: vec![],
        };
        let event = decode(&raw);
        assert_eq!(event.event_type.as_deref(), Some("prompt_ready"));
        assert!(event.payload.is_none());
    }

    #[test]
    fn test_finish_flushes_remaining_once() {
        let mut reader = FrameReader::new();
        assert!(reader.push(b"event: done\ndata: {\"done\":true}").is_empty());
        let last = reader.finish();
        assert!(matches!(last, Some(Frame::Event(_))));
        assert!(reader.finish().is_none());
    }

    #[test]
    fn test_blank_padding_produces_nothing() {
        let mut reader = FrameReader::new();
        assert!(reader.push(b"\n\n\n\n").is_empty());
        assert!(reader.finish().is_none());
    }

    #[test]
    fn test_multibyte_split_is_preserved() {
        let payload = "event: chunk\ndata: {\"text\":\"ação 🌱\"}\n\n".as_bytes();
        for split in 0..payload.len() {
            let mut reader = FrameReader::new();
            let mut frames = reader.push(&payload[..split]);
            frames.extend(reader.push(&payload[split..]));
            let events = events_of(frames);
            assert_eq!(events.len(), 1, "split at {}", split);
            assert_eq!(events[0].payload.as_ref().unwrap()["text"], "ação 🌱");
        }
    }
}
