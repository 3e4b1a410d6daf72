//! A pure, restartable server-sent-events parser: bytes in, events out, a carry
//! buffer threaded through every call.

/// One parsed SSE event. `data` is the concatenation of every `data:` line in the
/// event, joined with `\n`; everything else (field names the client doesn't care
/// about, comment lines) is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub data: String,
    pub event: Option<String>,
    pub id: Option<String>,
}

/// Byte-buffer state threaded between calls to [`feed`]. Construct with
/// [`SseParser::new`], call `feed` with each chunk as it arrives.
#[derive(Debug, Default)]
pub struct SseParser {
    carry: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self { carry: Vec::new() }
    }

    /// Appends `chunk` to the carry buffer and extracts every complete event found.
    /// Bytes after the last blank-line terminator remain in the carry for the next
    /// call. Feeding an empty slice is a no-op that yields no events.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        if !chunk.is_empty() {
            self.carry.extend_from_slice(chunk);
        }

        let mut events = Vec::new();
        loop {
            match find_blank_line(&self.carry) {
                Some((block_end, terminator_end)) => {
                    let block = self.carry[..block_end].to_vec();
                    self.carry.drain(..terminator_end);
                    if let Some(event) = parse_event_block(&block) {
                        events.push(event);
                    }
                }
                None => break,
            }
        }
        events
    }
}

/// Finds the first blank-line terminator (`\n\n`, `\r\n\r\n`, or the mixed variants
/// that arise when a stream is not internally consistent about line endings).
/// Returns `(block_end, terminator_end)`: bytes in `[0, block_end)` are the event
/// block, and `terminator_end` is where the next block begins.
fn find_blank_line(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            let (line_end, next) = consume_newline(buf, i);
            if next < buf.len() && buf[next] == b'\n' {
                return Some((line_end, next + 1));
            }
            if next + 1 < buf.len() && buf[next] == b'\r' && buf[next + 1] == b'\n' {
                return Some((line_end, next + 2));
            }
            i = next;
        } else {
            i += 1;
        }
    }
    None
}

/// Given the index of a `\n`, returns `(index_of_preceding_content_end, index_after_newline)`,
/// stripping a preceding `\r` from the content end.
fn consume_newline(buf: &[u8], newline_idx: usize) -> (usize, usize) {
    let content_end = if newline_idx > 0 && buf[newline_idx - 1] == b'\r' {
        newline_idx - 1
    } else {
        newline_idx
    };
    (content_end, newline_idx + 1)
}

/// Parses one event block (no trailing blank line) into an [`SseEvent`]. Returns
/// `None` for a zero-length block (consecutive blank lines).
fn parse_event_block(block: &[u8]) -> Option<SseEvent> {
    if block.is_empty() {
        return None;
    }

    let text = String::from_utf8_lossy(block);
    let mut data_lines = Vec::new();
    let mut event = None;
    let mut id = None;

    for line in text.split(['\n']) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => data_lines.push(value),
            "event" => event = Some(value.to_string()),
            "id" => id = Some(value.to_string()),
            _ => {}
        }
    }

    if data_lines.is_empty() && event.is_none() && id.is_none() {
        return None;
    }

    Some(SseEvent {
        data: data_lines.join("\n"),
        event,
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_event_in_one_chunk() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: {\"a\":1}\n\n");
        assert_eq!(events, vec![SseEvent { data: "{\"a\":1}".to_string(), event: None, id: None }]);
    }

    #[test]
    fn empty_feed_yields_no_events_and_preserves_carry() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: partial").is_empty());
        assert!(parser.feed(b"").is_empty());
        let events = parser.feed(b"\n\n");
        assert_eq!(events[0].data, "partial");
    }

    #[test]
    fn event_split_across_many_chunks_reassembles_losslessly() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"da").is_empty());
        assert!(parser.feed(b"ta: {\"a\"").is_empty());
        assert!(parser.feed(b":1}\n").is_empty());
        let events = parser.feed(b"\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"a\":1}");
    }

    #[test]
    fn crlf_and_lf_terminators_are_both_accepted() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: one\r\n\r\ndata: two\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "one");
        assert_eq!(events[1].data, "two");
    }

    #[test]
    fn multi_line_data_is_concatenated_with_newline() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: line1\ndata: line2\n\n");
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn comment_lines_are_ignored() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": keep-alive\ndata: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn zero_length_event_between_blank_lines_is_skipped() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: one\n\n\ndata: two\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "one");
        assert_eq!(events[1].data, "two");
    }

    #[test]
    fn done_sentinel_passes_through_as_a_normal_event() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: [DONE]\n\n");
        assert_eq!(events[0].data, "[DONE]");
    }

    #[test]
    fn event_and_id_fields_are_captured() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"event: message\nid: 42\ndata: hi\n\n");
        assert_eq!(events[0].event.as_deref(), Some("message"));
        assert_eq!(events[0].id.as_deref(), Some("42"));
    }

    proptest! {
        #[test]
        fn arbitrary_chunk_splits_reassemble_the_same_events(splits in prop::collection::vec(1usize..5, 0..8)) {
            let full = b"data: alpha\n\ndata: beta\nbeta2\n\n: comment\ndata: gamma\n\n".to_vec();
            let mut offset = 0;
            let mut chunks = Vec::new();
            for s in splits {
                let end = (offset + s).min(full.len());
                if end > offset {
                    chunks.push(full[offset..end].to_vec());
                    offset = end;
                }
            }
            if offset < full.len() {
                chunks.push(full[offset..].to_vec());
            }

            let mut parser = SseParser::new();
            let mut got = Vec::new();
            for chunk in &chunks {
                got.extend(parser.feed(chunk));
            }

            let mut whole_parser = SseParser::new();
            let expected = whole_parser.feed(&full);

            prop_assert_eq!(got, expected);
        }
    }
}
