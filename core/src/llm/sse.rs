// Incremental decoder for `text/event-stream` bodies

/// Splits a byte stream into SSE `data` payloads.
///
/// Bytes may arrive cut at any point, including inside a UTF-8 sequence; only
/// complete lines are decoded. An event is emitted at each blank line, with
/// multiple `data:` lines joined by `\n`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event payload it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // `event:`, `id:`, `retry:` and `:` comments carry nothing we use
        }

        events
    }

    /// Payload of an event left open when the body ended
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let tail = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&tail);
            if let Some(value) = line.trim_end_matches('\r').strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }
        if self.data.is_empty() {
            None
        } else {
            let out = self.data.join("\n");
            self.data.clear();
            Some(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_events_at_blank_lines() {
        let mut d = SseDecoder::new();
        let out = d.push(b"data: {\"a\":1}\n\ndata: [DONE]\n\n");
        assert_eq!(out, vec!["{\"a\":1}".to_string(), "[DONE]".to_string()]);
    }

    #[test]
    fn handles_chunks_split_mid_line_and_mid_codepoint() {
        let mut d = SseDecoder::new();
        let bytes = "data: héllo\r\n\r\n".as_bytes();
        let (a, b) = bytes.split_at(8); // inside the two-byte 'é'
        assert!(d.push(a).is_empty());
        assert_eq!(d.push(b), vec!["héllo".to_string()]);
    }

    #[test]
    fn joins_multi_line_data_and_skips_comments() {
        let mut d = SseDecoder::new();
        let out = d.push(b": keep-alive\nevent: message\ndata: one\ndata: two\n\n");
        assert_eq!(out, vec!["one\ntwo".to_string()]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"data: tail").is_empty());
        assert_eq!(d.finish(), Some("tail".to_string()));
        assert_eq!(d.finish(), None);
    }
}
