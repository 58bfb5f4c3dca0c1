/// Incremental NDJSON line framer.
///
/// Bytes are buffered until a `\n` arrives, and only complete lines are
/// decoded. `\n` never occurs inside a multi-byte UTF-8 sequence, so a
/// character split across chunks stays in the buffer until its line is
/// complete.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and yields every line it completed, without the
    /// terminating `\n`. Blank lines are yielded too.
    pub fn feed(&mut self, chunk: &[u8]) -> impl Iterator<Item = String> {
        let mut search_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let end = search_from + offset;
            lines.push(decode_line(&self.buffer[start..end]));
            start = end + 1;
            search_from = start;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        lines.into_iter()
    }

    /// Takes whatever trails the last newline. `None` when it is blank.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let line = decode_line(&rest);
        if line.trim().is_empty() {
            None
        } else {
            Some(line)
        }
    }

    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_line_is_retained() {
        let mut framer = LineFramer::new();
        let lines: Vec<String> = framer.feed(b"{\"type\":\"agent_thinking\"}\n{\"ty").collect();
        assert_eq!(lines, vec!["{\"type\":\"agent_thinking\"}"]);
        assert_eq!(framer.pending_len(), 4);

        let lines: Vec<String> = framer.feed(b"pe\":\"run_response\"}\n").collect();
        assert_eq!(lines, vec!["{\"type\":\"run_response\"}"]);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn test_finish_skips_blank_tail() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"{}\n  \r").count(), 1);
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn test_split_multibyte_character_is_carried() {
        let text = "{\"content\":\"caf\u{e9} \u{1f680}\"}\n";
        let bytes = text.as_bytes();
        // Split inside the four-byte rocket emoji.
        let split = text.find('\u{1f680}').expect("emoji present") + 2;

        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(&bytes[..split]).count(), 0);
        let lines: Vec<String> = framer.feed(&bytes[split..]).collect();
        assert_eq!(lines, vec![text.trim_end_matches('\n').to_string()]);
    }
}
