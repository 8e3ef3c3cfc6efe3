//! SSE buffer management for streaming chat completions.
//!
//! Raw bytes arrive in arbitrary chunks: push them, take out complete
//! newline-terminated lines, keep the partial tail for the next push.
//! Lines are decoded only once complete, so a multi-byte character split
//! across two chunks survives.

/// Byte accumulator for one event stream.
pub(crate) struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Append raw bytes to the buffer.
    pub fn push_bytes(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Take every `\n`-terminated line out of the buffer, trimmed and
    /// decoded lossily.
    pub fn extract_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let rest = self.buffer.split_off(pos + 1);
            let line = std::mem::replace(&mut self.buffer, rest);
            lines.push(String::from_utf8_lossy(&line).trim().to_string());
        }
        lines
    }

    /// Bytes of the unfinished last line.
    pub fn residue(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }
}

/// Payload of a `data: ` line, `None` for comments, blank lines and other fields.
pub(crate) fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_events_in_one_chunk() {
        let mut sse = SseBuffer::new();
        sse.push_bytes(b"data: {\"n\":1}\n\ndata: {\"n\":2}\n");
        assert_eq!(sse.extract_lines(), vec!["data: {\"n\":1}", "", "data: {\"n\":2}"]);
        assert_eq!(sse.residue(), "");
    }

    #[test]
    fn test_unfinished_line_waits_for_newline() {
        let mut sse = SseBuffer::new();
        sse.push_bytes(b": ping\ndata: [DO");
        assert_eq!(sse.extract_lines(), vec![": ping"]);
        assert_eq!(sse.residue(), "data: [DO");

        sse.push_bytes(b"NE]\n");
        assert_eq!(sse.extract_lines(), vec!["data: [DONE]"]);
        assert_eq!(sse.residue(), "");
    }

    #[test]
    fn test_crlf_lines_are_trimmed() {
        let mut buf = SseBuffer::new();
        buf.push_bytes(b"data: {}\r\n\r\n");
        assert_eq!(buf.extract_lines(), vec!["data: {}", ""]);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let text = "data: 你好\n".as_bytes();
        // Byte 7 is inside the three-byte encoding of 你
        let (a, b) = text.split_at(7);
        let mut buf = SseBuffer::new();
        buf.push_bytes(a);
        assert!(buf.extract_lines().is_empty());
        buf.push_bytes(b);
        assert_eq!(buf.extract_lines(), vec!["data: 你好"]);
    }

    #[test]
    fn test_data_payload() {
        assert_eq!(data_payload("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(data_payload("data:[DONE]"), Some("[DONE]"));
        assert_eq!(data_payload(": keep-alive"), None);
        assert_eq!(data_payload("event: ping"), None);
    }
}
