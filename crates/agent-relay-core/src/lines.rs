//! Incremental UTF-8 decoding and line splitting over arbitrary byte chunks.
//!
//! Chunk boundaries carry no meaning: a multi-byte character or a line may
//! be split anywhere, and the decoder produces the same lines regardless.

/// Turns a sequence of byte chunks into complete text lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    carry: Vec<u8>,
    /// Decoded text not yet terminated by `\n`.
    partial: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.partial[start..].find('\n') {
            let end = start + offset;
            lines.push(self.partial[start..end].trim_end_matches('\r').to_string());
            start = end + 1;
        }
        self.partial.drain(..start);
        lines
    }

    /// Flush at end of input. Returns the unterminated last line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if !self.carry.is_empty() {
            self.carry.clear();
            self.partial.push(char::REPLACEMENT_CHARACTER);
        }
        if self.partial.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.partial);
        Some(line.trim_end_matches('\r').to_string())
    }

    fn decode(&mut self, chunk: &[u8]) {
        self.carry.extend_from_slice(chunk);

        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.carry[start..]) {
                Ok(valid) => {
                    self.partial.push_str(valid);
                    start = self.carry.len();
                    break;
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    self.partial
                        .push_str(&String::from_utf8_lossy(&self.carry[start..valid_end]));
                    match e.error_len() {
                        // Invalid sequence: replace it and keep going.
                        Some(len) => {
                            self.partial.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.carry.drain(..start);
    }
}
