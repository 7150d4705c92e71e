/// Stateful UTF-8 decoder that carries incomplete multi-byte sequences across chunks.
///
/// Invalid bytes decode to U+FFFD instead of failing the stream.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Truncated sequence at the end: wait for the next chunk.
                            self.pending.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flushes an incomplete trailing sequence, if any, as U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multibyte_split_across_chunks() {
        let text = "data: héllo 🚀\n\n";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = Utf8Decoder::new();
            let mut out = decoder.decode(&bytes[..split]);
            out.push_str(&decoder.decode(&bytes[split..]));
            assert_eq!(out, text, "split at byte {}", split);
            assert!(decoder.finish().is_empty());
        }
    }

    #[test]
    fn test_invalid_bytes_become_replacement() {
        let mut decoder = Utf8Decoder::new();
        let out = decoder.decode(&[b'a', 0xFF, b'b']);
        assert_eq!(out, "a\u{FFFD}b");
    }

    #[test]
    fn test_finish_flushes_truncated_tail() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert!(decoder.finish().is_empty());
    }
}
