//! Incremental `text/event-stream` parsing: bytes to text, text to event blocks,
//! event blocks to [`ParsedEvent`]s.

mod decoder;
mod parser;
mod splitter;

pub use decoder::Utf8Decoder;
pub use parser::{parse_block, ParsedEvent};
pub use splitter::EventSplitter;

/// Feeds raw chunks through decoder and splitter, yielding complete blocks.
///
/// Blocks that are blank after trimming are dropped here; everything else is returned
/// in arrival order.
#[derive(Debug, Default)]
pub struct FrameReader {
    decoder: Utf8Decoder,
    splitter: EventSplitter,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        let text = self.decoder.decode(chunk);
        self.splitter.push(&text);
    }

    pub fn next_block(&mut self) -> Option<String> {
        while let Some(block) = self.splitter.next_block() {
            if !block.trim().is_empty() {
                return Some(block);
            }
        }
        None
    }

    /// Bytes of text still waiting for a terminator.
    pub fn buffered(&self) -> usize {
        self.splitter.buffered()
    }

    /// Drops whatever is left at end of body: a trailing partial block and any incomplete
    /// UTF-8 sequence. Returns the number of bytes discarded.
    pub fn finish(&mut self) -> usize {
        let tail = self.decoder.finish();
        self.splitter.push(&tail);
        let discarded = self.splitter.buffered();
        self.splitter.clear();
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = concat!(
        ": welcome\n\n",
        "event: student_register\nid: 1\ndata: {\"id\":7}\n\n",
        "data: plain text\n\n",
        "event: ping\n\n",
        "event: lesson\ndata: line one\ndata: line two\n\n",
        "data: {\"name\":\"Zoë\"}\n\n",
    );

    fn collect(chunks: &[&[u8]]) -> Vec<ParsedEvent> {
        let mut reader = FrameReader::new();
        let mut events = Vec::new();
        for chunk in chunks {
            reader.push(chunk);
            while let Some(block) = reader.next_block() {
                let event = parse_block(&block);
                if event.data.is_some() {
                    events.push(event);
                }
            }
        }
        events
    }

    #[test]
    fn test_every_split_point_yields_same_events() {
        let bytes = STREAM.as_bytes();
        let expected = collect(&[bytes]);
        assert_eq!(expected.len(), 4);

        for split in 0..=bytes.len() {
            let (head, tail) = bytes.split_at(split);
            assert_eq!(collect(&[head, tail]), expected, "split at byte {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let bytes = STREAM.as_bytes();
        let chunks: Vec<&[u8]> = bytes.chunks(1).collect();
        let events = collect(&chunks);
        let names: Vec<&str> = events.iter().map(|e| e.event_name.as_str()).collect();
        assert_eq!(names, vec!["student_register", "message", "lesson", "message"]);
        assert_eq!(events[3].data.as_deref(), Some("{\"name\":\"Zoë\"}"));
    }

    #[test]
    fn test_buffer_keeps_only_partial_tail() {
        let mut reader = FrameReader::new();
        reader.push(b"data: a\n\ndata: b\n\ndata: par");
        assert!(reader.next_block().is_some());
        assert!(reader.next_block().is_some());
        assert!(reader.next_block().is_none());
        assert_eq!(reader.buffered(), "data: par".len());
    }

    #[test]
    fn test_blank_blocks_are_skipped() {
        let mut reader = FrameReader::new();
        reader.push(b"\n\n  \n\n\n\ndata: x\n\n");
        assert_eq!(reader.next_block().as_deref(), Some("data: x"));
        assert!(reader.next_block().is_none());
    }

    #[test]
    fn test_finish_discards_partial_block() {
        let mut reader = FrameReader::new();
        reader.push(b"data: a\n\ndata: par\xC3");
        assert_eq!(reader.next_block().as_deref(), Some("data: a"));

        // Nine bytes of text plus the dangling lead byte flushed as U+FFFD.
        assert_eq!(reader.finish(), "data: par".len() + '\u{FFFD}'.len_utf8());
        assert_eq!(reader.buffered(), 0);

        reader.push(b"data: b\n\n");
        assert_eq!(reader.next_block().as_deref(), Some("data: b"));
    }
}
