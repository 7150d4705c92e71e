/// Accumulates decoded text and cuts it into event blocks at blank lines.
///
/// `\r\n` is normalized to `\n` on the way in. A `\r` that ends a push is held back so a
/// `\r\n` pair split across two chunks is still recognized.
#[derive(Debug, Default)]
pub struct EventSplitter {
    buffer: String,
    pending_cr: bool,
}

impl EventSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        let mut incoming = String::with_capacity(text.len() + 1);
        if self.pending_cr {
            incoming.push('\r');
            self.pending_cr = false;
        }
        incoming.push_str(text);

        if incoming.ends_with('\r') {
            incoming.pop();
            self.pending_cr = true;
        }

        self.buffer.push_str(&incoming.replace("\r\n", "\n"));
    }

    /// Removes and returns the next complete block, without its terminator.
    pub fn next_block(&mut self) -> Option<String> {
        let pos = self.buffer.find("\n\n")?;
        let block = self.buffer[..pos].to_string();
        self.buffer.drain(..pos + 2);
        Some(block)
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len() + usize::from(self.pending_cr)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending_cr = false;
    }
}
