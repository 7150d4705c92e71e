use tracing::trace;

pub const DEFAULT_EVENT_NAME: &str = "message";

/// One event block after field parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub event_name: String,
    pub id: Option<String>,
    /// `None` when the block had no `data:` line; such blocks are never dispatched.
    pub data: Option<String>,
    pub raw: String,
}

impl ParsedEvent {
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

/// Parses a single event block.
///
/// Comment lines (leading `:`) and lines without a colon are skipped. For field lines the
/// name is trimmed and at most one space after the colon is dropped from the value.
/// Repeated `data:` lines are joined with `\n`.
pub fn parse_block(block: &str) -> ParsedEvent {
    let normalized = block.replace("\r\n", "\n");

    let mut event_name: Option<String> = None;
    let mut id = None;
    let mut data: Option<String> = None;

    for line in normalized.split('\n') {
        if line.is_empty() {
            continue;
        }
        if line.starts_with(':') {
            trace!("SSE heartbeat");
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            trace!(line, "SSE line without field separator ignored");
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);

        match field.trim() {
            "event" => event_name = Some(value.to_string()),
            "id" => id = Some(value.to_string()),
            "data" => match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    ParsedEvent {
        event_name: event_name.filter(|name| !name.is_empty()).unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
        id,
        data,
        raw: block.to_string(),
    }
}
