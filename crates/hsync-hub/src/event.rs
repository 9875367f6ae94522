use bytes::Bytes;

/// Name of the event the hub emits whenever the registry size changes.
pub const ONLINE_COUNT_EVENT: &str = "online-count-updated";

/// One fragment to publish. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    name: String,
    payload: String,
    excluded: Option<String>,
}

impl Event {
    /// Line breaks are stripped from `name`; a name spanning lines would end
    /// the frame early.
    pub fn new(name: impl Into<String>, payload: impl Into<String>) -> Self {
        let mut name = name.into();
        name.retain(|c| c != '\n' && c != '\r');
        Self {
            name,
            payload: payload.into(),
            excluded: None,
        }
    }

    /// Skip the connection registered under `identity`. An empty identity
    /// excludes nobody.
    pub fn excluding(mut self, identity: impl Into<String>) -> Self {
        let identity = identity.into();
        self.excluded = (!identity.is_empty()).then_some(identity);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn excluded(&self) -> Option<&str> {
        self.excluded.as_deref()
    }

    /// Whether a connection with `identity` should receive this event.
    pub fn is_for(&self, identity: &str) -> bool {
        self.excluded.as_deref() != Some(identity)
    }

    /// Wire encoding of this event, see [`encode_frame`].
    pub fn to_frame(&self) -> Bytes {
        encode_frame(&self.name, &self.payload)
    }
}

/// Encode one `text/event-stream` frame.
///
/// ```text
/// event: <name>
/// data: <line 1>
/// data: <line 2>
///
/// ```
///
/// CRLF and lone CR are treated as LF before splitting. Every payload line,
/// including empty ones, becomes its own `data:` line.
pub fn encode_frame(name: &str, payload: &str) -> Bytes {
    let normalized = if payload.contains('\r') {
        payload.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        payload.to_string()
    };

    let mut frame = String::with_capacity(name.len() + normalized.len() + 16);
    frame.push_str("event: ");
    frame.push_str(name);
    frame.push('\n');
    for line in normalized.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    Bytes::from(frame)
}
