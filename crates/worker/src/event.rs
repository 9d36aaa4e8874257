//! Inbound events and their classification.

/// Metadata header carrying the event classification.
pub const EVENT_TYPE_HEADER: &str = "event_type";

/// An event as delivered by the queue transport: opaque payload plus headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundEvent {
    pub headers: Vec<(String, Vec<u8>)>,
    pub payload: Vec<u8>,
}

impl InboundEvent {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: Vec::new(),
            payload: payload.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Returns the value of the first header named `key`.
    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_slice())
    }

    /// Classifies the event from its metadata; the payload is never inspected.
    pub fn kind(&self) -> EventKind {
        EventKind::from_tag(self.header(EVENT_TYPE_HEADER))
    }
}

/// Recognized event classifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A tenant registered an application; forge its superkey.
    CreateApplication,

    /// A tenant removed an application. Recognized but not yet handled.
    DeleteApplication,

    /// Missing or unknown classification, carrying the raw tag if present.
    Unrecognized(Option<String>),
}

impl EventKind {
    pub fn from_tag(tag: Option<&[u8]>) -> Self {
        match tag {
            Some(b"create_application") => EventKind::CreateApplication,
            Some(b"delete_application") => EventKind::DeleteApplication,
            Some(other) => EventKind::Unrecognized(Some(String::from_utf8_lossy(other).into_owned())),
            None => EventKind::Unrecognized(None),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CreateApplication => "create_application",
            EventKind::DeleteApplication => "delete_application",
            EventKind::Unrecognized(_) => "unrecognized",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
