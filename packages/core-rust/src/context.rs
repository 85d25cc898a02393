/// Per-request context carried from the protocol adapter into the engine.
///
/// Only used to attach identifiers to trace spans and log events. The engine
/// never aborts work based on it: once a step starts it runs to completion.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Distributed trace identifier for observability.
    pub trace_id: String,
    /// Protocol that produced the request (`"http"`, `"grpc"`, ...).
    pub protocol: Option<String>,
    /// Caller identity, if the adapter knows it.
    pub caller: Option<String>,
}

impl RequestContext {
    /// Context with a freshly generated trace id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }
}
