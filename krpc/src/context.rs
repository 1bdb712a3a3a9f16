use crate::EndPoint;

/// Per-call view handed to every method.
#[derive(Clone, Copy, Debug)]
pub struct Context<'a> {
    /// The endpoint the call was routed through.
    pub endpoint: &'a EndPoint,
    /// Id of the request being served, `0` for calls not tied to a message.
    pub msgid: u64,
}

impl<'a> Context<'a> {
    #[must_use]
    pub fn new(endpoint: &'a EndPoint) -> Self {
        Self {
            endpoint,
            msgid: 0,
        }
    }

    #[must_use]
    pub fn with_msgid(self, msgid: u64) -> Self {
        Self { msgid, ..self }
    }
}
