use bytes::{Buf, Bytes, BytesMut};

/// Raw bytes of a request or response body.
///
/// Cloning is cheap: the bytes are reference counted and never copied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(Bytes);

impl Payload {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Drops the first `offset` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is larger than [`len`](Self::len).
    pub fn advance(&mut self, offset: usize) {
        self.0.advance(offset);
    }
}

impl std::ops::Deref for Payload {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Self(value)
    }
}

impl From<BytesMut> for Payload {
    fn from(value: BytesMut) -> Self {
        Self(value.freeze())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self(value.into())
    }
}

impl From<&'static str> for Payload {
    fn from(value: &'static str) -> Self {
        Self(Bytes::from_static(value.as_bytes()))
    }
}

impl From<Payload> for Bytes {
    fn from(value: Payload) -> Self {
        value.0
    }
}
