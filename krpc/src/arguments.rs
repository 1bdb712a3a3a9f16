use serde::de::DeserializeOwned;

use crate::{Payload, Result};

/// Wire encoding of method arguments.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Json,
    MessagePack,
}

/// Encoded arguments of a single call, decoded lazily by the method adapter.
#[derive(Debug, Default, Clone)]
pub struct Arguments {
    pub payload: Payload,
    pub encoding: Encoding,
}

impl Arguments {
    #[must_use]
    pub fn new(payload: impl Into<Payload>, encoding: Encoding) -> Self {
        Self {
            payload: payload.into(),
            encoding,
        }
    }

    #[must_use]
    pub fn json(payload: impl Into<Payload>) -> Self {
        Self::new(payload, Encoding::Json)
    }

    /// Encodes `value` as JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn from_value<T: serde::Serialize>(value: &T) -> Result<Self> {
        Ok(Self::json(serde_json::to_vec(value)?))
    }

    /// Decodes the arguments into the method's declared argument type.
    ///
    /// An empty payload is treated as JSON `null`, so body-less requests can
    /// call methods taking `()` or `Option<T>`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the payload does not match `A`.
    pub fn decode<A: DeserializeOwned>(&self) -> Result<A> {
        if self.payload.is_empty() {
            Ok(serde_json::from_value(serde_json::Value::Null)?)
        } else {
            match self.encoding {
                Encoding::Json => Ok(serde_json::from_slice(&self.payload)?),
                Encoding::MessagePack => Ok(rmp_serde::from_slice(&self.payload)?),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::ErrorKind;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_decode_json() {
        let args = Arguments::json(r#"{"x":1,"y":2}"#);
        assert_eq!(args.decode::<Point>().unwrap(), Point { x: 1, y: 2 });

        let err = args.decode::<String>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_decode_msgpack() {
        let bytes = rmp_serde::to_vec_named(&Point { x: 3, y: 4 }).unwrap();
        let args = Arguments::new(bytes, Encoding::MessagePack);
        assert_eq!(args.decode::<Point>().unwrap(), Point { x: 3, y: 4 });
    }

    #[test]
    fn test_decode_empty_payload() {
        let args = Arguments::default();
        args.decode::<()>().unwrap();
        assert_eq!(args.decode::<Option<Point>>().unwrap(), None);
        assert_eq!(
            args.decode::<Point>().unwrap_err().kind,
            ErrorKind::InvalidArgument
        );
    }
}
