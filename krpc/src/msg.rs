use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::{Arguments, Encoding, Error, Payload, Result, Status};

/// Message flags.
///
/// - `IsReq`: the message is a request
/// - `IsRsp`: the message is a response
/// - `UseMessagePack`: metadata and arguments are MessagePack instead of JSON
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MsgFlags(u8);

bitflags! {
    impl MsgFlags: u8 {
        const IsReq = 1;
        const IsRsp = 2;
        const UseMessagePack = 4;
    }
}

/// Routing and control information preceding every payload.
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct MsgMeta {
    /// Method path, `Service/Method` (a leading `/` is accepted).
    pub method: String,
    pub flags: MsgFlags,
    /// Correlates a response with its request.
    pub msgid: u64,
    /// Outcome of the call, only meaningful on responses.
    #[serde(default, skip_serializing_if = "Status::ok")]
    pub status: Status,
}

impl MsgMeta {
    #[must_use]
    pub fn request(method: impl Into<String>, msgid: u64) -> Self {
        Self {
            method: method.into(),
            flags: MsgFlags::IsReq,
            msgid,
            status: Status::Ok,
        }
    }

    /// Builds the metadata answering this request.
    ///
    /// Response bodies are produced by an `OutputJsonStream`, so the response
    /// is always JSON regardless of the request encoding.
    #[must_use]
    pub fn response(&self, status: Status) -> Self {
        Self {
            method: self.method.clone(),
            flags: MsgFlags::IsRsp,
            msgid: self.msgid,
            status,
        }
    }

    #[must_use]
    pub fn is_req(&self) -> bool {
        self.flags.contains(MsgFlags::IsReq)
    }

    #[must_use]
    pub fn is_rsp(&self) -> bool {
        self.flags.contains(MsgFlags::IsRsp)
    }

    #[must_use]
    pub fn encoding(&self) -> Encoding {
        if self.flags.contains(MsgFlags::UseMessagePack) {
            Encoding::MessagePack
        } else {
            Encoding::Json
        }
    }

    /// Splits the method path into service and method names.
    ///
    /// ```rust
    /// # use krpc::MsgMeta;
    /// let meta = MsgMeta::request("/ServiceInfo/List", 1);
    /// assert_eq!(meta.service_and_method().unwrap(), ("ServiceInfo", "List"));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless the path has exactly two non-empty
    /// segments.
    pub fn service_and_method(&self) -> Result<(&str, &str)> {
        let path = self.method.strip_prefix('/').unwrap_or(&self.method);
        match path.split_once('/') {
            Some((service, method))
                if !service.is_empty() && !method.is_empty() && !method.contains('/') =>
            {
                Ok((service, method))
            }
            _ => Err(Error::invalid_argument(format!(
                "invalid method path: {:?}",
                self.method
            ))),
        }
    }

    /// Writes `| u32 BE meta_len | meta | payload |` to `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be serialized.
    pub fn serialize_to(&self, payload: &[u8], buf: &mut BytesMut) -> Result<()> {
        const S: usize = std::mem::size_of::<u32>();
        let meta_offset = buf.len();
        buf.put_u32(0);
        if self.flags.contains(MsgFlags::UseMessagePack) {
            rmp_serde::encode::write_named(&mut BufMut::writer(&mut *buf), self)?;
        } else {
            serde_json::to_writer(BufMut::writer(&mut *buf), self)?;
        }
        let meta_len = u32::try_from(buf.len() - meta_offset - S)?;
        buf[meta_offset..meta_offset + S].copy_from_slice(&meta_len.to_be_bytes());
        buf.extend_from_slice(payload);
        Ok(())
    }
}

/// A decoded request or response.
///
/// Layout on the wire:
///
/// ```text
/// | 4 bytes  | N bytes  | M bytes |
/// | meta_len | metadata | payload |
/// ```
///
/// The metadata is JSON or MessagePack, detected by a leading `{`.
#[derive(Debug, Default, Clone)]
pub struct Message {
    pub meta: MsgMeta,
    pub payload: Payload,
}

impl Message {
    pub fn new(meta: MsgMeta, payload: impl Into<Payload>) -> Self {
        Self {
            meta,
            payload: payload.into(),
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidArgument` if the message is truncated or its metadata
    /// cannot be decoded.
    pub fn parse(payload: impl Into<Payload>) -> Result<Self> {
        const S: usize = std::mem::size_of::<u32>();
        let mut payload: Payload = payload.into();

        let len = payload.len();
        let meta_len = match payload.get(..S).map(<[u8; S]>::try_from) {
            Some(Ok(b)) => u32::from_be_bytes(b) as usize,
            _ => {
                return Err(Error::invalid_argument(format!(
                    "invalid msg length: {len}"
                )));
            }
        };

        if meta_len == 0 {
            return Err(Error::invalid_argument(format!(
                "invalid meta length: {meta_len}"
            )));
        }

        let offset = S + meta_len;
        if offset > len {
            return Err(Error::invalid_argument(format!(
                "invalid meta length: {meta_len}, msg length: {len}"
            )));
        }

        let meta: MsgMeta = if payload[S] == b'{' {
            serde_json::from_slice(&payload[S..offset])?
        } else {
            rmp_serde::from_slice(&payload[S..offset])?
        };

        payload.advance(offset);
        Ok(Message { meta, payload })
    }

    /// Encodes the message with [`MsgMeta::serialize_to`].
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be serialized or is longer
    /// than `u32::MAX` bytes.
    pub fn serialize_to(&self, buf: &mut BytesMut) -> Result<()> {
        self.meta.serialize_to(&self.payload, buf)
    }

    #[must_use]
    pub fn arguments(&self) -> Arguments {
        Arguments::new(self.payload.clone(), self.meta.encoding())
    }
}
