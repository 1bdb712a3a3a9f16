use std::net::SocketAddr;

use krpc::{Error, Message, MsgFlags, MsgMeta, Result};
use serde::{Serialize, de::DeserializeOwned};
use tokio::net::{
    TcpStream,
    tcp::{OwnedReadHalf, OwnedWriteHalf},
};

use crate::{
    ClientConfig,
    frame::{self, FrameReader},
};

/// A connection to a demo server issuing one request at a time.
pub struct Client {
    config: ClientConfig,
    reader: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_msgid: u64,
}

impl Client {
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(addr: SocketAddr, config: ClientConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::internal(format!("connect {addr} failed: {e}")))?;
        let (recv_stream, send_stream) = stream.into_split();
        Ok(Self {
            reader: FrameReader::new(recv_stream, config.max_msg_size),
            writer: send_stream,
            config,
            next_msgid: 1,
        })
    }

    /// Sends already encoded arguments and returns the raw response.
    ///
    /// The failure status of the call is left in the response metadata.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failures or timeout.
    pub async fn call_raw(&mut self, method: &str, args: &[u8]) -> Result<Message> {
        let msgid = self.next_msgid;
        self.next_msgid += 1;

        let mut meta = MsgMeta::request(method, msgid);
        if self.config.use_msgpack {
            meta.flags |= MsgFlags::UseMessagePack;
        }
        let request = frame::encode(&meta, args, self.config.max_msg_size)?;

        let timeout = self.config.timeout;
        match tokio::time::timeout(timeout, self.exchange(msgid, &request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::internal(format!("{method} timed out after {timeout:?}"))),
        }
    }

    async fn exchange(&mut self, msgid: u64, request: &[u8]) -> Result<Message> {
        frame::write_frame(&mut self.writer, request).await?;
        loop {
            let Some(rsp) = self.reader.next_message().await? else {
                return Err(Error::internal("connection closed by server"));
            };
            if rsp.meta.msgid == msgid {
                return Ok(rsp);
            }
            // a response to a request that already timed out.
            tracing::debug!("drop stale response {}", rsp.meta.msgid);
        }
    }

    /// Calls `method` with `req` and decodes its JSON output.
    ///
    /// # Errors
    ///
    /// Returns the failure status of the call, or a transport error.
    pub async fn call<Req, Rsp>(&mut self, method: &str, req: &Req) -> Result<Rsp>
    where
        Req: Serialize,
        Rsp: DeserializeOwned,
    {
        let args = if self.config.use_msgpack {
            rmp_serde::to_vec_named(req)?
        } else {
            serde_json::to_vec(req)?
        };
        let rsp = self.call_raw(method, &args).await?;
        rsp.meta.status.clone().into_result()?;
        rsp.arguments().decode()
    }
}
