use std::{net::SocketAddr, sync::Arc};

use bytes::BytesMut;
use krpc::{EndPoint, Error, Message, Result, Status};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    ServerConfig,
    frame::{self, FrameReader},
};

/// Serves an [`EndPoint`] over framed TCP connections.
///
/// # Examples
///
/// ```rust,no_run
/// # use std::{net::SocketAddr, str::FromStr, sync::Arc};
/// # use krpc_demo::{DemoImpl, Server, ServerConfig, build_endpoint};
/// # #[tokio::main]
/// # async fn main() {
/// let endpoint = build_endpoint(Arc::new(DemoImpl::default()));
/// let server = Server::create(endpoint, ServerConfig::default());
///
/// let addr = SocketAddr::from_str("127.0.0.1:8000").unwrap();
/// server.listen(addr).await.unwrap();
/// tokio::signal::ctrl_c().await.unwrap();
/// server.stop();
/// server.join().await;
/// # }
/// ```
pub struct Server {
    endpoint: Arc<EndPoint>,
    config: ServerConfig,
    stop: CancellationToken,
    tasks: TaskTracker,
}

impl Server {
    #[must_use]
    pub fn create(endpoint: EndPoint, config: ServerConfig) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
            config,
            stop: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &Arc<EndPoint> {
        &self.endpoint
    }

    /// Starts accepting connections on `addr`.
    ///
    /// Returns the bound address, which differs from `addr` when port 0 was
    /// requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn listen(&self, addr: SocketAddr) -> Result<SocketAddr> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::internal(format!("bind {addr} failed: {e}")))?;
        let listener_addr = listener.local_addr()?;

        let endpoint = self.endpoint.clone();
        let config = self.config.clone();
        let stop = self.stop.clone();
        let tasks = self.tasks.clone();
        self.tasks.spawn(async move {
            tracing::info!("start listening: {listener_addr}");
            loop {
                tokio::select! {
                    () = stop.cancelled() => {
                        tracing::info!("stop accept loop");
                        break;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            tasks.spawn(serve_connection(
                                stream,
                                peer,
                                endpoint.clone(),
                                config.clone(),
                                stop.clone(),
                            ));
                        }
                        Err(e) => {
                            tracing::error!("accept on {listener_addr} failed: {e}");
                            break;
                        }
                    }
                }
            }
        });

        Ok(listener_addr)
    }

    /// Stops accepting and closes every connection.
    ///
    /// Call [`join`](Self::join) afterwards to wait for the tasks to finish.
    pub fn stop(&self) {
        self.stop.cancel();
        self.tasks.close();
    }

    pub async fn join(&self) {
        self.tasks.wait().await;
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    endpoint: Arc<EndPoint>,
    config: ServerConfig,
    stop: CancellationToken,
) {
    let (recv_stream, mut send_stream) = stream.into_split();
    let mut reader = FrameReader::new(recv_stream, config.max_msg_size);
    tracing::debug!("accept connection from {peer}");
    loop {
        let next = tokio::time::timeout(config.idle_timeout, reader.next_message());
        let msg = tokio::select! {
            () = stop.cancelled() => break,
            result = next => match result {
                Ok(Ok(Some(msg))) => msg,
                Ok(Ok(None)) => {
                    tracing::debug!("connection from {peer} closed");
                    break;
                }
                Ok(Err(e)) => {
                    tracing::error!("recv from {peer} failed: {e}");
                    break;
                }
                Err(_) => {
                    tracing::info!("close idle connection from {peer}");
                    break;
                }
            }
        };

        let frame = match respond(&endpoint, &msg, config.max_msg_size) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("encode response to {peer} failed: {e}");
                break;
            }
        };
        if let Err(e) = frame::write_frame(&mut send_stream, &frame).await {
            tracing::error!("send to {peer} failed: {e}");
            break;
        }
    }
}

/// Serves one request and encodes the response frame.
///
/// The method output is only sent back when the call succeeded. A response
/// that does not fit into a frame is replaced by its failure status.
///
/// # Errors
///
/// Returns an error if not even the failure response can be encoded.
pub fn respond(endpoint: &EndPoint, msg: &Message, max_msg_size: usize) -> Result<BytesMut> {
    let mut body = Vec::new();
    let status = if msg.meta.is_req() {
        endpoint.handle(msg, &mut body)
    } else {
        Status::from(Error::invalid_argument("expected a request"))
    };

    if !status.ok() {
        tracing::debug!("{} (msgid {}) failed: {status}", msg.meta.method, msg.meta.msgid);
        body.clear();
    }

    match frame::encode(&msg.meta.response(status), &body, max_msg_size) {
        Ok(frame) => Ok(frame),
        Err(err) => frame::encode(&msg.meta.response(err.into()), b"", max_msg_size),
    }
}
