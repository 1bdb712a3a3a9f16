use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;
use std::time::Duration;

/// Largest frame accepted by either side.
pub const MAX_MSG_SIZE: usize = 64 << 20;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

#[serde_inline_default]
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone)]
pub struct ServerConfig {
    #[serde_inline_default(MAX_MSG_SIZE)]
    pub max_msg_size: usize,
    /// Connections idle for longer than this are closed.
    #[serde_inline_default(Duration::from_secs(60))]
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_msg_size: MAX_MSG_SIZE,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

#[serde_inline_default]
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone)]
pub struct ClientConfig {
    #[serde_inline_default(DEFAULT_TIMEOUT)]
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Encode request metadata and arguments as MessagePack.
    #[serde_inline_default(false)]
    pub use_msgpack: bool,
    #[serde_inline_default(MAX_MSG_SIZE)]
    pub max_msg_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            use_msgpack: false,
            max_msg_size: MAX_MSG_SIZE,
        }
    }
}
