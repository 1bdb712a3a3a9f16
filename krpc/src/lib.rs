//! # krpc
//!
//! Service registration, dispatch and introspection for KRPC endpoints.
//!
//! Concrete services register strongly-typed methods through a
//! [`ServiceBase`]; every method ends up behind the same type-erased
//! [`Handler`] in a [`Service`] table. An [`EndPoint`] aggregates the services
//! and routes `Service/Method` calls to them, and the built-in
//! [`services::ServiceInfo`] streams the registry back as JSON.
//!
//! ```rust
//! # use std::sync::Arc;
//! # use krpc::{Arguments, EndPoint, OutputJsonStream, services::ServiceInfo};
//! let mut builder = EndPoint::builder();
//! Arc::new(ServiceInfo).export(&mut builder);
//! let endpoint = builder.build();
//!
//! let mut buf = Vec::new();
//! let status = endpoint.route(
//!     "ServiceInfo",
//!     "List",
//!     &Arguments::default(),
//!     &mut OutputJsonStream::new(&mut buf),
//! );
//! assert!(status.ok());
//! ```
#![forbid(unsafe_code)]

pub use krpc_macro::service;

mod error;
pub use error::{Error, ErrorKind, Result};

mod status;
pub use status::Status;

mod payload;
pub use payload::Payload;

mod arguments;
pub use arguments::{Arguments, Encoding};

mod msg;
pub use msg::{Message, MsgFlags, MsgMeta};

mod output_json_stream;
pub use output_json_stream::OutputJsonStream;

mod context;
pub use context::Context;

mod service;
pub use service::{Handler, MethodDescriptor, Service};

mod service_base;
pub use service_base::{MethodFn, ServiceBase};

mod endpoint;
pub use endpoint::{EndPoint, EndPointBuilder, RegistrationError};

pub mod services;
