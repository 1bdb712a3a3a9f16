//! Demo services for KRPC, served over a minimal framed TCP transport.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use krpc::{Context, EndPoint, OutputJsonStream, Result, services::ServiceInfo};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod config;
pub use config::{ClientConfig, MAX_MSG_SIZE, ServerConfig};

pub mod frame;

mod server;
pub use server::{Server, respond};

mod client;
pub use client::Client;

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
pub struct Request(pub String);

#[krpc::service]
pub trait EchoService {
    fn echo(&self, c: &Context, r: &Request, out: &mut OutputJsonStream) -> Result<()>;
}

#[krpc::service]
pub trait GreetService {
    fn greet(&self, c: &Context, r: &Request, out: &mut OutputJsonStream) -> Result<()>;

    /// Number of greetings served so far.
    fn greeted(&self, c: &Context, r: &(), out: &mut OutputJsonStream) -> Result<()>;
}

#[derive(Default)]
pub struct DemoImpl {
    idx: AtomicU64,
}

impl EchoService for DemoImpl {
    fn echo(&self, _c: &Context, r: &Request, out: &mut OutputJsonStream) -> Result<()> {
        out.write_value(&r.0)
    }
}

impl GreetService for DemoImpl {
    fn greet(&self, _c: &Context, r: &Request, out: &mut OutputJsonStream) -> Result<()> {
        let val = self.idx.fetch_add(1, Ordering::AcqRel);
        out.write_value(&format!("hello {}({})!", r.0, val))
    }

    fn greeted(&self, _c: &Context, (): &(), out: &mut OutputJsonStream) -> Result<()> {
        out.write_value(&self.idx.load(Ordering::Acquire))
    }
}

/// Composition root: registers the demo services and `ServiceInfo`.
#[must_use]
pub fn build_endpoint(demo: Arc<DemoImpl>) -> EndPoint {
    let mut builder = EndPoint::builder();
    EchoService::krpc_export(demo.clone(), &mut builder);
    GreetService::krpc_export(demo, &mut builder);
    Arc::new(ServiceInfo).export(&mut builder);
    builder.build()
}
