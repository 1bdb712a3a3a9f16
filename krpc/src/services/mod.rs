//! Built-in services.
//!
//! - `ServiceInfo`: lists the services and methods registered with the
//!   endpoint a call is routed through

mod service_info;
pub use service_info::ServiceInfo;
