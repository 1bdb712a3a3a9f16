use std::sync::Arc;

use crate::{Context, EndPoint, EndPointBuilder, OutputJsonStream, Result, ServiceBase, Status};

/// Introspection service, exported as `ServiceInfo` with the methods `List`
/// and `Describe`.
///
/// Both methods read the live registry of the endpoint the call is routed
/// through, so the service itself shows up once it is registered.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServiceInfo;

impl ServiceInfo {
    pub const NAME: &'static str = "ServiceInfo";

    pub fn export(self: Arc<Self>, builder: &mut EndPointBuilder) {
        let mut base = ServiceBase::new(Self::NAME, self);
        base.register_method("List", Self::list)
            .register_method("Describe", Self::describe);
        base.export(builder);
    }

    /// Writes `[{"name": <service>, "methods": [<method>, ...]}, ...]`.
    pub fn list(&self, ctx: &Context<'_>, out: &mut OutputJsonStream<'_>) -> Status {
        Self::write_list(ctx.endpoint, out).into()
    }

    /// Like [`list`](Self::list), with every method written as
    /// `{"name": <method>, "arguments": <JSON Schema or null>}`.
    pub fn describe(&self, ctx: &Context<'_>, out: &mut OutputJsonStream<'_>) -> Status {
        Self::write_description(ctx.endpoint, out).into()
    }

    fn write_list(endpoint: &EndPoint, out: &mut OutputJsonStream<'_>) -> Result<()> {
        out.begin_array()?;
        for service in endpoint.services() {
            out.begin_object()?;
            out.write_key("name")?;
            out.write_string(service.name())?;
            out.write_key("methods")?;
            out.begin_array()?;
            for method in service.method_names() {
                out.write_string(method)?;
            }
            out.end_array()?;
            out.end_object()?;
        }
        out.end_array()
    }

    fn write_description(endpoint: &EndPoint, out: &mut OutputJsonStream<'_>) -> Result<()> {
        out.begin_array()?;
        for service in endpoint.services() {
            out.begin_object()?;
            out.write_key("name")?;
            out.write_string(service.name())?;
            out.write_key("methods")?;
            out.begin_array()?;
            for method in service.methods() {
                out.begin_object()?;
                out.write_key("name")?;
                out.write_string(method.name())?;
                out.write_key("arguments")?;
                match method.arguments_schema() {
                    Some(schema) => out.write_value(schema)?,
                    None => out.write_null()?,
                }
                out.end_object()?;
            }
            out.end_array()?;
            out.end_object()?;
        }
        out.end_array()
    }
}
