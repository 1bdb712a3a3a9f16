use std::sync::Arc;

use schemars::{JsonSchema, Schema};
use serde::de::DeserializeOwned;

use crate::{
    Arguments, Context, EndPointBuilder, Handler, MethodDescriptor, OutputJsonStream, Service,
    Status,
};

/// A strongly-typed method of `D` that can be stored behind a [`Handler`].
///
/// Implemented for two shapes of functions, typically `D::method` paths:
///
/// - `fn(&D, &Context, &mut OutputJsonStream) -> R`, which ignores the
///   request arguments;
/// - `fn(&D, &Context, A, &mut OutputJsonStream) -> R`, which receives the
///   arguments decoded as `A`.
///
/// `R` is anything convertible into a [`Status`], usually `Status` itself or
/// `krpc::Result<()>`. The `M` parameter only disambiguates the two shapes.
pub trait MethodFn<D, M>: Send + Sync + 'static {
    fn invoke(
        &self,
        this: &D,
        ctx: &Context<'_>,
        args: &Arguments,
        out: &mut OutputJsonStream<'_>,
    ) -> Status;

    fn arguments_schema() -> Option<Schema>;
}

impl<D, F, R> MethodFn<D, ()> for F
where
    F: Fn(&D, &Context<'_>, &mut OutputJsonStream<'_>) -> R + Send + Sync + 'static,
    R: Into<Status>,
{
    fn invoke(
        &self,
        this: &D,
        ctx: &Context<'_>,
        _: &Arguments,
        out: &mut OutputJsonStream<'_>,
    ) -> Status {
        (self)(this, ctx, out).into()
    }

    fn arguments_schema() -> Option<Schema> {
        None
    }
}

impl<D, F, A, R> MethodFn<D, (A,)> for F
where
    F: Fn(&D, &Context<'_>, A, &mut OutputJsonStream<'_>) -> R + Send + Sync + 'static,
    A: DeserializeOwned + JsonSchema,
    R: Into<Status>,
{
    fn invoke(
        &self,
        this: &D,
        ctx: &Context<'_>,
        args: &Arguments,
        out: &mut OutputJsonStream<'_>,
    ) -> Status {
        match args.decode::<A>() {
            Ok(args) => (self)(this, ctx, args, out).into(),
            Err(err) => {
                tracing::debug!("decode arguments failed: {err}");
                err.into()
            }
        }
    }

    fn arguments_schema() -> Option<Schema> {
        Some(schemars::schema_for!(A))
    }
}

/// Builds the method table of a concrete service.
///
/// The service instance is shared by every registered method; registration
/// happens once, before the service is handed to an [`EndPointBuilder`].
///
/// ```rust
/// # use std::sync::Arc;
/// # use krpc::{Context, EndPoint, OutputJsonStream, Result, ServiceBase};
/// struct Adder;
///
/// impl Adder {
///     fn add(&self, _: &Context, (a, b): (i64, i64), out: &mut OutputJsonStream) -> Result<()> {
///         out.write_value(&(a + b))
///     }
/// }
///
/// let mut builder = EndPoint::builder();
/// let mut base = ServiceBase::new("Adder", Arc::new(Adder));
/// base.register_method("Add", Adder::add);
/// base.export(&mut builder);
///
/// let endpoint = builder.build();
/// assert_eq!(endpoint.resolve("Adder").unwrap().method_names().collect::<Vec<_>>(), ["Add"]);
/// ```
pub struct ServiceBase<D> {
    instance: Arc<D>,
    service: Service,
}

impl<D: Send + Sync + 'static> ServiceBase<D> {
    pub fn new(name: impl Into<String>, instance: Arc<D>) -> Self {
        Self {
            instance,
            service: Service::new(name),
        }
    }

    #[must_use]
    pub fn instance(&self) -> &Arc<D> {
        &self.instance
    }

    /// Wraps `method` into an adapter bound to the shared instance and adds
    /// it to the method table.
    pub fn register_method<F, M>(&mut self, name: &str, method: F) -> &mut Self
    where
        F: MethodFn<D, M>,
        M: 'static,
    {
        let instance = self.instance.clone();
        let handler: Handler = Box::new(
            move |ctx: &Context<'_>, args: &Arguments, out: &mut OutputJsonStream<'_>| {
                method.invoke(&instance, ctx, args, out)
            },
        );
        self.service.register_method(
            MethodDescriptor::new(name, handler)
                .with_arguments_schema(<F as MethodFn<D, M>>::arguments_schema()),
        );
        self
    }

    #[must_use]
    pub fn into_service(self) -> Service {
        self.service
    }

    pub fn export(self, builder: &mut EndPointBuilder) {
        builder.register(self.into_service());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use serde::Deserialize;

    use super::*;
    use crate::{EndPoint, Error, ErrorKind, Result};

    #[derive(Deserialize, JsonSchema)]
    struct AddReq {
        delta: u64,
    }

    #[derive(Default)]
    struct Counter {
        value: AtomicU64,
    }

    impl Counter {
        fn get(&self, _: &Context, out: &mut OutputJsonStream) -> Result<()> {
            out.write_value(&self.value.load(Ordering::Acquire))
        }

        fn add(&self, _: &Context, req: AddReq, out: &mut OutputJsonStream) -> Result<()> {
            if req.delta == 0 {
                return Err(Error::invalid_argument("delta must be positive"));
            }
            let value = self.value.fetch_add(req.delta, Ordering::AcqRel) + req.delta;
            out.write_value(&value)
        }

        fn reset(&self, _: &Context, out: &mut OutputJsonStream) -> Status {
            self.value.store(0, Ordering::Release);
            out.write_value(&()).into()
        }
    }

    fn call(service: &Service, method: &str, args: &str) -> (Status, String) {
        let endpoint = EndPoint::default();
        let mut buf = Vec::new();
        let mut out = OutputJsonStream::new(&mut buf);
        let status = service.dispatch(
            &Context::new(&endpoint),
            method,
            &Arguments::json(args.to_owned().into_bytes()),
            &mut out,
        );
        (status, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn test_typed_dispatch() {
        let counter = Arc::new(Counter::default());
        let mut base = ServiceBase::new("Counter", counter.clone());
        base.register_method("Get", Counter::get)
            .register_method("Add", Counter::add)
            .register_method("Reset", Counter::reset);
        let service = base.into_service();
        assert_eq!(
            service.method_names().collect::<Vec<_>>(),
            ["Get", "Add", "Reset"]
        );

        assert_eq!(call(&service, "Add", r#"{"delta":5}"#), (Status::Ok, "5".into()));
        assert_eq!(call(&service, "Add", r#"{"delta":2}"#), (Status::Ok, "7".into()));
        // argument-less methods ignore whatever they receive.
        assert_eq!(call(&service, "Get", "[1,2]"), (Status::Ok, "7".into()));
        assert_eq!(counter.value.load(Ordering::Acquire), 7);

        assert_eq!(call(&service, "Reset", ""), (Status::Ok, "null".into()));
        assert_eq!(counter.value.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_decode_failure_is_invalid_argument() {
        let mut base = ServiceBase::new("Counter", Arc::new(Counter::default()));
        base.register_method("Add", Counter::add);
        let service = base.into_service();

        for args in ["", "{}", r#"{"delta":"x"}"#, "{"] {
            let (status, output) = call(&service, "Add", args);
            assert_eq!(status.kind(), Some(&ErrorKind::InvalidArgument), "{args}");
            assert!(output.is_empty());
        }

        let (status, _) = call(&service, "Add", r#"{"delta":0}"#);
        assert_eq!(status, Status::failed(ErrorKind::InvalidArgument, "delta must be positive"));
    }

    #[test]
    fn test_arguments_schema() {
        let mut base = ServiceBase::new("Counter", Arc::new(Counter::default()));
        base.register_method("Get", Counter::get)
            .register_method("Add", Counter::add);
        let service = base.into_service();

        assert!(service.method("Get").unwrap().arguments_schema().is_none());
        let schema = serde_json::to_value(service.method("Add").unwrap().arguments_schema())
            .unwrap();
        assert_eq!(schema["title"], "AddReq");
        assert!(schema["properties"]["delta"].is_object());
    }
}
