use foldhash::fast::RandomState;
use std::collections::HashMap;
use std::io::Write;

use crate::{Arguments, Context, Error, Message, OutputJsonStream, Service, Status};

/// Collects services during startup and validates them into an [`EndPoint`].
#[derive(Default, Debug)]
pub struct EndPointBuilder {
    services: Vec<Service>,
}

impl EndPointBuilder {
    pub fn register(&mut self, service: Service) -> &mut Self {
        tracing::debug!(
            "register service {} with {} method(s)",
            service.name(),
            service.methods().len()
        );
        self.services.push(service);
        self
    }

    /// Validates that service names are unique within the endpoint and method
    /// names are unique within each service.
    ///
    /// # Errors
    ///
    /// Returns every duplicate found.
    pub fn try_build(self) -> Result<EndPoint, RegistrationError> {
        let mut error = RegistrationError::default();
        let mut index =
            HashMap::with_capacity_and_hasher(self.services.len(), RandomState::default());
        for (idx, service) in self.services.iter().enumerate() {
            if index.insert(service.name().to_owned(), idx).is_some()
                && !error.duplicate_services.iter().any(|s| s == service.name())
            {
                error.duplicate_services.push(service.name().to_owned());
            }
            for method in service.duplicate_methods() {
                error
                    .duplicate_methods
                    .push(format!("{}/{method}", service.name()));
            }
        }

        if error.is_empty() {
            Ok(EndPoint {
                services: self.services,
                index,
            })
        } else {
            Err(error)
        }
    }

    /// Like [`try_build`](Self::try_build), but a duplicate registration
    /// aborts startup.
    ///
    /// # Panics
    ///
    /// Panics if any service or method name is registered twice.
    #[must_use]
    pub fn build(self) -> EndPoint {
        match self.try_build() {
            Ok(endpoint) => endpoint,
            Err(err) => {
                tracing::error!("invalid endpoint: {err}");
                panic!("invalid endpoint: {err}");
            }
        }
    }
}

/// Every duplicate name found while building an [`EndPoint`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistrationError {
    pub duplicate_services: Vec<String>,
    /// `Service/Method` paths.
    pub duplicate_methods: Vec<String>,
}

impl RegistrationError {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.duplicate_services.is_empty() && self.duplicate_methods.is_empty()
    }
}

impl std::error::Error for RegistrationError {}

impl std::fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        if !self.duplicate_services.is_empty() {
            write!(f, "duplicate services: {}", self.duplicate_services.join(", "))?;
            sep = "; ";
        }
        if !self.duplicate_methods.is_empty() {
            write!(f, "{sep}duplicate methods: {}", self.duplicate_methods.join(", "))?;
        }
        Ok(())
    }
}

/// Directory of every service reachable through one transport.
///
/// Built once by [`EndPointBuilder`] and read-only afterwards, so it can be
/// shared between worker threads without locking.
#[derive(Default)]
pub struct EndPoint {
    services: Vec<Service>,
    index: HashMap<String, usize, RandomState>,
}

impl EndPoint {
    #[must_use]
    pub fn builder() -> EndPointBuilder {
        EndPointBuilder::default()
    }

    #[must_use]
    pub fn resolve(&self, service: &str) -> Option<&Service> {
        self.index.get(service).map(|&idx| &self.services[idx])
    }

    /// Services in registration order.
    pub fn services(&self) -> impl ExactSizeIterator<Item = &Service> {
        self.services.iter()
    }

    /// Routes a call to `service`/`method`.
    ///
    /// Returns `NotFound` for an unknown service or method, otherwise the
    /// method's status unchanged.
    pub fn route(
        &self,
        service: &str,
        method: &str,
        args: &Arguments,
        out: &mut OutputJsonStream<'_>,
    ) -> Status {
        self.dispatch(&Context::new(self), service, method, args, out)
    }

    /// Serves a decoded request, writing the method output to `sink`.
    ///
    /// Besides the routing failures of [`route`](Self::route), a malformed
    /// method path is `InvalidArgument` and a successful method that leaves
    /// containers open is `Internal`.
    pub fn handle(&self, msg: &Message, sink: &mut dyn Write) -> Status {
        let (service, method) = match msg.meta.service_and_method() {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!("reject msg {}: {err}", msg.meta.msgid);
                return err.into();
            }
        };

        let ctx = Context::new(self).with_msgid(msg.meta.msgid);
        let mut out = OutputJsonStream::new(sink);
        let status = self.dispatch(&ctx, service, method, &msg.arguments(), &mut out);
        if status.ok()
            && let Err(err) = out.finish()
        {
            tracing::error!("{service}/{method} returned with incomplete output: {err}");
            return err.into();
        }
        status
    }

    fn dispatch(
        &self,
        ctx: &Context<'_>,
        service: &str,
        method: &str,
        args: &Arguments,
        out: &mut OutputJsonStream<'_>,
    ) -> Status {
        tracing::debug!("dispatch {service}/{method}, msgid: {}", ctx.msgid);
        match self.resolve(service) {
            Some(svc) => svc.dispatch(ctx, method, args, out),
            None => {
                let m = format!("service not found: {service}");
                tracing::warn!("{m}");
                Error::not_found(m).into()
            }
        }
    }
}

impl std::fmt::Debug for EndPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndPoint")
            .field("services", &self.services)
            .finish()
    }
}
