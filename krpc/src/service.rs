use foldhash::fast::RandomState;
use schemars::Schema;
use std::collections::HashMap;

use crate::{Arguments, Context, Error, OutputJsonStream, Status};

/// Type-erased method entry point shared by every registered method.
pub type Handler =
    Box<dyn Fn(&Context<'_>, &Arguments, &mut OutputJsonStream<'_>) -> Status + Send + Sync>;

pub struct MethodDescriptor {
    name: String,
    handler: Handler,
    arguments: Option<Schema>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, handler: Handler) -> Self {
        Self {
            name: name.into(),
            handler,
            arguments: None,
        }
    }

    #[must_use]
    pub fn with_arguments_schema(mut self, schema: Option<Schema>) -> Self {
        self.arguments = schema;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// JSON Schema of the decoded argument type, `None` for methods that
    /// ignore their arguments.
    #[must_use]
    pub fn arguments_schema(&self) -> Option<&Schema> {
        self.arguments.as_ref()
    }

    pub fn invoke(
        &self,
        ctx: &Context<'_>,
        args: &Arguments,
        out: &mut OutputJsonStream<'_>,
    ) -> Status {
        (self.handler)(ctx, args, out)
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A named method table.
///
/// Methods keep their registration order. A second method registered under
/// an existing name is not installed; it is recorded so that
/// [`EndPointBuilder::try_build`](crate::EndPointBuilder::try_build) rejects
/// the service.
pub struct Service {
    name: String,
    methods: Vec<MethodDescriptor>,
    index: HashMap<String, usize, RandomState>,
    duplicates: Vec<String>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            index: HashMap::default(),
            duplicates: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn register_method(&mut self, method: MethodDescriptor) -> &mut Self {
        if self.index.contains_key(method.name()) {
            tracing::error!("duplicate method {}/{}", self.name, method.name());
            self.duplicates.push(method.name);
        } else {
            self.index.insert(method.name.clone(), self.methods.len());
            self.methods.push(method);
        }
        self
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.index.get(name).map(|&idx| &self.methods[idx])
    }

    pub fn methods(&self) -> impl ExactSizeIterator<Item = &MethodDescriptor> {
        self.methods.iter()
    }

    /// Method names in registration order.
    pub fn method_names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.methods.iter().map(MethodDescriptor::name)
    }

    /// Names registered more than once.
    #[must_use]
    pub fn duplicate_methods(&self) -> &[String] {
        &self.duplicates
    }

    /// Looks up `method` and invokes it.
    ///
    /// Returns `NotFound` if the method is not registered; otherwise the
    /// handler's status unchanged.
    pub fn dispatch(
        &self,
        ctx: &Context<'_>,
        method: &str,
        args: &Arguments,
        out: &mut OutputJsonStream<'_>,
    ) -> Status {
        match self.method(method) {
            Some(descriptor) => descriptor.invoke(ctx, args, out),
            None => {
                let m = format!("method not found: {}/{method}", self.name);
                tracing::warn!("{m}");
                Error::not_found(m).into()
            }
        }
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("methods", &self.method_names().collect::<Vec<_>>())
            .finish()
    }
}
