//! Service implementations exposed by a provider.
//!
//! Methods are registered explicitly under their name and parameter-type
//! signature when the service is built, and looked up by the same pair
//! for every request.

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Invocable handle for one service method
pub type MethodHandler = Arc<dyn Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync>;

/// `name(T1,T2)` lookup key
pub fn method_signature<S: AsRef<str>>(name: &str, parameter_types: &[S]) -> String {
    let types: Vec<&str> = parameter_types.iter().map(AsRef::as_ref).collect();
    format!("{}({})", name, types.join(","))
}

/// One service implementation: a table of method handlers.
///
/// ```ignore
/// let echo = ServiceBean::new()
///     .typed_method("echo", &["String"], |(text,): (String,)| Ok(text));
/// ```
#[derive(Clone, Default)]
pub struct ServiceBean {
    methods: HashMap<String, MethodHandler>,
}

impl ServiceBean {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method taking raw JSON parameters
    pub fn method<F>(mut self, name: &str, parameter_types: &[&str], handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.methods
            .insert(method_signature(name, parameter_types), Arc::new(handler));
        self
    }

    /// Register a method with typed parameters.
    ///
    /// The parameter list is decoded as a tuple `A`, so a single `String`
    /// parameter is declared as `(String,)`.
    pub fn typed_method<A, R, F>(self, name: &str, parameter_types: &[&str], handler: F) -> Self
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(A) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let signature = method_signature(name, parameter_types);
        self.method(name, parameter_types, move |parameters| {
            let args: A = serde_json::from_value(Value::Array(parameters))
                .with_context(|| format!("invalid parameters for {}", signature))?;
            let result = handler(args)?;
            Ok(serde_json::to_value(result)?)
        })
    }

    pub fn lookup<S: AsRef<str>>(&self, name: &str, parameter_types: &[S]) -> Option<&MethodHandler> {
        self.methods.get(&method_signature(name, parameter_types))
    }

    pub fn signatures(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Debug for ServiceBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut signatures: Vec<_> = self.signatures().collect();
        signatures.sort_unstable();
        f.debug_struct("ServiceBean")
            .field("methods", &signatures)
            .finish()
    }
}
