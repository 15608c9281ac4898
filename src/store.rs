use std::collections::HashMap;

use crate::log::HostError;

use serde::Serialize;
use serde_json::{to_value, Value};

/// Provides storage for the arguments a template is rendered with.
///
/// Positional arguments bind to the `template` directive's parameters in
/// order, named arguments bind by parameter name, and parameters left
/// unbound fall back to their declared defaults.
#[derive(Debug, Default)]
pub struct Args {
    /// Arguments that bind to parameters in declaration order.
    positional: Vec<Value>,
    /// Arguments that bind to parameters by name.
    named: HashMap<String, Value>,
}

impl Args {
    /// Create a new [`Args`].
    ///
    /// # Examples
    ///
    /// ```
    /// use symplate::Args;
    ///
    /// let args = Args::new();
    /// ```
    #[inline]
    pub fn new() -> Self {
        Self {
            positional: Vec::new(),
            named: HashMap::new(),
        }
    }

    /// Append a positional argument.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the serialization fails.
    pub fn push<T>(&mut self, value: T) -> Result<(), HostError>
    where
        T: Serialize,
    {
        let value = to_value(value)
            .map_err(|error| HostError::build(format!("argument is unserializable: {error}")))?;
        self.positional.push(value);

        Ok(())
    }

    /// Append a positional argument.
    ///
    /// # Panics
    ///
    /// Panics if the serialization fails.
    #[inline]
    pub fn push_must<T>(&mut self, value: T)
    where
        T: Serialize,
    {
        self.positional
            .push(to_value(value).expect("argument should serialize"));
    }

    /// Append a positional argument.
    ///
    /// Returns the `Args`, so additional methods may be chained.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the serialization fails.
    pub fn with_arg<T>(mut self, value: T) -> Result<Self, HostError>
    where
        T: Serialize,
    {
        self.push(value)?;

        Ok(self)
    }

    /// Append a positional argument.
    ///
    /// Returns the `Args`, so additional methods may be chained.
    ///
    /// # Panics
    ///
    /// Panics if the serialization fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use symplate::Args;
    ///
    /// let args = Args::new().with_arg_must("taylor").with_arg_must(23);
    /// ```
    #[inline]
    pub fn with_arg_must<T>(mut self, value: T) -> Self
    where
        T: Serialize,
    {
        self.push_must(value);

        self
    }

    /// Insert a named argument.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the serialization fails.
    pub fn insert<S, T>(&mut self, key: S, value: T) -> Result<(), HostError>
    where
        S: Into<String>,
        T: Serialize,
    {
        let value = to_value(value)
            .map_err(|error| HostError::build(format!("argument is unserializable: {error}")))?;
        self.named.insert(key.into(), value);

        Ok(())
    }

    /// Insert a named argument.
    ///
    /// # Panics
    ///
    /// Panics if the serialization fails.
    #[inline]
    pub fn insert_must<S, T>(&mut self, key: S, value: T)
    where
        S: Into<String>,
        T: Serialize,
    {
        self.named
            .insert(key.into(), to_value(value).expect("argument should serialize"));
    }

    /// Insert a named argument.
    ///
    /// Returns the `Args`, so additional methods may be chained.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the serialization fails.
    pub fn with<S, T>(mut self, key: S, value: T) -> Result<Self, HostError>
    where
        S: Into<String>,
        T: Serialize,
    {
        self.insert(key, value)?;

        Ok(self)
    }

    /// Insert a named argument.
    ///
    /// Returns the `Args`, so additional methods may be chained.
    ///
    /// # Panics
    ///
    /// Panics if the serialization fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use symplate::Args;
    ///
    /// let args = Args::new().with_must("name", "taylor");
    /// ```
    #[inline]
    pub fn with_must<S, T>(mut self, key: S, value: T) -> Self
    where
        S: Into<String>,
        T: Serialize,
    {
        self.insert_must(key, value);

        self
    }

    /// Return the positional arguments in insertion order.
    #[inline]
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// Return the named arguments.
    #[inline]
    pub fn named(&self) -> &HashMap<String, Value> {
        &self.named
    }
}

#[cfg(test)]
mod tests {
    use super::Args;
    use serde_json::json;

    #[test]
    fn test_push_keeps_order() {
        let mut args = Args::new();
        args.push_must("one");
        args.push_must(2);

        assert_eq!(args.positional(), [json!("one"), json!(2)]);
    }

    #[test]
    fn test_insert_named() {
        let args = Args::new().with_must("name", "taylor");

        assert_eq!(args.named().get("name"), Some(&json!("taylor")));
    }

    #[test]
    fn test_fluent_mixed() {
        let args = Args::new().with_arg_must(1).with_must("two", 2.5);

        assert_eq!(args.positional().len(), 1);
        assert_eq!(args.named().get("two"), Some(&json!(2.5)));
    }
}
