//! Request parameter bag
//!
//! Form (POST) and query (GET) parameters are passed explicitly to the
//! `from_post`/`from_get` constructors instead of being read from ambient state.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use crate::error::ValueError;

/// One parameter: a single value or a repeated one (`tags[]=a&tags[]=b`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    Many(Vec<String>),
}

/// Which half of the bag a lookup reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    Form,
    Query,
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSource::Form => write!(f, "POST"),
            ParamSource::Query => write!(f, "GET"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequestParams {
    #[serde(default)]
    pub form: HashMap<String, ParamValue>,
    #[serde(default)]
    pub query: HashMap<String, ParamValue>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form(mut self, name: &str, value: &str) -> Self {
        self.form
            .insert(name.to_string(), ParamValue::Single(value.to_string()));
        self
    }

    pub fn with_form_list(mut self, name: &str, values: &[&str]) -> Self {
        self.form.insert(
            name.to_string(),
            ParamValue::Many(values.iter().map(|v| v.to_string()).collect()),
        );
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query
            .insert(name.to_string(), ParamValue::Single(value.to_string()));
        self
    }

    pub fn with_query_list(mut self, name: &str, values: &[&str]) -> Self {
        self.query.insert(
            name.to_string(),
            ParamValue::Many(values.iter().map(|v| v.to_string()).collect()),
        );
        self
    }

    fn bag(&self, source: ParamSource) -> &HashMap<String, ParamValue> {
        match source {
            ParamSource::Form => &self.form,
            ParamSource::Query => &self.query,
        }
    }

    /// Look up `identifier`, failing when it is empty or required but absent.
    pub fn lookup(
        &self,
        source: ParamSource,
        type_name: &'static str,
        identifier: &str,
        required: bool,
    ) -> Result<Option<&ParamValue>, ValueError> {
        if identifier.is_empty() {
            return Err(ValueError::identifier(type_name, "identifier is empty"));
        }
        let value = self.bag(source).get(identifier);
        if value.is_none() && required {
            return Err(ValueError::identifier(
                type_name,
                format!("identifier `{identifier}` is not present in {source} data"),
            ));
        }
        Ok(value)
    }

    /// Single-valued lookup. A repeated parameter does not count as a single value.
    pub fn single(
        &self,
        source: ParamSource,
        type_name: &'static str,
        identifier: &str,
        required: bool,
    ) -> Result<Option<&str>, ValueError> {
        Ok(
            match self.lookup(source, type_name, identifier, required)? {
                Some(ParamValue::Single(value)) => Some(value.as_str()),
                _ => None,
            },
        )
    }

    /// Multi-valued lookup. A single value is read as a one-element list.
    pub fn many(
        &self,
        source: ParamSource,
        type_name: &'static str,
        identifier: &str,
        required: bool,
    ) -> Result<Option<Vec<&str>>, ValueError> {
        Ok(self
            .lookup(source, type_name, identifier, required)?
            .map(|value| match value {
                ParamValue::Single(value) => vec![value.as_str()],
                ParamValue::Many(values) => values.iter().map(String::as_str).collect(),
            }))
    }
}
