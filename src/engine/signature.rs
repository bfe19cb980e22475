//! Declared task parameters and keyword-only argument binding.
use std::collections::BTreeSet;

use indexmap::IndexMap;

use super::value::ArgValue;
use crate::error::PlaybookError;

/// Whether a parameter's text is rendered before the task body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Text values are rendered through the template engine.
    Template,
    /// Values pass through untouched.
    Opaque,
}

/// One declared task parameter.
#[derive(Debug, Clone)]
pub struct Param {
    name: &'static str,
    kind: ParamKind,
    default: Option<ArgValue>,
}

impl Param {
    /// A required template-eligible parameter.
    #[must_use]
    pub const fn template(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Template,
            default: None,
        }
    }

    /// A required opaque parameter.
    #[must_use]
    pub const fn opaque(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Opaque,
            default: None,
        }
    }

    /// Give the parameter a default, making it optional.
    #[must_use]
    pub fn default(mut self, value: impl Into<ArgValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Make the parameter optional with no value.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.default = Some(ArgValue::Unset);
        self
    }

    /// Parameter name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Parameter kind.
    #[must_use]
    pub const fn kind(&self) -> ParamKind {
        self.kind
    }

    /// Whether the caller must supply this parameter.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// The ordered parameter list of a task.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<Param>,
}

/// Arguments bound to a [`Signature`].
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    /// Effective values in declaration order, defaults filled in.
    pub(crate) values: IndexMap<String, ArgValue>,
    /// Names the caller supplied explicitly.
    pub(crate) supplied: BTreeSet<String>,
}

impl Signature {
    /// Build a signature from its parameters, in declaration order.
    pub fn new(params: impl IntoIterator<Item = Param>) -> Self {
        Self {
            params: params.into_iter().collect(),
        }
    }

    /// Declared parameters.
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Look up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Bind call arguments to this signature.
    ///
    /// Every argument must be named; a `None` name is a positional argument.
    pub(crate) fn bind(
        &self,
        task: &str,
        args: Vec<(Option<String>, ArgValue)>,
    ) -> Result<Binding, PlaybookError> {
        let mut given: IndexMap<String, ArgValue> = IndexMap::new();
        for (name, value) in args {
            let Some(name) = name else {
                return Err(PlaybookError::UnqualifiedArgument {
                    task: task.to_string(),
                });
            };
            if self.get(&name).is_none() {
                return Err(PlaybookError::UnexpectedArgument {
                    task: task.to_string(),
                    name,
                });
            }
            given.insert(name, value);
        }

        let supplied = given.keys().cloned().collect();
        let mut values = IndexMap::with_capacity(self.params.len());
        for param in &self.params {
            let value = match given.shift_remove(param.name) {
                Some(value) => value,
                None => param
                    .default
                    .clone()
                    .ok_or_else(|| PlaybookError::MissingArgument {
                        task: task.to_string(),
                        name: param.name.to_string(),
                    })?,
            };
            values.insert(param.name.to_string(), value);
        }
        Ok(Binding { values, supplied })
    }
}
