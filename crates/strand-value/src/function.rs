// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Function identifiers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a compiled function in the function repository.
#[repr(transparent)]
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct FunctionId(String);

impl FunctionId {
    /// Wraps a function identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FunctionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A function together with the parameters it is applied with.
///
/// Two nodes apply "the same function" only when both the id and the
/// parameters match.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ParameterizedFunction {
    function: FunctionId,
    parameters: BTreeMap<String, String>,
}

impl ParameterizedFunction {
    /// A function with no parameters.
    pub fn new(function: impl Into<FunctionId>) -> Self {
        Self {
            function: function.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Adds a parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Function id.
    pub fn function(&self) -> &FunctionId {
        &self.function
    }

    /// Parameters in canonical order.
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }
}

impl From<FunctionId> for ParameterizedFunction {
    fn from(function: FunctionId) -> Self {
        Self::new(function)
    }
}

impl From<&str> for ParameterizedFunction {
    fn from(function: &str) -> Self {
        Self::new(function)
    }
}

impl fmt::Display for ParameterizedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.function)?;
        if !self.parameters.is_empty() {
            f.write_str("(")?;
            for (i, (k, v)) in self.parameters.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{k}={v}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_participate_in_equality() {
        let a = ParameterizedFunction::new("Foo").with_parameter("tenor", "1Y");
        let b = ParameterizedFunction::new("Foo").with_parameter("tenor", "2Y");
        assert_ne!(a, b);
        assert_eq!(a, ParameterizedFunction::new("Foo").with_parameter("tenor", "1Y"));
        assert_eq!(a.to_string(), "Foo(tenor=1Y)");
        assert_eq!(ParameterizedFunction::new("Foo").to_string(), "Foo");
    }
}
