// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Produced and requested values.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{TargetSpecification, ValueProperties};

/// A value a node produces or consumes: name, target and resolved properties.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ValueSpecification {
    value_name: String,
    target: TargetSpecification,
    properties: ValueProperties,
}

impl ValueSpecification {
    /// Creates a specification.
    pub fn new(
        value_name: impl Into<String>,
        target: TargetSpecification,
        properties: ValueProperties,
    ) -> Self {
        Self {
            value_name: value_name.into(),
            target,
            properties,
        }
    }

    /// Value name (for example `PresentValue`).
    pub fn value_name(&self) -> &str {
        &self.value_name
    }

    /// Target the value concerns.
    pub fn target(&self) -> &TargetSpecification {
        &self.target
    }

    /// Resolved properties.
    pub fn properties(&self) -> &ValueProperties {
        &self.properties
    }

    /// Returns `true` if this specification can serve `requirement`.
    pub fn satisfies(&self, requirement: &ValueRequirement) -> bool {
        self.value_name == requirement.value_name
            && self.target == requirement.target
            && requirement.constraints.is_satisfied_by(&self.properties)
    }
}

impl fmt::Display for ValueSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.value_name, self.target)
    }
}

/// A requested value: name, target and property constraints.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ValueRequirement {
    value_name: String,
    target: TargetSpecification,
    constraints: ValueProperties,
}

impl ValueRequirement {
    /// Creates a requirement with explicit constraints.
    pub fn new(
        value_name: impl Into<String>,
        target: TargetSpecification,
        constraints: ValueProperties,
    ) -> Self {
        Self {
            value_name: value_name.into(),
            target,
            constraints,
        }
    }

    /// Creates an unconstrained requirement.
    pub fn unconstrained(value_name: impl Into<String>, target: TargetSpecification) -> Self {
        Self::new(value_name, target, ValueProperties::none())
    }

    /// Value name.
    pub fn value_name(&self) -> &str {
        &self.value_name
    }

    /// Target the value concerns.
    pub fn target(&self) -> &TargetSpecification {
        &self.target
    }

    /// Property constraints.
    pub fn constraints(&self) -> &ValueProperties {
        &self.constraints
    }
}

impl fmt::Display for ValueRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.value_name, self.target)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{property_names, UniqueId};

    fn x() -> TargetSpecification {
        TargetSpecification::primitive(UniqueId::of("Test", "X"))
    }

    #[test]
    fn specification_satisfies_matching_requirement() {
        let spec = ValueSpecification::new(
            "0",
            x(),
            ValueProperties::with(property_names::FUNCTION, "Foo0"),
        );
        assert!(spec.satisfies(&ValueRequirement::unconstrained("0", x())));
        assert!(!spec.satisfies(&ValueRequirement::unconstrained("1", x())));
        assert!(!spec.satisfies(&ValueRequirement::new(
            "0",
            x(),
            ValueProperties::with(property_names::FUNCTION, "Bar"),
        )));
    }

    #[test]
    fn cbor_round_trip_preserves_equality() {
        let spec = ValueSpecification::new(
            "1",
            x(),
            ValueProperties::builder()
                .with(property_names::FUNCTION, "Bar")
                .with(property_names::CURRENCY, "USD")
                .build(),
        );
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&spec, &mut bytes).unwrap();
        let back: ValueSpecification = ciborium::de::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn json_shape_is_stable() {
        let req = ValueRequirement::unconstrained("0", x());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["value_name"], "0");
        assert_eq!(json["target"]["kind"], "Primitive");
    }
}
