// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ordered value property maps.
//!
//! A property maps a name to a set of values. On a specification the set holds
//! the resolved values; on a requirement it holds the acceptable ones, and an
//! empty set is a wildcard ("any value, but the property must be present").
//!
//! Both levels are `BTree*` so iteration (and therefore serialization) order
//! is a function of content only.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Well-known property names.
pub mod property_names {
    /// Name of the function that produced (or must produce) the value.
    pub const FUNCTION: &str = "Function";
    /// Currency the value is expressed in.
    pub const CURRENCY: &str = "Currency";
}

/// Ordered name → value-set map.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ValueProperties {
    properties: BTreeMap<String, BTreeSet<String>>,
}

impl ValueProperties {
    /// The empty property map.
    pub fn none() -> Self {
        Self::default()
    }

    /// Starts a builder.
    pub fn builder() -> ValuePropertiesBuilder {
        ValuePropertiesBuilder::default()
    }

    /// Shorthand for a single-property map.
    pub fn with(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::builder().with(name, value).build()
    }

    /// Returns `true` if no property is defined.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Number of defined properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Values of `name`, if defined.
    pub fn values(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.properties.get(name)
    }

    /// Smallest value of `name` in canonical order, if any.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .and_then(|values| values.iter().next())
            .map(String::as_str)
    }

    /// Iterates properties in canonical (name) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns `true` when every constraint in `self` is met by `resolved`.
    ///
    /// A constraint with an empty value set only requires the property to be
    /// present in `resolved`; otherwise at least one of its values must be.
    pub fn is_satisfied_by(&self, resolved: &Self) -> bool {
        self.properties.iter().all(|(name, wanted)| {
            resolved.properties.get(name).is_some_and(|have| {
                wanted.is_empty() || have.is_empty() || !wanted.is_disjoint(have)
            })
        })
    }
}

/// Builder for [`ValueProperties`].
#[derive(Default, Debug)]
pub struct ValuePropertiesBuilder {
    properties: BTreeMap<String, BTreeSet<String>>,
}

impl ValuePropertiesBuilder {
    /// Adds `value` to the set for `name`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties
            .entry(name.into())
            .or_default()
            .insert(value.into());
        self
    }

    /// Defines `name` with an empty (wildcard) value set.
    pub fn with_any(mut self, name: impl Into<String>) -> Self {
        self.properties.entry(name.into()).or_default();
        self
    }

    /// Finishes the map.
    pub fn build(self) -> ValueProperties {
        ValueProperties {
            properties: self.properties,
        }
    }
}
