// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Unique ids and computation targets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ValueError;

/// Separator between the components of a [`UniqueId`] in its textual form.
pub const UNIQUE_ID_SEPARATOR: char = '~';

/// Scheme-qualified identifier of a real-world object.
///
/// Textual form is `scheme~value` or `scheme~value~version`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct UniqueId {
    scheme: String,
    value: String,
    version: Option<String>,
}

impl UniqueId {
    /// Creates an unversioned id.
    pub fn of(scheme: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            value: value.into(),
            version: None,
        }
    }

    /// Creates a versioned id.
    pub fn versioned(
        scheme: impl Into<String>,
        value: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            value: value.into(),
            version: Some(version.into()),
        }
    }

    /// Parses the `scheme~value[~version]` form.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::MalformedUniqueId`] when the separator count is
    /// wrong and [`ValueError::EmptyComponent`] when any component is empty.
    pub fn parse(text: &str) -> Result<Self, ValueError> {
        let parts: Vec<&str> = text.split(UNIQUE_ID_SEPARATOR).collect();
        let (scheme, value, version) = match parts.as_slice() {
            [scheme, value] => (*scheme, *value, None),
            [scheme, value, version] => (*scheme, *value, Some(*version)),
            _ => return Err(ValueError::MalformedUniqueId(text.to_owned())),
        };
        for (component, part) in [("scheme", Some(scheme)), ("value", Some(value)), ("version", version)] {
            if part.is_some_and(str::is_empty) {
                return Err(ValueError::EmptyComponent {
                    component,
                    text: text.to_owned(),
                });
            }
        }
        Ok(Self {
            scheme: scheme.to_owned(),
            value: value.to_owned(),
            version: version.map(str::to_owned),
        })
    }

    /// Identifier scheme (for example `Test` or `ISIN`).
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Scheme-local value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Optional version component.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns the same id with the version stripped.
    pub fn object_id(&self) -> Self {
        Self::of(self.scheme.clone(), self.value.clone())
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{UNIQUE_ID_SEPARATOR}{}", self.scheme, self.value)?;
        if let Some(version) = &self.version {
            write!(f, "{UNIQUE_ID_SEPARATOR}{version}")?;
        }
        Ok(())
    }
}

/// Kind of object a computation target refers to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum TargetKind {
    /// No target; the computation is global.
    Null,
    /// A bare identifier with no further structure.
    Primitive,
    /// A tradable security.
    Security,
    /// A holding of a security.
    Position,
    /// A single trade.
    Trade,
    /// A node in a portfolio hierarchy.
    PortfolioNode,
}

/// Identifies the object a computation concerns (kind + unique id).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct TargetSpecification {
    kind: TargetKind,
    id: Option<UniqueId>,
}

impl TargetSpecification {
    /// Creates a target of `kind` identified by `id`.
    pub fn new(kind: TargetKind, id: UniqueId) -> Self {
        Self { kind, id: Some(id) }
    }

    /// Shorthand for a [`TargetKind::Primitive`] target.
    pub fn primitive(id: UniqueId) -> Self {
        Self::new(TargetKind::Primitive, id)
    }

    /// The null target.
    pub fn null() -> Self {
        Self {
            kind: TargetKind::Null,
            id: None,
        }
    }

    /// Target kind.
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Target id; `None` only for the null target.
    pub fn unique_id(&self) -> Option<&UniqueId> {
        self.id.as_ref()
    }

    /// Returns `true` for the null target.
    pub fn is_null(&self) -> bool {
        self.kind == TargetKind::Null
    }
}

impl fmt::Display for TargetSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{:?}[{id}]", self.kind),
            None => f.write_str("NULL"),
        }
    }
}
