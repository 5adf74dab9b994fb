// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Full names
//!
//! The `path` module provides the `FullName` type, the containment address of
//! a task or a flow: the names of every enclosing flow followed by its own,
//! each one prefixed with `:`. The environment itself has the empty name, so
//! the default error task of an environment is `:error` and a task `a` in the
//! top level flow `f` is `:f:a`.
//!

use serde::{Deserialize, Serialize};

use std::fmt;

/// Hierarchical name of a task or flow.
///
/// ```ignore
/// use flow::FullName;
///
/// let name = FullName::from(":sales:import:reader");
/// assert_eq!(name.key(), "reader");
/// assert_eq!(name.parent().to_string(), ":sales:import");
/// assert_eq!(name.level(), 3);
/// let sibling = name.parent() / "writer";
/// assert_eq!(sibling.to_string(), ":sales:import:writer");
/// ```
#[derive(
    Clone, Default, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FullName(Vec<String>);

impl FullName {
    /// Name of the environment, the root of every other name.
    pub fn root() -> Self {
        FullName(Vec::new())
    }

    /// Name without the last segment. The root is its own parent.
    pub fn parent(&self) -> Self {
        let mut segments = self.0.clone();
        segments.pop();
        FullName(segments)
    }

    /// Last segment, empty for the root.
    pub fn key(&self) -> String {
        self.0.last().cloned().unwrap_or_default()
    }

    /// Number of segments.
    pub fn level(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether `self` strictly contains `other`.
    pub fn is_ancestor_of(&self, other: &FullName) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }
}

impl From<&str> for FullName {
    fn from(name: &str) -> Self {
        FullName(
            name.split(':')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }
}

impl From<String> for FullName {
    fn from(name: String) -> Self {
        FullName::from(name.as_str())
    }
}

impl From<&String> for FullName {
    fn from(name: &String) -> Self {
        FullName::from(name.as_str())
    }
}

impl std::ops::Div<&str> for FullName {
    type Output = FullName;

    fn div(self, rhs: &str) -> Self::Output {
        let mut segments = self.0;
        segments.extend(rhs.split(':').filter(|s| !s.is_empty()).map(str::to_owned));
        FullName(segments)
    }
}

impl std::ops::Div<&str> for &FullName {
    type Output = FullName;

    fn div(self, rhs: &str) -> Self::Output {
        self.clone() / rhs
    }
}

impl fmt::Display for FullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, ":{}", segment)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FullName({})", self)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn parse_empty_string() {
        let name = FullName::from("");
        assert!(name.is_root());
        assert_eq!(name.to_string(), "");
    }

    #[test]
    fn parse_three_deep() {
        let name = FullName::from(":acme:building:room");
        assert_eq!(name.segments(), &["acme", "building", "room"]);
        assert_eq!(name.level(), 3);
        assert_eq!(name.key(), "room");
    }

    #[test]
    fn parse_without_leading_separator() {
        assert_eq!(FullName::from("acme:room"), FullName::from(":acme:room"));
    }

    #[test]
    fn parent_at_root() {
        let name = FullName::from(":acme");
        assert!(name.parent().is_root());
        assert!(name.parent().parent().is_root());
    }

    #[test]
    fn test_relationships() {
        let name = FullName::from(":acme:building:room");
        let parent = name.parent();
        assert!(parent.is_ancestor_of(&name));
        assert!(FullName::root().is_ancestor_of(&name));
        assert!(!name.is_ancestor_of(&name));
        assert!(!name.is_ancestor_of(&parent));
        assert!(!FullName::from(":acme:room").is_ancestor_of(&name));
    }

    #[test]
    fn test_add_name() {
        let name = FullName::root() / "flow";
        let child = &name / "task";
        assert_eq!(child.to_string(), ":flow:task");
        assert_eq!(child.parent(), name);
        assert_eq!(child.level(), 2);
    }
}
