//! # Migration Definitions
//!
//! A revision is one node of a singly-linked chain: it names its predecessor
//! (`down_revision`), or `None` for the root. The chain is stored as a flat
//! static slice in any order; [`MigrationChain::ordered`] walks the links from
//! the root to the head and rejects anything that is not a single straight line.
//!
//! ## Versions
//!
//! Refinery needs integer versions. A revision's version is its 1-based
//! position in the walked chain, so the chain must only ever be appended to.

use std::collections::{HashMap, HashSet};

use super::MigrationError;

/// One revision of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    /// Revision identifier (e.g. `b5c9e2d7f1a3`)
    pub id: &'static str,
    /// Predecessor identifier, `None` for the root
    pub down_revision: Option<&'static str>,
    /// Human-readable summary
    pub message: &'static str,
    /// Forward SQL
    pub upgrade_sql: &'static str,
    /// Reverse SQL
    pub downgrade_sql: &'static str,
}

impl Revision {
    /// Create a revision with an empty downgrade
    pub const fn new(
        id: &'static str,
        down_revision: Option<&'static str>,
        message: &'static str,
        upgrade_sql: &'static str,
    ) -> Self {
        Self {
            id,
            down_revision,
            message,
            upgrade_sql,
            downgrade_sql: "",
        }
    }

    /// Set the reverse SQL
    pub const fn with_downgrade(mut self, downgrade_sql: &'static str) -> Self {
        self.downgrade_sql = downgrade_sql;
        self
    }

    pub fn is_root(&self) -> bool {
        self.down_revision.is_none()
    }
}

/// A chain of revisions (one per store)
#[derive(Debug)]
pub struct MigrationChain {
    /// Store name, used in logs
    pub name: &'static str,
    /// Revisions in any order; the links define the order
    pub revisions: &'static [Revision],
}

impl MigrationChain {
    pub const fn new(name: &'static str, revisions: &'static [Revision]) -> Self {
        Self { name, revisions }
    }

    /// Walk the chain from the root to the head.
    ///
    /// Fails when there is not exactly one root, when a predecessor is
    /// unknown, when two revisions share a predecessor, when an id repeats, or
    /// when some revision cannot be reached from the root.
    pub fn ordered(&self) -> Result<Vec<&'static Revision>, MigrationError> {
        let mut ids = HashSet::new();
        for revision in self.revisions {
            if !ids.insert(revision.id) {
                return Err(MigrationError::InvalidChain(format!(
                    "{}: duplicate revision id '{}'",
                    self.name, revision.id
                )));
            }
        }

        let roots: Vec<&Revision> = self.revisions.iter().filter(|r| r.is_root()).collect();
        let root = match roots.as_slice() {
            [root] => *root,
            [] => {
                return Err(MigrationError::InvalidChain(format!(
                    "{}: no root revision",
                    self.name
                )))
            }
            many => {
                return Err(MigrationError::InvalidChain(format!(
                    "{}: multiple root revisions: {}",
                    self.name,
                    many.iter().map(|r| r.id).collect::<Vec<_>>().join(", ")
                )))
            }
        };

        // predecessor -> successor
        let mut successors: HashMap<&str, &'static Revision> = HashMap::new();
        for revision in self.revisions {
            let Some(parent) = revision.down_revision else {
                continue;
            };
            if !ids.contains(parent) {
                return Err(MigrationError::InvalidChain(format!(
                    "{}: revision '{}' revises unknown revision '{}'",
                    self.name, revision.id, parent
                )));
            }
            if let Some(existing) = successors.insert(parent, revision) {
                return Err(MigrationError::InvalidChain(format!(
                    "{}: branch at '{}' ('{}' and '{}')",
                    self.name, parent, existing.id, revision.id
                )));
            }
        }

        let mut ordered = Vec::with_capacity(self.revisions.len());
        let mut current = root;
        ordered.push(current);
        while let Some(next) = successors.get(current.id) {
            current = next;
            ordered.push(current);
        }

        if ordered.len() != self.revisions.len() {
            return Err(MigrationError::InvalidChain(format!(
                "{}: {} revision(s) unreachable from root '{}'",
                self.name,
                self.revisions.len() - ordered.len(),
                root.id
            )));
        }

        Ok(ordered)
    }

    /// Identifier of the most recent revision
    pub fn head(&self) -> Result<&'static str, MigrationError> {
        let ordered = self.ordered()?;
        ordered
            .last()
            .map(|r| r.id)
            .ok_or_else(|| MigrationError::InvalidChain(format!("{}: empty chain", self.name)))
    }

    /// 1-based chain position of a revision
    pub fn version_of(&self, id: &str) -> Result<i32, MigrationError> {
        self.ordered()?
            .iter()
            .position(|r| r.id == id)
            .map(|idx| idx as i32 + 1)
            .ok_or_else(|| MigrationError::UnknownRevision(id.to_string()))
    }

    pub const fn count(&self) -> usize {
        self.revisions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    static LINEAR: &[Revision] = &[
        // deliberately out of order
        Revision::new("c3", Some("b2"), "third", "SELECT 3;"),
        Revision::new("a1", None, "first", "SELECT 1;"),
        Revision::new("b2", Some("a1"), "second", "SELECT 2;"),
    ];

    #[test]
    fn test_ordered_follows_links() {
        let chain = MigrationChain::new("test", LINEAR);
        let ids: Vec<&str> = chain.ordered().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a1", "b2", "c3"]);
        assert_eq!(chain.head().unwrap(), "c3");
        assert_eq!(chain.version_of("a1").unwrap(), 1);
        assert_eq!(chain.version_of("c3").unwrap(), 3);
        assert_matches!(
            chain.version_of("zz"),
            Err(MigrationError::UnknownRevision(_))
        );
    }

    #[test]
    fn test_rejects_two_roots() {
        static TWO_ROOTS: &[Revision] = &[
            Revision::new("a1", None, "first", ""),
            Revision::new("b2", None, "second", ""),
        ];
        let err = MigrationChain::new("test", TWO_ROOTS).ordered().unwrap_err();
        assert_matches!(err, MigrationError::InvalidChain(msg) if msg.contains("multiple root"));
    }

    #[test]
    fn test_rejects_branch() {
        static BRANCHED: &[Revision] = &[
            Revision::new("a1", None, "root", ""),
            Revision::new("b2", Some("a1"), "left", ""),
            Revision::new("c3", Some("a1"), "right", ""),
        ];
        let err = MigrationChain::new("test", BRANCHED).ordered().unwrap_err();
        assert_matches!(err, MigrationError::InvalidChain(msg) if msg.contains("branch"));
    }

    #[test]
    fn test_rejects_unknown_parent_and_cycles() {
        static DANGLING: &[Revision] = &[
            Revision::new("a1", None, "root", ""),
            Revision::new("b2", Some("missing"), "orphan", ""),
        ];
        assert_matches!(
            MigrationChain::new("test", DANGLING).ordered(),
            Err(MigrationError::InvalidChain(_))
        );

        // b2 <-> c3 loop never reaches the root's line
        static LOOPED: &[Revision] = &[
            Revision::new("a1", None, "root", ""),
            Revision::new("b2", Some("c3"), "loop-1", ""),
            Revision::new("c3", Some("b2"), "loop-2", ""),
        ];
        let err = MigrationChain::new("test", LOOPED).ordered().unwrap_err();
        assert_matches!(err, MigrationError::InvalidChain(msg) if msg.contains("unreachable"));
    }

    #[test]
    fn test_empty_chain_has_no_head() {
        static EMPTY: &[Revision] = &[];
        assert_matches!(
            MigrationChain::new("test", EMPTY).head(),
            Err(MigrationError::InvalidChain(_))
        );
    }
}
