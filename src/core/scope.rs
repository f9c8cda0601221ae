//! Severity scopes
//!
//! A [`Scope`] is a node in a tree of severity filters. A node either carries
//! an explicit level or inherits one from its ancestors. Inheritance is
//! resolved once, when the node is created: later changes to an ancestor are
//! only seen by nodes created after the change.
//!
//! ```
//! use rust_log_pipeline::{Scope, Severity};
//!
//! let root = Scope::root();
//! let early = Scope::create(Some(&root));
//! root.set_level(Severity::Warn);
//! let late = Scope::create(Some(&root));
//!
//! assert!(early.is_enabled(Severity::Info));
//! assert!(!late.is_enabled(Severity::Info));
//! assert!(late.is_enabled(Severity::Warn));
//! ```

use super::severity::Severity;
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};

/// Level used when neither a node nor any of its ancestors has one.
pub const DEFAULT_SEVERITY: Severity = Severity::Info;

#[derive(Debug, Clone, Copy, Default)]
struct NodeLevel {
    level: Option<Severity>,
    explicit: bool,
}

struct ScopeNode {
    parent: Weak<ScopeNode>,
    level: RwLock<NodeLevel>,
}

impl ScopeNode {
    fn level(&self) -> Option<Severity> {
        self.level.read().level
    }
}

/// Shared handle to a node of the scope tree.
///
/// Cloning the handle shares the node. Children hold only a weak reference to
/// their parent, so dropping a parent never invalidates a child.
#[derive(Clone)]
pub struct Scope {
    node: Arc<ScopeNode>,
}

impl Scope {
    /// Create a node below `parent`, or a root node when `parent` is `None`.
    pub fn create(parent: Option<&Scope>) -> Scope {
        let inherited = parent.and_then(|p| Self::resolve_from(&p.node));
        Scope {
            node: Arc::new(ScopeNode {
                parent: parent.map(|p| Arc::downgrade(&p.node)).unwrap_or_default(),
                level: RwLock::new(NodeLevel {
                    level: inherited,
                    explicit: false,
                }),
            }),
        }
    }

    pub fn root() -> Scope {
        Self::create(None)
    }

    /// Walk from `start` towards the root and return the first level found.
    fn resolve_from(start: &Arc<ScopeNode>) -> Option<Severity> {
        let mut current = Arc::clone(start);
        loop {
            if let Some(level) = current.level() {
                return Some(level);
            }
            match current.parent.upgrade() {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }

    /// Set an explicit level on this node.
    ///
    /// Existing descendants keep the level they resolved when they were
    /// created.
    pub fn set_level(&self, level: Severity) {
        *self.node.level.write() = NodeLevel {
            level: Some(level),
            explicit: true,
        };
    }

    /// Level this node filters with.
    pub fn effective_level(&self) -> Severity {
        self.node.level().unwrap_or(DEFAULT_SEVERITY)
    }

    /// Level set through [`Scope::set_level`], if any.
    pub fn explicit_level(&self) -> Option<Severity> {
        let level = *self.node.level.read();
        if level.explicit {
            level.level
        } else {
            None
        }
    }

    pub fn is_enabled(&self, wanted: Severity) -> bool {
        wanted <= self.effective_level()
    }

    pub fn parent(&self) -> Option<Scope> {
        self.node.parent.upgrade().map(|node| Scope { node })
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = *self.node.level.read();
        f.debug_struct("Scope")
            .field("level", &level.level)
            .field("explicit", &level.explicit)
            .field("has_parent", &(self.node.parent.strong_count() > 0))
            .finish()
    }
}

/// Check `wanted` against an optional scope; without one only `Info` and
/// more severe levels pass.
pub fn is_enabled(scope: Option<&Scope>, wanted: Severity) -> bool {
    match scope {
        Some(scope) => scope.is_enabled(wanted),
        None => wanted <= DEFAULT_SEVERITY,
    }
}
