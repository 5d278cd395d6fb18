//! Allow-list policy.
//!
//! Decides whether the application currently in the foreground may stay there
//! while a session is active. Everything here is pure: the list is plain data
//! and [`decide`] has no state of its own.

use serde::{Deserialize, Serialize};

/// Maximum number of allow-list slots a user can fill.
pub const MAX_ALLOW_LIST_SLOTS: usize = 6;

/// Opaque application identifier reported by the host (a package name on
/// Android).
pub type AppId = String;

/// Ordered, bounded set of allow-listed application identifiers.
///
/// Order is kept for display only; matching ignores it. Empty identifiers and
/// duplicates are never stored, and the list never grows past
/// [`MAX_ALLOW_LIST_SLOTS`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList {
    entries: Vec<AppId>,
}

impl AllowList {
    /// Create an empty allow-list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an allow-list from persisted slots.
    ///
    /// Empty slots are skipped, so slot gaps do not shift matching behavior.
    pub fn from_slots<I, S>(slots: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let mut list = Self::new();
        for id in slots.into_iter().flatten() {
            list.insert(id);
        }
        list
    }

    /// Build an allow-list from identifiers.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_slots(ids.into_iter().map(Some))
    }

    /// Insert an identifier.
    ///
    /// Returns `false` if the identifier is empty, already present, or the
    /// list is full.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if id.is_empty() || self.contains(&id) || self.entries.len() >= MAX_ALLOW_LIST_SLOTS {
            return false;
        }
        self.entries.push(id);
        true
    }

    /// Case-sensitive exact membership check.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry == id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no application is allow-listed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in display order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

/// Outcome of evaluating one foreground application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Application may stay in front.
    Allow,
    /// Application must be covered by the blocking surface.
    Block,
    /// Host could not resolve the application.
    Indeterminate,
}

/// How an [`Decision::Indeterminate`] result is handled.
///
/// Hosts disagree on whether a missing identifier means "something unknown is
/// in front" or "transient lookup failure", so this is configuration rather
/// than a fixed rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedDisposition {
    /// Leave the presentation exactly as it is.
    #[default]
    Keep,
    /// Treat as allowed (release the presentation).
    Allow,
    /// Treat as blocked (show the presentation).
    Block,
}

/// What the controller does with the presentation after a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Release the presentation.
    Allow,
    /// Acquire and raise the presentation.
    Block,
    /// Do not touch the presentation.
    Keep,
}

impl UnresolvedDisposition {
    /// Map a policy decision to the controller's verdict.
    pub fn resolve(self, decision: Decision) -> Verdict {
        match decision {
            Decision::Allow => Verdict::Allow,
            Decision::Block => Verdict::Block,
            Decision::Indeterminate => match self {
                Self::Keep => Verdict::Keep,
                Self::Allow => Verdict::Allow,
                Self::Block => Verdict::Block,
            },
        }
    }
}

/// Decide whether `app_id` may stay in the foreground.
///
/// The engine's own identifier is always allowed, whatever the list holds: the
/// blocking surface lives in that process and must never block itself. An
/// empty identifier is treated the same as a missing one.
pub fn decide(app_id: Option<&str>, allow_list: &AllowList, self_id: &str) -> Decision {
    match app_id {
        None | Some("") => Decision::Indeterminate,
        Some(id) if id == self_id => Decision::Allow,
        Some(id) if allow_list.contains(id) => Decision::Allow,
        Some(_) => Decision::Block,
    }
}
