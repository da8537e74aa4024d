use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::subtask::Subtask;

/// Wildcard token accepted on input for [`Capability::Any`].
pub const WILDCARD_CAPABILITY: &str = "*";

/// What an agent declares it can work on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "values")]
pub enum Capability {
    /// Eligible for every subtask
    Any,
    /// Eligible for subtasks whose kind or full skill set is named here
    Named(BTreeSet<String>),
}

impl Default for Capability {
    fn default() -> Self {
        Self::Named(BTreeSet::new())
    }
}

impl Capability {
    /// Build a capability from declared tags. A `"*"` tag anywhere yields
    /// [`Capability::Any`]. Tags are trimmed and lowercased.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut named = BTreeSet::new();
        for tag in tags {
            let tag = tag.as_ref().trim().to_lowercase();
            if tag == WILDCARD_CAPABILITY {
                return Self::Any;
            }
            if !tag.is_empty() {
                named.insert(tag);
            }
        }
        Self::Named(named)
    }

    /// Whether an agent with this capability may run `subtask`.
    ///
    /// A named set matches when it contains the subtask's required type
    /// (its kind), or when the subtask lists skills and every one of them
    /// is named.
    pub fn permits(&self, subtask: &Subtask) -> bool {
        match self {
            Self::Any => true,
            Self::Named(tags) => {
                if tags.contains(subtask.required_type()) {
                    return true;
                }
                !subtask.skills_required.is_empty()
                    && subtask
                        .skills_required
                        .iter()
                        .all(|skill| tags.contains(&skill.to_lowercase()))
            }
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str(WILDCARD_CAPABILITY),
            Self::Named(tags) => {
                let joined: Vec<&str> = tags.iter().map(String::as_str).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

/// A registered executing agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Unique agent identifier
    pub id: String,

    /// Declared capability predicate
    pub capability: Capability,
}

impl AgentProfile {
    pub fn new(id: impl Into<String>, capability: Capability) -> Self {
        Self {
            id: id.into(),
            capability,
        }
    }

    /// Agent eligible for everything.
    pub fn any(id: impl Into<String>) -> Self {
        Self::new(id, Capability::Any)
    }

    /// Agent declaring capability tags; `"*"` maps to [`Capability::Any`].
    pub fn with_tags<I, S>(id: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(id, Capability::from_tags(tags))
    }

    pub fn can_run(&self, subtask: &Subtask) -> bool {
        self.capability.permits(subtask)
    }
}
