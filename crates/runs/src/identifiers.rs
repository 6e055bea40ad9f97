//! Newtype domain identifiers.
//!
//! Every concept with an identity is a distinct newtype wrapping a primitive,
//! so a [`RunId`] can never be confused with some other GitHub integer and a
//! [`RepositoryName`] can never be passed where a [`WorkflowName`] is expected.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (GitHub-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

u64_id! {
    /// Identifies one workflow run.
    ///
    /// Unique per run within a repository; stable across every status the run
    /// passes through.
    RunId
}

string_id! {
    /// Identifies a GitHub repository in `"owner/repo"` format.
    ///
    /// This is the partition key for run-state tracking and the value of the
    /// `repository` metric label.
    RepositoryName
}

impl RepositoryName {
    /// Returns the part after the owner, e.g. `"widgets"` for `"acme/widgets"`.
    ///
    /// Names without an owner segment are returned unchanged.
    pub fn short_name(&self) -> &str {
        self.0
            .split_once('/')
            .map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Returns `true` if `entry` names this repository, either as the full
    /// `"owner/repo"` name or as the bare repository name.
    pub fn matches(&self, entry: &str) -> bool {
        let entry = entry.trim();
        if entry.contains('/') {
            entry.eq_ignore_ascii_case(self.as_str())
        } else {
            entry.eq_ignore_ascii_case(self.short_name())
        }
    }
}

string_id! {
    /// The logical workflow name of a run (e.g. `"build"`).
    ///
    /// Not unique: every run of the same workflow shares it.
    WorkflowName
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_names_are_rejected() {
        assert!(RepositoryName::new("").is_none());
        assert!(WorkflowName::new(String::new()).is_none());
    }

    #[test]
    fn short_name_strips_owner() {
        let repo = RepositoryName::new("acme/widgets").unwrap();
        assert_eq!(repo.short_name(), "widgets");

        let bare = RepositoryName::new("widgets").unwrap();
        assert_eq!(bare.short_name(), "widgets");
    }

    #[test]
    fn allow_list_entries_match_full_or_bare_names() {
        let repo = RepositoryName::new("acme/widgets").unwrap();
        assert!(repo.matches("acme/widgets"));
        assert!(repo.matches(" Widgets "));
        assert!(!repo.matches("other/widgets"));
        assert!(!repo.matches("gadgets"));
    }
}
