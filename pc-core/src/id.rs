//! Typed identifiers used across the compiler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers prevent mixing up executions, tools, and arbitrary
/// strings. These are just strings underneath — no UUID enforcement,
/// no format requirement.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to String.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(
    ExecutionId,
    "Unique identifier for a single compiler execution (one COM instance)."
);
typed_id!(
    ToolName,
    "Name under which a tool is registered in the external tool store."
);

/// A dense, arena-local index for a fiber.
///
/// Stable only within one [`FiberArena`](https://docs.rs/pc-reconciler) —
/// it is not a globally unique identifier and must not be persisted
/// across process restarts without the surrounding hydration snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FiberId(pub u32);

impl FiberId {
    /// The id reserved for "no fiber" (used for null parent/sibling links).
    pub const NONE: FiberId = FiberId(u32::MAX);

    /// Whether this is the `NONE` sentinel.
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "fiber#none")
        } else {
            write!(f, "fiber#{}", self.0)
        }
    }
}

impl Default for FiberId {
    fn default() -> Self {
        Self::NONE
    }
}
