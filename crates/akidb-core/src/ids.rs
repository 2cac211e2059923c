use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Raw identifier handed out by the global identifier allocator.
pub type UniqueId = i64;

/// Logical write-ordering lane identifier.
pub type ChannelId = i32;

macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(UniqueId);

        impl $name {
            /// Wraps a raw identifier obtained from the identifier allocator.
            #[must_use]
            pub const fn new(raw: UniqueId) -> Self {
                Self(raw)
            }

            /// Returns the raw integer value.
            #[must_use]
            pub const fn as_i64(&self) -> UniqueId {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl From<UniqueId> for $name {
            fn from(value: UniqueId) -> Self {
                Self(value)
            }
        }

        impl From<$name> for UniqueId {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_id!(CollectionId, "Unique identifier for a collection.");
define_id!(
    SegmentId,
    "Unique identifier for a storage segment. Never reused once allocated."
);
