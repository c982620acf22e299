//! Type-safe row identifiers.
//!
//! Every persisted entity is keyed by a store-assigned `BIGSERIAL`. The
//! newtypes below keep a [`GigId`] from being passed where a [`RequestId`]
//! is expected, and give queue ordering a deterministic tie-breaker (row
//! ids grow with insertion order).

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw store identifier.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw store identifier.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a tenant (performer or venue account).
    TenantId
);

entity_id!(
    /// Identifier of a gig (one bounded live performance).
    GigId
);

entity_id!(
    /// Identifier of a song in a tenant's catalog.
    SongId
);

entity_id!(
    /// Identifier of a queued song request.
    RequestId
);

entity_id!(
    /// Identifier of a tip intent.
    TipIntentId
);
