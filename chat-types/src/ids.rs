//! Identity types for chatsync.
//!
//! All three ids are opaque strings. The REST backend issues numeric ids,
//! so decoding accepts either a JSON string or a JSON integer.

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Domain tag mixed into direct conversation ids.
const DIRECT_CONVERSATION_TAG: &[u8] = b"chatsync-direct-v1";

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

/// Deserialize an id that may arrive as a string or an integer.
pub(crate) fn opaque_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    })
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing id string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True if the id is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                opaque_string(deserializer).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// A stable identity. Every entity references participants by this id only.
    UserId
);

opaque_id!(
    /// A message identifier.
    ///
    /// Locally composed messages get a UUID v4; the id is final once assigned.
    MessageId
);

opaque_id!(
    /// A conversation identifier.
    ConversationId
);

impl MessageId {
    /// Generate a new locally unique message id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl ConversationId {
    /// Derive the id of the 1:1 conversation between `a` and `b`.
    ///
    /// Commutative: `direct(a, b) == direct(b, a)`. The lower id is
    /// length-prefixed so distinct pairs never collide through concatenation.
    pub fn direct(a: &UserId, b: &UserId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut hasher = Sha256::new();
        hasher.update(DIRECT_CONVERSATION_TAG);
        hasher.update((lo.0.len() as u64).to_be_bytes());
        hasher.update(lo.0.as_bytes());
        hasher.update(hi.0.as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(format!("dm-{}", &digest[..32]))
    }
}
