//! Primary Key Module
//!
//! Key kinds and key generation, resolved once per repository.

use std::fmt;
use std::hash::Hash;

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::error::{RepositoryError, Result};

// == Key Kind ==
/// Closed set of primary key shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Int32,
    Int64,
    UInt32,
    UInt64,
    /// Text keys are generated as UUID strings.
    Text,
    Uuid,
    /// Tuples of other keys; never generated.
    Compound,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyKind::Int32 => "i32",
            KeyKind::Int64 => "i64",
            KeyKind::UInt32 => "u32",
            KeyKind::UInt64 => "u64",
            KeyKind::Text => "string",
            KeyKind::Uuid => "uuid",
            KeyKind::Compound => "compound",
        };
        f.write_str(name)
    }
}

// == Entity Key ==
/// A primary key type usable by repositories and cache keys.
pub trait EntityKey:
    Clone + Ord + Hash + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn kind() -> KeyKind;

    /// Name used in the cache key namespace; compound keys join their parts.
    fn type_name() -> String {
        Self::kind().to_string()
    }

    /// Whether the key still holds its "not assigned" value.
    fn is_unset(&self) -> bool;

    /// Position of an integer key in its sequence.
    fn sequence(&self) -> Option<u64> {
        None
    }

    fn from_sequence(_n: u64) -> Option<Self> {
        None
    }

    fn from_uuid(_id: Uuid) -> Option<Self> {
        None
    }
}

macro_rules! integer_key {
    ($ty:ty, $kind:ident) => {
        impl EntityKey for $ty {
            fn kind() -> KeyKind {
                KeyKind::$kind
            }

            fn is_unset(&self) -> bool {
                *self == 0
            }

            fn sequence(&self) -> Option<u64> {
                u64::try_from(*self).ok()
            }

            fn from_sequence(n: u64) -> Option<Self> {
                <$ty>::try_from(n).ok()
            }
        }
    };
}

integer_key!(i32, Int32);
integer_key!(i64, Int64);
integer_key!(u32, UInt32);
integer_key!(u64, UInt64);

impl EntityKey for String {
    fn kind() -> KeyKind {
        KeyKind::Text
    }

    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn from_uuid(id: Uuid) -> Option<Self> {
        Some(id.to_string())
    }
}

impl EntityKey for Uuid {
    fn kind() -> KeyKind {
        KeyKind::Uuid
    }

    fn is_unset(&self) -> bool {
        self.is_nil()
    }

    fn from_uuid(id: Uuid) -> Option<Self> {
        Some(id)
    }
}

impl<A: EntityKey, B: EntityKey> EntityKey for (A, B) {
    fn kind() -> KeyKind {
        KeyKind::Compound
    }

    fn type_name() -> String {
        format!("{}+{}", A::type_name(), B::type_name())
    }

    fn is_unset(&self) -> bool {
        self.0.is_unset() || self.1.is_unset()
    }
}

impl<A: EntityKey, B: EntityKey, C: EntityKey> EntityKey for (A, B, C) {
    fn kind() -> KeyKind {
        KeyKind::Compound
    }

    fn type_name() -> String {
        format!("{}+{}+{}", A::type_name(), B::type_name(), C::type_name())
    }

    fn is_unset(&self) -> bool {
        self.0.is_unset() || self.1.is_unset() || self.2.is_unset()
    }
}

// == Key Generator ==
/// How new keys are produced for one key kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGenerator {
    /// Highest existing key plus one.
    Sequential,
    /// Fresh random UUID.
    Random,
    /// The caller must supply the key.
    Manual(KeyKind),
}

impl KeyGenerator {
    pub fn for_kind(kind: KeyKind) -> Self {
        match kind {
            KeyKind::Int32 | KeyKind::Int64 | KeyKind::UInt32 | KeyKind::UInt64 => {
                KeyGenerator::Sequential
            }
            KeyKind::Text | KeyKind::Uuid => KeyGenerator::Random,
            KeyKind::Compound => KeyGenerator::Manual(kind),
        }
    }

    /// # Arguments
    /// * `last` - Highest key currently stored, if any
    pub fn next_key<K: EntityKey>(&self, last: Option<&K>) -> Result<K> {
        match self {
            KeyGenerator::Sequential => {
                let next = last
                    .and_then(|k| k.sequence())
                    .unwrap_or(0)
                    .checked_add(1)
                    .and_then(K::from_sequence);
                next.ok_or_else(|| {
                    RepositoryError::UnsupportedKey(format!("{} key space exhausted", K::kind()))
                })
            }
            KeyGenerator::Random => K::from_uuid(Uuid::new_v4()).ok_or_else(|| {
                RepositoryError::UnsupportedKey(format!("{} keys cannot hold a UUID", K::kind()))
            }),
            KeyGenerator::Manual(kind) => Err(RepositoryError::UnsupportedKey(format!(
                "{} keys cannot be generated and must be set before add",
                kind
            ))),
        }
    }
}
