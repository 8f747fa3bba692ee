use crate::core::KeyType;
use std::collections::{HashMap, HashSet};

/// A value held under a store key.
///
/// Mirrors the Redis type system: every key is exactly one of these, and
/// most commands only operate on one variant (SET being the exception —
/// it overwrites whatever was there).
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Str(String),
    List(Vec<String>),
    Set(HashSet<String>),
    Hash(HashMap<String, String>),
    ZSet(HashMap<String, f64>),
}

impl StoreValue {
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Str(_) => KeyType::String,
            Self::List(_) => KeyType::List,
            Self::Set(_) => KeyType::Set,
            Self::Hash(_) => KeyType::Hash,
            Self::ZSet(_) => KeyType::ZSet,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.key_type().as_str()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Self::Str(_))
    }
}
