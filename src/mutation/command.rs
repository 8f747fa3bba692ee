use crate::core::{GuardError, KeyType, Result};
use crate::mutation::record::CommandKind;
use crate::store::StoreClient;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A store command with its strongly-typed payload.
///
/// The ledger hands us `(CommandKind, JsonValue)`; parsing into this enum
/// happens once, and the match in [`MutationCommand::execute`] is exhaustive
/// so every command has a handler by construction. The only runtime failure
/// mode left is a malformed payload arriving from the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationCommand {
    Append { value: String },
    Del,
    Expire { seconds: i64 },
    Hset { fields: HashMap<String, String> },
    Lpush { value: String },
    Lset { index: i64, value: String },
    Rpush { value: String },
    Sadd { member: String },
    Set { value: String },
    Zadd { members: HashMap<String, f64> },
    Zincrby { amount: i64, member: String },
}

fn as_string(value: Option<&JsonValue>) -> Option<String> {
    match value {
        Some(JsonValue::String(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Integers proper, or strings that parse as one.
fn as_castable_int(value: Option<&JsonValue>) -> Option<i64> {
    match value {
        Some(JsonValue::Number(n)) => n.as_i64(),
        Some(JsonValue::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_string_map(value: Option<&JsonValue>) -> Option<HashMap<String, String>> {
    let JsonValue::Object(map) = value? else {
        return None;
    };
    map.iter()
        .map(|(k, v)| match v {
            JsonValue::String(s) => Some((k.clone(), s.clone())),
            _ => None,
        })
        .collect()
}

fn as_score_map(value: Option<&JsonValue>) -> Option<HashMap<String, f64>> {
    let JsonValue::Object(map) = value? else {
        return None;
    };
    map.iter()
        .map(|(k, v)| v.as_f64().map(|score| (k.clone(), score)))
        .collect()
}

fn field<'a>(value: Option<&'a JsonValue>, name: &str) -> Option<&'a JsonValue> {
    match value {
        Some(JsonValue::Object(map)) => map.get(name),
        _ => None,
    }
}

impl MutationCommand {
    /// Parse a loosely-typed ledger payload into a typed command.
    ///
    /// Any `(kind, value)` combination not in the dispatch table is an
    /// unsupported-command error.
    pub fn from_parts(kind: CommandKind, value: Option<&JsonValue>) -> Result<Self> {
        let unsupported = || {
            GuardError::UnsupportedCommand(format!(
                "{kind} with value {}",
                value
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "<none>".to_string())
            ))
        };

        let command = match kind {
            CommandKind::Append => Self::Append {
                value: as_string(value).ok_or_else(unsupported)?,
            },
            // DEL ignores whatever value was recorded
            CommandKind::Del => Self::Del,
            CommandKind::Expire => Self::Expire {
                seconds: as_castable_int(value).ok_or_else(unsupported)?,
            },
            CommandKind::Hset => Self::Hset {
                fields: as_string_map(value).ok_or_else(unsupported)?,
            },
            CommandKind::Lpush => Self::Lpush {
                value: as_string(value).ok_or_else(unsupported)?,
            },
            CommandKind::Lset => Self::Lset {
                index: as_castable_int(field(value, "index")).ok_or_else(unsupported)?,
                value: as_string(field(value, "value")).ok_or_else(unsupported)?,
            },
            CommandKind::Rpush => Self::Rpush {
                value: as_string(value).ok_or_else(unsupported)?,
            },
            CommandKind::Sadd => Self::Sadd {
                member: as_string(value).ok_or_else(unsupported)?,
            },
            CommandKind::Set => Self::Set {
                value: as_string(value).ok_or_else(unsupported)?,
            },
            CommandKind::Zadd => Self::Zadd {
                members: as_score_map(value).ok_or_else(unsupported)?,
            },
            CommandKind::Zincrby => Self::Zincrby {
                amount: as_castable_int(field(value, "amount")).ok_or_else(unsupported)?,
                member: as_string(field(value, "value")).ok_or_else(unsupported)?,
            },
        };

        Ok(command)
    }

    /// Run the command against the store.
    pub fn execute(&self, store: &dyn StoreClient, key: &str) -> Result<()> {
        match self {
            Self::Append { value } => store.append(key, value).map(|_| ()),
            Self::Del => store.del(key).map(|_| ()),
            Self::Expire { seconds } => store.expire(key, *seconds).map(|_| ()),
            Self::Hset { fields } => store.hset(key, fields),
            Self::Lpush { value } => store.lpush(key, value).map(|_| ()),
            Self::Lset { index, value } => store.lset(key, *index, value),
            Self::Rpush { value } => store.rpush(key, value).map(|_| ()),
            Self::Sadd { member } => store.sadd(key, member).map(|_| ()),
            Self::Set { value } => store.set(key, value, None),
            Self::Zadd { members } => store.zadd(key, members).map(|_| ()),
            Self::Zincrby { amount, member } => {
                store.zincrby(key, *amount as f64, member).map(|_| ())
            }
        }
    }
}

/// Creation-time validation, reproducing the authoring layer's rules.
///
/// SET/APPEND/SADD require a string value; EXPIRE requires a value castable
/// to an integer; SADD additionally requires that an existing target key is
/// a set, because SADD (unlike SET) cannot coerce the key's type. Everything
/// else is validated at apply time.
pub fn validate_mutation(
    store: &dyn StoreClient,
    key: &str,
    kind: CommandKind,
    value: Option<&JsonValue>,
) -> Result<()> {
    match kind {
        CommandKind::Set | CommandKind::Append | CommandKind::Sadd => {
            if as_string(value).is_none() {
                return Err(GuardError::Validation(format!(
                    "{kind} requires a string value"
                )));
            }
        }
        CommandKind::Expire => {
            if as_castable_int(value).is_none() {
                return Err(GuardError::Validation(
                    "EXPIRE requires a value castable to an integer".to_string(),
                ));
            }
        }
        _ => {}
    }

    if kind == CommandKind::Sadd {
        if let Some(existing) = store.key_type(key)? {
            if existing != KeyType::Set {
                return Err(GuardError::Validation(format!(
                    "SADD target '{key}' already exists with type {existing}"
                )));
            }
        }
    }

    Ok(())
}
