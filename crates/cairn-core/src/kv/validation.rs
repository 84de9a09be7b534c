//! Validation functions for write commands.

use super::WriteCommand;
use crate::constants::MAX_BATCH_KEYS;
use crate::constants::MAX_KEY_SIZE;
use crate::constants::MAX_RANGE_BATCH;
use crate::constants::MAX_VALUE_SIZE;
use crate::error::KeyValueStoreError;

/// Validate a write command against fixed size limits.
pub fn validate_write_command(command: &WriteCommand) -> Result<(), KeyValueStoreError> {
    let check_key = |key: &str| {
        if key.is_empty() {
            return Err(KeyValueStoreError::EmptyKey);
        }
        let len = key.len();
        if len > MAX_KEY_SIZE as usize {
            Err(KeyValueStoreError::KeyTooLarge {
                size: len as u32,
                max: MAX_KEY_SIZE,
            })
        } else {
            Ok(())
        }
    };

    let check_value = |value: &str| {
        let len = value.len();
        if len > MAX_VALUE_SIZE as usize {
            Err(KeyValueStoreError::ValueTooLarge {
                size: len as u32,
                max: MAX_VALUE_SIZE,
            })
        } else {
            Ok(())
        }
    };

    let check_score = |name: &str, score: f64| {
        if score.is_nan() {
            Err(KeyValueStoreError::InvalidRequest {
                reason: format!("{name} must not be NaN"),
            })
        } else {
            Ok(())
        }
    };

    match command {
        WriteCommand::Set { key, value }
        | WriteCommand::SetWithTTL { key, value, .. }
        | WriteCommand::SetIfAbsent { key, value, .. } => {
            check_key(key)?;
            check_value(value)?;
        }
        WriteCommand::Delete { key } | WriteCommand::Take { key } | WriteCommand::Increment { key, .. } => {
            check_key(key)?;
        }
        WriteCommand::DeleteMulti { keys } => {
            if keys.len() > MAX_BATCH_KEYS as usize {
                return Err(KeyValueStoreError::BatchTooLarge {
                    size: keys.len() as u32,
                    max: MAX_BATCH_KEYS,
                });
            }
            for key in keys {
                check_key(key)?;
            }
        }
        WriteCommand::DeletePrefix { prefix } => {
            // An empty prefix would wipe the whole keyspace.
            if prefix.is_empty() {
                return Err(KeyValueStoreError::InvalidRequest {
                    reason: "delete prefix must not be empty".to_string(),
                });
            }
            check_key(prefix)?;
        }
        WriteCommand::CompareAndSwap {
            key,
            expected,
            new_value,
        } => {
            check_key(key)?;
            if let Some(exp) = expected {
                check_value(exp)?;
            }
            check_value(new_value)?;
        }
        WriteCommand::CompareAndDelete { key, expected } => {
            check_key(key)?;
            check_value(expected)?;
        }
        WriteCommand::ScoredAdd { key, member, score } => {
            check_key(key)?;
            check_value(member)?;
            check_score("score", *score)?;
        }
        WriteCommand::ScoredRemove { key, member } => {
            check_key(key)?;
            check_value(member)?;
        }
        WriteCommand::ScoredRange {
            key, min, max, limit, ..
        } => {
            check_key(key)?;
            check_score("min", *min)?;
            check_score("max", *max)?;
            if *limit == 0 || *limit > MAX_RANGE_BATCH {
                return Err(KeyValueStoreError::InvalidRequest {
                    reason: format!("range limit must be between 1 and {MAX_RANGE_BATCH}, got {limit}"),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_rejected() {
        let cmd = WriteCommand::Set {
            key: String::new(),
            value: "v".into(),
        };
        assert_eq!(validate_write_command(&cmd), Err(KeyValueStoreError::EmptyKey));
    }

    #[test]
    fn oversized_key_rejected() {
        let cmd = WriteCommand::Take {
            key: "k".repeat(MAX_KEY_SIZE as usize + 1),
        };
        assert!(matches!(validate_write_command(&cmd), Err(KeyValueStoreError::KeyTooLarge { .. })));
    }

    #[test]
    fn oversized_value_rejected() {
        let cmd = WriteCommand::SetIfAbsent {
            key: "k".into(),
            value: "v".repeat(MAX_VALUE_SIZE as usize + 1),
            ttl_ms: None,
        };
        assert!(matches!(validate_write_command(&cmd), Err(KeyValueStoreError::ValueTooLarge { .. })));
    }

    #[test]
    fn empty_delete_prefix_rejected() {
        let cmd = WriteCommand::DeletePrefix { prefix: String::new() };
        assert!(matches!(validate_write_command(&cmd), Err(KeyValueStoreError::InvalidRequest { .. })));
    }

    #[test]
    fn nan_scores_rejected() {
        let add = WriteCommand::ScoredAdd {
            key: "z".into(),
            member: "m".into(),
            score: f64::NAN,
        };
        assert!(validate_write_command(&add).is_err());

        let range = WriteCommand::ScoredRange {
            key: "z".into(),
            min: f64::NEG_INFINITY,
            max: f64::NAN,
            limit: 1,
            remove: false,
        };
        assert!(validate_write_command(&range).is_err());
    }

    #[test]
    fn infinite_range_bounds_allowed() {
        let range = WriteCommand::ScoredRange {
            key: "z".into(),
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            limit: MAX_RANGE_BATCH,
            remove: true,
        };
        assert!(validate_write_command(&range).is_ok());
    }

    #[test]
    fn range_limit_bounds() {
        let zero = WriteCommand::ScoredRange {
            key: "z".into(),
            min: 0.0,
            max: 1.0,
            limit: 0,
            remove: false,
        };
        assert!(validate_write_command(&zero).is_err());

        let too_many = WriteCommand::ScoredRange {
            key: "z".into(),
            min: 0.0,
            max: 1.0,
            limit: MAX_RANGE_BATCH + 1,
            remove: false,
        };
        assert!(validate_write_command(&too_many).is_err());
    }

    #[test]
    fn batch_too_large_rejected() {
        let keys = (0..=MAX_BATCH_KEYS).map(|i| format!("k{i}")).collect();
        let cmd = WriteCommand::DeleteMulti { keys };
        assert!(matches!(validate_write_command(&cmd), Err(KeyValueStoreError::BatchTooLarge { .. })));
    }
}
