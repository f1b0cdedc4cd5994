//! Validation for Kafka identifiers.
//!
//! Topic names and group IDs are validated locally before any remote call,
//! following Apache Kafka's naming conventions. Configuration *keys* are
//! deliberately not validated here: the broker is the sole authority on
//! valid configuration keys, and its error text is passed through verbatim.

use crate::error::{Error, Result};

/// Maximum length for topic names (Kafka's MAX_NAME_LENGTH).
pub const MAX_TOPIC_NAME_LENGTH: usize = 249;

/// Maximum length for consumer group IDs.
pub const MAX_GROUP_ID_LENGTH: usize = 255;

/// Validate a topic name.
///
/// Topic names must be non-empty, at most 249 characters, consist of ASCII
/// alphanumerics, `.`, `_`, and `-`, must not be `.` or `..`, and must not
/// start with a hyphen (which the underlying CLI would parse as a flag).
pub fn validate_topic_name(topic: &str) -> Result<()> {
    validate_identifier(topic, MAX_TOPIC_NAME_LENGTH, "topic name")
}

/// Validate a consumer group ID. Same character rules as topic names, with
/// Kafka's longer 255-character cap.
pub fn validate_group_id(group_id: &str) -> Result<()> {
    validate_identifier(group_id, MAX_GROUP_ID_LENGTH, "group ID")
}

fn validate_identifier(value: &str, max_len: usize, field: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidSpec(format!("{} cannot be empty", field)));
    }
    if value.len() > max_len {
        return Err(Error::InvalidSpec(format!(
            "{} is too long ({} chars, max {})",
            field,
            value.len(),
            max_len
        )));
    }
    // Reserved filesystem names; brokers store logs in directories named
    // after the topic.
    if value == "." || value == ".." {
        return Err(Error::InvalidSpec(format!(
            "{} cannot be '.' or '..'",
            field
        )));
    }
    if value.starts_with('-') {
        return Err(Error::InvalidSpec(format!(
            "{} '{}' cannot start with a hyphen",
            field, value
        )));
    }
    for (i, c) in value.chars().enumerate() {
        let ok = c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-';
        if !ok {
            return Err(Error::InvalidSpec(format!(
                "invalid character {:?} in {} at position {}; only ASCII \
                 letters, digits, '.', '_' and '-' are allowed",
                c, field, i
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_topic_names() {
        assert!(validate_topic_name("orders").is_ok());
        assert!(validate_topic_name("Orders_v1.prod-2").is_ok());
        assert!(validate_topic_name("__consumer_offsets").is_ok());
        assert!(validate_topic_name(&"a".repeat(MAX_TOPIC_NAME_LENGTH)).is_ok());
    }

    #[test]
    fn test_invalid_topic_names() {
        assert!(validate_topic_name("").is_err());
        assert!(validate_topic_name(".").is_err());
        assert!(validate_topic_name("..").is_err());
        assert!(validate_topic_name("-leading-hyphen").is_err());
        assert!(validate_topic_name("has space").is_err());
        assert!(validate_topic_name("path/name").is_err());
        assert!(validate_topic_name("topic\nname").is_err());
        assert!(validate_topic_name("café").is_err());
        assert!(validate_topic_name(&"a".repeat(MAX_TOPIC_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_invalid_names_are_invalid_spec_errors() {
        assert!(matches!(
            validate_topic_name("bad name"),
            Err(Error::InvalidSpec(_))
        ));
    }

    #[test]
    fn test_group_id_rules() {
        assert!(validate_group_id("my-consumer-group").is_ok());
        assert!(validate_group_id(&"g".repeat(MAX_GROUP_ID_LENGTH)).is_ok());
        assert!(validate_group_id(&"g".repeat(MAX_GROUP_ID_LENGTH + 1)).is_err());
        assert!(validate_group_id("group:name").is_err());
    }
}
