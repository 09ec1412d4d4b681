//! Custom validation functions for configuration.

use validator::ValidationError;

/// Validate a `tracing` level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error", "off"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// Validate that a unit label is printable on a single line.
pub fn validate_unit_label(label: &str) -> Result<(), ValidationError> {
    if label.chars().any(char::is_control) {
        return Err(ValidationError::new("unit_label_has_control_chars"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels() {
        assert!(validate_log_level("INFO").is_ok());
        assert!(validate_log_level("verbose").is_err());
    }

    #[test]
    fn unit_labels() {
        assert!(validate_unit_label(" ms").is_ok());
        assert!(validate_unit_label("ms\n").is_err());
    }
}
