use std::fmt;

/// Errors raised where strict validation happens: device registration and
/// clock construction. Everything on the hot path fails silently instead.
#[derive(Debug, Clone, PartialEq)]
pub enum ClockError {
    /// The registration record is unusable (zero steps, empty id, missing
    /// `on_schedule`, non-positive tempo or multiplier).
    InvalidDeviceSpec { id: String, reason: String },
    /// A device with this id is already registered.
    DuplicateDevice(String),
    /// The clock configuration cannot guarantee that no step is missed
    /// between polls.
    InvalidConfig(String),
}

impl ClockError {
    pub fn invalid_spec(id: &str, reason: impl Into<String>) -> Self {
        ClockError::InvalidDeviceSpec {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockError::InvalidDeviceSpec { id, reason } => {
                write!(f, "Invalid device spec for '{}': {}", id, reason)
            }
            ClockError::DuplicateDevice(id) => write!(f, "Device '{}' is already registered", id),
            ClockError::InvalidConfig(reason) => write!(f, "Invalid clock config: {}", reason),
        }
    }
}

impl std::error::Error for ClockError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClockError::invalid_spec("tb303", "step_count must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid device spec for 'tb303': step_count must be positive"
        );
        assert_eq!(
            ClockError::DuplicateDevice("tr808".to_string()).to_string(),
            "Device 'tr808' is already registered"
        );
    }
}
