use std::time::Duration;

use crate::error::ConfigError;

/// A user-supplied duration, accepted in any of the shapes the registration
/// contract allows: a native [`Duration`], non-negative integer seconds, or
/// non-negative floating-point seconds.
#[derive(Debug, Clone, Copy)]
pub enum DurationInput {
    /// An already-constructed duration; passed through unchanged.
    Duration(Duration),
    /// A whole number of seconds.
    Seconds(u64),
    /// A fractional number of seconds.
    SecondsF64(f64),
}

impl From<Duration> for DurationInput {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

impl From<u64> for DurationInput {
    fn from(value: u64) -> Self {
        Self::Seconds(value)
    }
}

impl From<f64> for DurationInput {
    fn from(value: f64) -> Self {
        Self::SecondsF64(value)
    }
}

/// Normalize a [`DurationInput`] into a canonical [`Duration`].
///
/// Negative or non-finite floating-point inputs are rejected as a
/// configuration error; every other input is accepted.
pub fn parse_duration(input: impl Into<DurationInput>) -> Result<Duration, ConfigError> {
    match input.into() {
        DurationInput::Duration(d) => Ok(d),
        DurationInput::Seconds(secs) => Ok(Duration::from_secs(secs)),
        DurationInput::SecondsF64(secs) => {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ConfigError::InvalidDuration(format!(
                    "duration must be a non-negative, finite number of seconds, got {secs}"
                )));
            }
            Ok(Duration::from_secs_f64(secs))
        }
    }
}

/// Like [`parse_duration`], but accepts an absent input and returns `default`
/// in that case.
pub fn duration_or_default(
    input: Option<impl Into<DurationInput>>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match input {
        Some(input) => parse_duration(input),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_native_duration() {
        let d = parse_duration(Duration::from_millis(1500)).unwrap();
        assert_eq!(d, Duration::from_millis(1500));
    }

    #[test]
    fn accepts_integer_seconds() {
        assert_eq!(parse_duration(5u64).unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn accepts_zero() {
        assert_eq!(parse_duration(0u64).unwrap(), Duration::ZERO);
    }

    #[test]
    fn accepts_fractional_seconds() {
        let d = parse_duration(0.5f64).unwrap();
        assert_eq!(d, Duration::from_millis(500));
    }

    #[test]
    fn rejects_negative_seconds() {
        let err = parse_duration(-1.0f64).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration(_)));
    }

    #[test]
    fn rejects_nan() {
        let err = parse_duration(f64::NAN).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration(_)));
    }

    #[test]
    fn default_form_uses_default_when_absent() {
        let d = duration_or_default(None::<u64>, Duration::from_secs(7)).unwrap();
        assert_eq!(d, Duration::from_secs(7));
    }

    #[test]
    fn default_form_uses_input_when_present() {
        let d = duration_or_default(Some(3u64), Duration::from_secs(7)).unwrap();
        assert_eq!(d, Duration::from_secs(3));
    }
}
