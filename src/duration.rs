//! Duration-string parsing ("10ms", "1.5h", "30s", ...).
//!
//! An empty string means "use the caller's default". Everything else is
//! delegated to `humantime`, which already accepts the ns/us/ms/s/m/h
//! suffix notation called for in spec.md §6.

use std::time::Duration;

use crate::error::TunerError;

/// Parse a duration string, falling back to `default` when `raw` is empty.
pub fn parse_or_default(raw: &str, default: Duration) -> Result<Duration, TunerError> {
    if raw.is_empty() {
        return Ok(default);
    }
    humantime::parse_duration(raw).map_err(|e| TunerError::InvalidInterval(format!("{raw}: {e}")))
}

/// Same as [`parse_or_default`] but tags validation failures as a settle-time error.
pub fn parse_settle_or_default(raw: &str, default: Duration) -> Result<Duration, TunerError> {
    if raw.is_empty() {
        return Ok(default);
    }
    humantime::parse_duration(raw)
        .map_err(|e| TunerError::InvalidSettleTime(format!("{raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_uses_default() {
        let d = parse_or_default("", Duration::from_secs(5)).unwrap();
        assert_eq!(d, Duration::from_secs(5));
    }

    #[test]
    fn parses_milliseconds() {
        let d = parse_or_default("10ms", Duration::from_secs(0)).unwrap();
        assert_eq!(d, Duration::from_millis(10));
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_or_default("not-a-duration", Duration::from_secs(0)).unwrap_err();
        assert!(matches!(err, TunerError::InvalidInterval(_)));
    }
}
