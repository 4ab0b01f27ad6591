use crate::error::{LockError, Result};
use std::time::Duration;

/// Parse a duration string like "250ms", "30s", "5m", "2h", "7d"
/// Defaults to seconds if no unit specified
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    if s.is_empty() {
        return Err(LockError::InvalidDuration {
            input: s.to_string(),
            message: "empty string".to_string(),
        });
    }

    // "ms" has to be checked before its single-letter suffixes
    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else if let Some(stripped) = s.strip_suffix('d') {
        (stripped, "d")
    } else {
        (s, "s")
    };

    let value: u64 = num_str.parse().map_err(|_| LockError::InvalidDuration {
        input: s.to_string(),
        message: "expected format: NUMBER[ms|s|m|h|d] (e.g., '250ms', '30s', '5m', '2h')"
            .to_string(),
    })?;

    let multiplier = match unit {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => 60 * 60 * 24,
    };

    let seconds = value
        .checked_mul(multiplier)
        .ok_or_else(|| LockError::InvalidDuration {
            input: s.to_string(),
            message: "duration is too large".to_string(),
        })?;

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_units() {
        assert_eq!(parse_duration("5ms").unwrap().as_millis(), 5);
        assert_eq!(parse_duration("1s").unwrap().as_secs(), 1);
        assert_eq!(parse_duration("1m").unwrap().as_secs(), 60);
        assert_eq!(parse_duration("1h").unwrap().as_secs(), 3600);
        assert_eq!(parse_duration("1d").unwrap().as_secs(), 86400);
    }
}
