// src/config/duration.rs

use std::time::Duration;

/// Parse a wait or interval such as `"250ms"`, `"30s"`, `"2m"` or `"1h"`.
///
/// A bare number is seconds, which is how the environment overrides
/// (`MAX_WAIT_TIME`, `DEPLOY_PAUSE_TIME`) carry their values.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Err(if s.is_empty() {
            "empty duration".to_string()
        } else {
            format!("duration '{s}' must start with a number")
        });
    }

    let (number, unit) = s.split_at(digits);
    let value: u64 = number
        .parse()
        .map_err(|e| format!("invalid duration '{s}': {e}"))?;

    let millis_per_unit: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "ms" => 1,
        "" | "s" | "sec" => 1_000,
        "m" | "min" => 60_000,
        "h" => 3_600_000,
        other => {
            return Err(format!(
                "unsupported unit '{other}' in duration '{s}' (use ms, s, m or h)"
            ));
        }
    };
    value
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
