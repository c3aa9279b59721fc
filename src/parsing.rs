use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Parses `300`, `300s`, `5m` or `1h` into seconds.
pub fn parse_duration_secs(q: &str) -> Option<u64> {
    let q = q.trim();
    if q.is_empty() {
        return None;
    }
    const UNITS: &[(char, u64)] = &[('s', 1), ('m', 60), ('h', 3600)];

    for (suf, mul) in UNITS {
        if let Some(stripped) = q.strip_suffix(*suf) {
            return stripped.trim().parse::<u64>().ok()?.checked_mul(*mul);
        }
    }
    q.parse::<u64>().ok()
}

/// Reads a telemetry timestamp. RFC 3339 is preferred; naive ISO datetimes (as the
/// gateway writes them) are taken to be UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

pub fn parse_truthy(v: &str) -> bool {
    matches!(v, "1" | "true" | "TRUE" | "True")
}

/// `300` → `5m`, `90` → `90s`, `7200` → `2h`.
pub fn format_duration_secs(secs: u64) -> String {
    if secs > 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs > 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
