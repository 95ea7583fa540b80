//! Timestamp helpers.
//!
//! Timestamps are stored as UTC TEXT (`YYYY-MM-DD HH:MM:SS.ffffff`) so that
//! lexical order equals chronological order inside SQLite.

use chrono::{DateTime, Utc};

/// Storage format for all timestamp columns.
pub const DB_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Current UTC time in storage format.
pub fn now() -> String {
    format_db(&Utc::now())
}

/// Format a UTC instant in storage format.
pub fn format_db(dt: &DateTime<Utc>) -> String {
    dt.format(DB_FORMAT).to_string()
}

/// Convert a stored timestamp to RFC3339 for API responses.
pub fn to_rfc3339(datetime_str: &str) -> String {
    format!("{}Z", datetime_str.replace(' ', "T"))
}

/// Optional variant of [`to_rfc3339`].
pub fn opt_to_rfc3339(datetime_str: Option<&str>) -> Option<String> {
    datetime_str.map(to_rfc3339)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_db() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(format_db(&dt), "2024-01-15 10:30:00.000000");
    }

    #[test]
    fn test_to_rfc3339() {
        assert_eq!(
            to_rfc3339("2024-01-15 10:30:00.000000"),
            "2024-01-15T10:30:00.000000Z"
        );
        assert_eq!(to_rfc3339("2024-01-15 10:30:00"), "2024-01-15T10:30:00Z");
    }

    #[test]
    fn test_opt_to_rfc3339() {
        assert_eq!(opt_to_rfc3339(None), None);
        assert_eq!(
            opt_to_rfc3339(Some("2024-01-15 10:30:00")),
            Some("2024-01-15T10:30:00Z".to_string())
        );
    }

    #[test]
    fn test_now_sorts_lexically() {
        let a = now();
        let b = now();
        assert!(a <= b);
        assert!(DateTime::parse_from_rfc3339(&to_rfc3339(&a)).is_ok());
    }
}
