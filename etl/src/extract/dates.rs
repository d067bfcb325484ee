use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Parse an authorization timestamp trying each configured format in order.
///
/// Formats may carry a time of day or be date-only; date-only matches are
/// anchored at midnight. Empty and unrecognized values yield `None`.
pub fn parse_authorization_date(value: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in formats {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime);
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }

    None
}
