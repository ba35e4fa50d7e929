use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// IMF-fixdate, the preferred HTTP-date form.
const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
/// Obsolete RFC 850 form, two-digit year.
const RFC850_DATE: &str = "%A, %d-%b-%y %H:%M:%S GMT";
/// ANSI C `asctime()` form, after whitespace runs are collapsed.
const ASCTIME_DATE: &str = "%a %b %d %H:%M:%S %Y";

#[must_use]
pub fn unix_millis_now() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// RFC 3339 UTC timestamp with millisecond precision.
#[must_use]
pub fn format_millis(ms: u64) -> String {
    let ms = i64::try_from(ms).unwrap_or(i64::MAX);
    DateTime::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[must_use]
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format an instant as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
#[must_use]
pub fn http_date(at: &DateTime<Utc>) -> String {
    at.format(IMF_FIXDATE).to_string()
}

/// Parse any of the three HTTP-date forms a client may send.
#[must_use]
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Some(at.with_timezone(&Utc));
    }
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    [RFC850_DATE, ASCTIME_DATE]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&collapsed, format).ok())
        .map(|naive| naive.and_utc())
}

/// Read a modification marker: RFC 3339 as stored by adapters, or an HTTP-date.
#[must_use]
pub fn parse_marker(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|at| at.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_http_date(value))
}
