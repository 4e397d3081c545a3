//! Date formatting filters.
//!
//! Every filter reads its input with [`coerce_date`] and shows the instant in
//! the render's local offset ([`ContextView::local_offset`]).  `nil`, empty
//! and whitespace-only strings are returned unchanged.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sitefilters_filter_types::{filter_fn, ContextView, Error, IValue, Item, Result, Value};

const ZONED_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M:%S%.f %z"];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Whether `value` is passed through the date filters untouched.
fn is_blank_date(value: &IValue) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn from_timestamp(secs: i64, nanos: u32) -> Option<DateTime<FixedOffset>> {
    DateTime::from_timestamp(secs, nanos).map(|utc| utc.fixed_offset())
}

/// Interprets a date without a UTC offset in the render's local zone.
fn from_naive(naive: NaiveDateTime, ctx: &dyn ContextView) -> Option<DateTime<FixedOffset>> {
    let offset = ctx.local_offset(naive.and_utc());
    offset.from_local_datetime(&naive).single()
}

fn parse_date(s: &str, ctx: &dyn ContextView) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();

    match s {
        "now" | "today" => return Some(Utc::now().fixed_offset()),
        digits if digits.bytes().all(|b| b.is_ascii_digit()) => {
            return from_timestamp(digits.parse().ok()?, 0)
        }
        _ => (),
    }

    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_rfc2822(s))
        .ok()
        .or_else(|| {
            ZONED_FORMATS
                .iter()
                .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
        })
        .or_else(|| {
            NAIVE_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .or_else(|| {
                    NAIVE_DATE_FORMATS
                        .iter()
                        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                })
                .and_then(|naive| from_naive(naive, ctx))
        })
}

/// Reads `value` as an instant and converts it to the render's local
/// offset.
///
/// Accepts dates, Unix timestamps (`Int`, `Float`, or a string of digits),
/// `now`/`today`, RFC 3339, RFC 2822, and common `YYYY-MM-DD`-style forms.
/// Returns `Ok(None)` for `nil` and blank strings, which the date filters
/// pass through.
///
/// # Errors
///
/// Returns an [`Error::InvalidDate`] naming `value` if it cannot be read
/// as a date.
pub fn coerce_date(value: &IValue, ctx: &dyn ContextView) -> Result<Option<DateTime<FixedOffset>>> {
    if is_blank_date(value) {
        return Ok(None);
    }

    let date = match value {
        Value::Extra(Item::Date(date)) => Some(*date),
        Value::Int(secs) => from_timestamp(*secs, 0),
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Value::Float(x) if x.is_finite() => {
            let secs = x.floor();
            from_timestamp(secs as i64, ((x - secs) * 1e9) as u32)
        }
        Value::String(s) => parse_date(s, ctx),
        _ => None,
    };

    let date = date.ok_or_else(|| Error::invalid_date(value))?;
    let offset = ctx.local_offset(date.with_timezone(&Utc));
    Ok(Some(date.with_timezone(&offset)))
}

/// `th` for 11 through 13, otherwise by the last digit.
#[must_use]
pub fn ordinal(day: u32) -> &'static str {
    if (11..=13).contains(&(day % 100)) {
        return "th";
    }

    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

fn is_text(value: &IValue, text: &str) -> bool {
    matches!(value, Value::String(s) if &**s == text)
}

/// Formats a date with the given month notation (`%b` or `%B`).
fn stringify_date(
    value: IValue,
    month: &str,
    date_type: &IValue,
    style: &IValue,
    ctx: &dyn ContextView,
) -> Result<IValue> {
    use chrono::Datelike as _;

    let Some(date) = coerce_date(&value, ctx)? else {
        return Ok(value);
    };

    let format = if is_text(date_type, "ordinal") {
        let day = date.day();
        let ordinal_day = format!("{day}{}", ordinal(day));
        if is_text(style, "US") {
            format!("{month} {ordinal_day}, %Y")
        } else {
            format!("{ordinal_day} {month} %Y")
        }
    } else {
        format!("%d {month} %Y")
    };

    Ok(Value::String(date.format(&format).to_string().into()))
}

/// Signature: `value: Date | date_to_string(type: String?, style: String?): String`
///
/// Formats a date in short form, e.g., `27 Jan 2011`.  With `type` set to
/// `"ordinal"`, the day gets an ordinal suffix (`27th Jan 2011`), and with
/// `style` also set to `"US"`, the month comes first (`Jan 27th, 2011`).
///
/// # Examples
///
/// - `"2011-01-27" | date_to_string` returns `"27 Jan 2011"`
/// - `"2011-01-27" | date_to_string: "ordinal", "US"` returns `"Jan 27th, 2011"`
/// - `nil | date_to_string` returns `nil`
#[filter_fn]
pub fn date_to_string(
    value: IValue,
    date_type: IValue,
    style: IValue,
    ctx: &mut dyn ContextView,
) -> Result<IValue> {
    stringify_date(value, "%b", &date_type, &style, ctx)
}

/// Signature: `value: Date | date_to_long_string(type: String?, style: String?): String`
///
/// Like [`date_to_string`], with the full month name, e.g., `27 January 2011`.
#[filter_fn]
pub fn date_to_long_string(
    value: IValue,
    date_type: IValue,
    style: IValue,
    ctx: &mut dyn ContextView,
) -> Result<IValue> {
    stringify_date(value, "%B", &date_type, &style, ctx)
}

/// Signature: `value: Date | date_to_xmlschema(): String`
///
/// Formats a date as an XML schema (ISO 8601) timestamp.
///
/// # Examples
///
/// - `"2011-04-24 12:34:46 +0000" | date_to_xmlschema` returns
///   `"2011-04-24T20:34:46+08:00"` in a `+08:00` zone
#[filter_fn]
pub fn date_to_xmlschema(value: IValue, ctx: &mut dyn ContextView) -> Result<IValue> {
    Ok(match coerce_date(&value, ctx)? {
        Some(date) => Value::String(date.format("%Y-%m-%dT%H:%M:%S%:z").to_string().into()),
        None => value,
    })
}

/// Signature: `value: Date | date_to_rfc822(): String`
///
/// Formats a date according to RFC 822, e.g., `Sun, 24 Apr 2011 12:34:46 +0000`.
#[filter_fn]
pub fn date_to_rfc822(value: IValue, ctx: &mut dyn ContextView) -> Result<IValue> {
    Ok(match coerce_date(&value, ctx)? {
        Some(date) => Value::String(date.format("%a, %d %b %Y %H:%M:%S %z").to_string().into()),
        None => value,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use sitefilters_filter_types::{Error, IValue, Value};

    use super::ordinal;
    use crate::{dispatch_filter, Config, Context};

    fn context(hours: i32) -> Context {
        Context::with_config(Config {
            utc_offset: FixedOffset::east_opt(hours * 3600),
            ..Config::default()
        })
    }

    fn apply(name: &str, value: IValue, args: &[&str]) -> IValue {
        dispatch_filter(
            name,
            value,
            args.iter().map(|&a| a.into()).collect(),
            &mut context(8),
        )
        .expect("date filter should succeed")
    }

    #[test]
    fn test_ordinal() {
        let suffixes = [1, 2, 3, 4, 11, 12, 13, 21, 22, 23, 30, 111, 112]
            .map(ordinal)
            .join(" ");
        assert_eq!(suffixes, "st nd rd th th th th st nd rd th th th");
    }

    #[test]
    fn test_date_to_string() {
        let date = || IValue::from("2011-01-27");

        assert_eq!(apply("date_to_string", date(), &[]), "27 Jan 2011".into());
        assert_eq!(
            apply("date_to_string", date(), &["ordinal"]),
            "27th Jan 2011".into()
        );
        assert_eq!(
            apply("date_to_string", date(), &["ordinal", "US"]),
            "Jan 27th, 2011".into()
        );
        // style alone has no effect
        assert_eq!(
            apply("date_to_string", date(), &["", "US"]),
            "27 Jan 2011".into()
        );
        assert_eq!(
            apply("date_to_long_string", date(), &["ordinal", "US"]),
            "January 27th, 2011".into()
        );
        assert_eq!(
            apply("date_to_long_string", IValue::from("2011-01-02"), &[]),
            "02 January 2011".into()
        );
    }

    #[test]
    fn test_xmlschema_and_rfc822() {
        let date = || IValue::from("2011-04-24T12:34:46Z");

        assert_eq!(
            apply("date_to_xmlschema", date(), &[]),
            "2011-04-24T20:34:46+08:00".into()
        );
        assert_eq!(
            apply("date_to_rfc822", date(), &[]),
            "Sun, 24 Apr 2011 20:34:46 +0800".into()
        );

        let date = FixedOffset::west_opt(5 * 3600)
            .and_then(|tz| tz.with_ymd_and_hms(2011, 4, 24, 3, 0, 0).single())
            .expect("valid date");
        assert_eq!(
            apply("date_to_xmlschema", date.into(), &[]),
            "2011-04-24T16:00:00+08:00".into()
        );
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(
            apply("date_to_xmlschema", IValue::Int(0), &[]),
            "1970-01-01T08:00:00+08:00".into()
        );
        assert_eq!(
            apply("date_to_xmlschema", IValue::from("86400"), &[]),
            "1970-01-02T08:00:00+08:00".into()
        );
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(apply("date_to_string", Value::Null, &[]), Value::Null);
        assert_eq!(apply("date_to_rfc822", "".into(), &[]), "".into());
        assert_eq!(apply("date_to_xmlschema", "  ".into(), &[]), "  ".into());
    }

    #[test]
    fn test_invalid_date() {
        let err = dispatch_filter(
            "date_to_string",
            "not a date".into(),
            vec![],
            &mut context(0),
        )
        .expect_err("not a date");

        assert!(matches!(err.root(), Error::InvalidDate { .. }));
        assert_eq!(
            err.root().to_string(),
            "Invalid Date: '\"not a date\"' is not a valid datetime."
        );

        let err = dispatch_filter("date_to_rfc822", IValue::Bool(true), vec![], &mut context(0))
            .expect_err("a bool is not a date");
        assert!(matches!(err.root(), Error::InvalidDate { .. }));
    }
}
