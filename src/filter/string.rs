//! Escaping, text and conversion filters.

use std::sync::LazyLock;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use sitefilters_filter_types::{filter_fn, IValue, Item, MessageExt, Result, Value};

// Form encoding keeps only ASCII alphanumerics and the unreserved marks.
const CGI_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

// URI components keep unreserved and reserved characters (RFC 3986).
const URI_SET: &AsciiSet = &CGI_SET
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("error building whitespace Regex"));

/// Escapes `&`, `<`, `>` and `"` with their XML entities.
#[must_use]
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Signature: `value | xml_escape(): String`
///
/// Escapes the text of `value` for use in XML or HTML text and attributes.
///
/// # Examples
///
/// - `'foo "bar" <baz>' | xml_escape` returns `"foo &quot;bar&quot; &lt;baz&gt;"`
/// - `nil | xml_escape` returns `""`
#[filter_fn]
pub fn xml_escape(value: IValue) -> Result<IValue> {
    Ok(Value::String(escape_xml(&value.to_text()).into()))
}

/// Signature: `value | cgi_escape(): String`
///
/// Escapes text for a URL query (form encoding): spaces become `+`, and
/// every byte other than ASCII letters, digits and `_.-~` becomes `%XX`.
///
/// # Examples
///
/// - `"foo,bar;baz?" | cgi_escape` returns `"foo%2Cbar%3Bbaz%3F"`
/// - `"a b" | cgi_escape` returns `"a+b"`
#[filter_fn]
pub fn cgi_escape(value: IValue) -> Result<IValue> {
    let escaped = utf8_percent_encode(&value.to_text(), CGI_SET)
        .to_string()
        .replace("%20", "+");
    Ok(Value::String(escaped.into()))
}

/// Signature: `value | uri_escape(): String`
///
/// Normalizes text as a URI component: existing escapes are decoded, then
/// every character outside the unreserved and reserved sets is escaped.
///
/// # Examples
///
/// - `'foo, bar \baz?' | uri_escape` returns `"foo,%20bar%20%5Cbaz?"`
/// - `"caf%C3%A9 au lait" | uri_escape` returns `"caf%C3%A9%20au%20lait"`
#[filter_fn]
pub fn uri_escape(value: IValue) -> Result<IValue> {
    let text = value.to_text();
    let decoded = percent_decode_str(&text).decode_utf8_lossy();
    Ok(Value::String(
        utf8_percent_encode(&decoded, URI_SET).to_string().into(),
    ))
}

/// Signature: `value | normalize_whitespace(): String`
///
/// Replaces every run of whitespace with a single space, and trims both ends.
///
/// # Examples
///
/// - `"  a \n\t b  " | normalize_whitespace` returns `"a b"`
#[filter_fn]
pub fn normalize_whitespace(value: IValue) -> Result<IValue> {
    let text = value.to_text();
    Ok(Value::String(
        WHITESPACE.replace_all(&text, " ").trim().into(),
    ))
}

/// Signature: `value | number_of_words(): Int`
///
/// Counts the whitespace-separated words in the text of `value`.
///
/// # Examples
///
/// - `"the quick  brown\nfox" | number_of_words` returns `4`
#[filter_fn]
pub fn number_of_words(value: IValue) -> Result<IValue> {
    let count = value.to_text().split_whitespace().count();
    Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
}

/// Signature: `value: List | array_to_serial(connector: String?, separator: String?): String`
///
/// Joins the items into a serial list.  `connector` (default `"and"`) goes
/// before the last item, and `separator` (default `", "`) between the rest.
///
/// # Examples
///
/// - `["a", "b", "c"] | array_to_serial` returns `"a, b, and c"`
/// - `["a", "b"] | array_to_serial` returns `"a and b"`
/// - `["a", "b"] | array_to_serial: ""` returns `"a, b"`
/// - `["a", "b", "c"] | array_to_serial: "or", "; "` returns `"a; b; or c"`
#[filter_fn]
pub fn array_to_serial(value: IValue, connector: IValue, separator: IValue) -> Result<IValue> {
    let items = match value {
        Value::Null => vec![],
        Value::List(l) => l,
        other => vec![other],
    };
    let connector = if connector.is_null() {
        "and".into()
    } else {
        connector.to_text().into_owned()
    };
    let separator = if separator.is_null() {
        ", ".into()
    } else {
        separator.to_text().into_owned()
    };

    let texts = items.iter().map(|x| x.to_text()).collect::<Vec<_>>();

    let out = match &texts[..] {
        [] => String::new(),
        [one] => one.to_string(),
        [a, b] if connector.is_empty() => format!("{a}{separator}{b}"),
        [a, b] => format!("{a} {connector} {b}"),
        [init @ .., last] => {
            let con = if connector.is_empty() {
                String::new()
            } else {
                format!("{connector} ")
            };
            format!("{}{separator}{con}{last}", init.join(separator.as_str()))
        }
    };

    Ok(Value::String(out.into()))
}

/// Signature: `value | jsonify(): String`
///
/// Serializes `value` as JSON.  Dates become their text form and host
/// objects are converted to plain data first.
///
/// # Examples
///
/// - `{ a: [1, "b", nil] } | jsonify` returns `'{"a":[1,"b",null]}'`
#[filter_fn]
pub fn jsonify(value: IValue) -> Result<IValue> {
    let json = serde_json::to_string(&value.to_data()).msg("error serializing to JSON")?;
    Ok(Value::String(json.into()))
}

/// Signature: `value | inspect(): String`
///
/// A debugging representation of `value`, escaped for XML.
///
/// # Examples
///
/// - `"foo" | inspect` returns `"&quot;foo&quot;"`
/// - `[1, nil] | inspect` returns `"[1, null]"`
#[filter_fn]
pub fn inspect(value: IValue) -> Result<IValue> {
    Ok(Value::String(escape_xml(&value.to_string()).into()))
}

/// Reads the leading integer of `s`, after optional whitespace and a sign,
/// e.g., `" -12abc"` is `-12`.  No digits is `0`.
fn leading_integer(s: &str) -> i64 {
    let s = s.trim_start();
    let negative = s.starts_with('-');
    let sign = usize::from(negative || s.starts_with('+'));

    let digits = s[sign..].bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return 0;
    }

    // parse with the sign so `i64::MIN` fits, saturating past either end
    match s[..sign + digits].parse::<i64>() {
        Ok(n) => n,
        Err(_) if negative => i64::MIN,
        Err(_) => i64::MAX,
    }
}

/// Signature: `value | to_integer(): Int`
///
/// Converts `value` to an integer: `true` is `1` and `false` is `0`, floats
/// are truncated, strings are read by their leading integer, and dates are
/// their Unix timestamp.  Anything else is `0`.
///
/// # Examples
///
/// - `"12abc" | to_integer` returns `12`
/// - `3.9 | to_integer` returns `3`
/// - `true | to_integer` returns `1`
#[filter_fn]
pub fn to_integer(value: IValue) -> Result<IValue> {
    #[allow(clippy::cast_possible_truncation)]
    let n = match &value {
        Value::Bool(b) => i64::from(*b),
        Value::Int(n) => *n,
        Value::Float(x) if x.is_finite() => x.trunc() as i64,
        Value::String(s) => leading_integer(s),
        Value::Extra(Item::Date(date)) => date.timestamp(),
        _ => 0,
    };
    Ok(Value::Int(n))
}
