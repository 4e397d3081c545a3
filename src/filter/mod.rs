//! Documentation for `sitefilters`' built-in filters.
//!
//! Conventions used:
//!
//! - Signature of a filter: `value: T | name(arg_1: U_1, ...): V` means that `name` is a filter
//!     that takes a *piped value* of type `T`, has positional arguments `arg_i` of type `U_i`,
//!     and returns a value of type `V`
//!   - Specifying an arg type with a question mark (e.g., `value: List | sort(property: String?)`)
//!     means that that argument (e.g., `property`) is *optional* and can be omitted or `nil`.
//! - List shorthand: a `List` is represented as `[a_0, a_1, a_2, ..., a_n]` to mean that
//!   its elements are `a_0, ..., a_n` in that order.  Indexing starts at 0.
//! - Structure shorthand: similarly, a structure is represented as `{ key_1: value_1, ... }`
//!   to indicate that it has keys that correspond to the given values.
//! - In a template, a filter is written `value | name: arg_1, arg_2`.

use std::{
    collections::BTreeMap,
    sync::{Arc, LazyLock},
};

use sitefilters_filter_types::{
    bail, ContextView, FilterDyn, IValue, Result, Structure, Value, WrapExt,
};

pub mod collection;
pub mod date;
pub mod grouping;
pub mod string;

macro_rules! build_map {
    ($(
        $name: literal => $id: path,
    )*) => {
        [$(
            ($name, Box::new($id()) as Box<dyn FilterDyn + Send + Sync>),
        )*]
    };
}

pub static FILTERS: LazyLock<BTreeMap<&'static str, Box<dyn FilterDyn + Send + Sync>>> =
    LazyLock::new(|| {
        build_map! {
            "group_by" => grouping::group_by,
            "group_by_exp" => grouping::group_by_exp,
            "date_to_string" => date::date_to_string,
            "date_to_long_string" => date::date_to_long_string,
            "date_to_xmlschema" => date::date_to_xmlschema,
            "date_to_rfc822" => date::date_to_rfc822,
            "xml_escape" => string::xml_escape,
            "cgi_escape" => string::cgi_escape,
            "uri_escape" => string::uri_escape,
            "normalize_whitespace" => string::normalize_whitespace,
            "number_of_words" => string::number_of_words,
            "array_to_serial" => string::array_to_serial,
            "jsonify" => string::jsonify,
            "inspect" => string::inspect,
            "to_integer" => string::to_integer,
            "where" => collection::r#where,
            "where_exp" => collection::where_exp,
            "sort" => collection::sort,
            "pop" => collection::pop,
            "push" => collection::push,
            "shift" => collection::shift,
            "unshift" => collection::unshift,
            "sample" => collection::sample,
        }
        .into_iter()
        .collect()
    });

/// Applies the filter registered as `name`.
///
/// # Errors
///
/// Returns an `Err` if no filter is registered as `name`, or the filter
/// fails.  A filter's error is wrapped with a note naming the filter.
pub fn dispatch_filter(
    name: &str,
    value: IValue,
    args: Vec<IValue>,
    ctx: &mut dyn ContextView,
) -> Result<IValue> {
    let Some(filter) = FILTERS.get(name) else {
        bail!("unrecognized filter `{name}`");
    };

    tracing::debug!(filter = name, args = args.len(), "applying filter");
    filter
        .apply(value, args, ctx)
        .wrap_with(|| format!("in filter `{name}`"))
}

/// The names of every registered filter, in order.
pub fn filter_names() -> impl Iterator<Item = &'static str> {
    FILTERS.keys().copied()
}

/// The collection a filter iterates over: a list's items, or a structure's
/// values.  `None` for anything else.
pub(crate) fn items(value: &IValue) -> Option<Vec<IValue>> {
    match value {
        Value::List(l) => Some(l.clone()),
        Value::Structure(s) => Some(s.values().cloned().collect()),
        _ => None,
    }
}

/// Looks up the dot-separated `property` path of `item`.
#[inline]
pub(crate) fn item_property(item: &IValue, property: &str) -> IValue {
    item.path(property)
}

/// Builds a structure from `(key, value)` pairs.
pub(crate) fn structure<const N: usize>(pairs: [(&str, IValue); N]) -> IValue {
    Value::Structure(
        pairs
            .into_iter()
            .map(|(k, v)| (Arc::from(k), v))
            .collect::<Structure<_>>(),
    )
}

/// Reads a count argument: an `Int`, an integral `Float`, or a string holding
/// an integer.  `None` if `value` is none of those.
pub(crate) fn strict_integer(value: &IValue) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        #[allow(clippy::cast_possible_truncation)]
        Value::Float(x) if x.fract() == 0.0 && x.is_finite() => Some(*x as i64),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use sitefilters_filter_types::{Error, IValue, Value};

    use super::{dispatch_filter, filter_names, strict_integer};
    use crate::Context;

    #[test]
    fn test_registry() {
        let names = filter_names().collect::<Vec<_>>();
        assert_eq!(names.len(), 23);
        for name in ["where", "where_exp", "group_by_exp", "sample", "jsonify"] {
            assert!(names.contains(&name), "missing filter `{name}`");
        }
    }

    #[test]
    fn test_unknown_filter() {
        let err = dispatch_filter("upcase", Value::Null, vec![], &mut Context::new())
            .expect_err("upcase is not registered");
        assert_eq!(err.to_string(), "unrecognized filter `upcase`");
    }

    #[test]
    fn test_error_names_filter() {
        let err = dispatch_filter("sort", Value::Null, vec![], &mut Context::new())
            .expect_err("sorting null fails");

        assert_eq!(err.to_string(), "Cannot sort a null object.\nin filter `sort`");
        assert!(matches!(err.root(), Error::Argument { .. }));
    }

    #[test]
    fn test_too_many_arguments() {
        let err = dispatch_filter(
            "push",
            IValue::List(vec![]),
            vec![Value::Int(1), Value::Int(2)],
            &mut Context::new(),
        )
        .expect_err("push takes one argument");

        assert!(matches!(err.root(), Error::Argument { .. }));
    }

    #[test]
    fn test_strict_integer() {
        assert_eq!(strict_integer(&IValue::Int(3)), Some(3));
        assert_eq!(strict_integer(&IValue::from(" 2 ")), Some(2));
        assert_eq!(strict_integer(&IValue::Float(2.0)), Some(2));
        assert_eq!(strict_integer(&IValue::Float(2.5)), None);
        assert_eq!(strict_integer(&IValue::from("two")), None);
        assert_eq!(strict_integer(&Value::Null), None);
    }
}
