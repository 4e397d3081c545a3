//! Filters that select, order and reshape lists.

use std::{cmp::Ordering, sync::Arc};

use rand::seq::SliceRandom;
use sitefilters_filter_types::{filter_fn, ContextView, Error, IValue, Result, Value};

use super::{item_property, items, strict_integer};

/// The texts an item's property matches against in `where`.
fn property_texts(value: &IValue) -> Vec<String> {
    match value {
        Value::Null => vec![],
        Value::List(l) => l.iter().map(|x| x.to_text().into_owned()).collect(),
        other => vec![other.to_text().into_owned()],
    }
}

fn select_matching(items: Vec<IValue>, property: &str, target: &str) -> IValue {
    Value::List(
        items
            .into_iter()
            .filter(|item| {
                property_texts(&item_property(item, property))
                    .iter()
                    .any(|text| text == target)
            })
            .collect(),
    )
}

/// Signature: `value: List | where(property: String, target: Any): List`
///
/// Keeps the items whose value at `property` has the same text as `target`.
/// If that value is a list, it matches when any of its elements does.  A
/// structure's values are filtered.
///
/// Results are memoized for the rest of the render when the context has a
/// `where` cache, so repeating a call is cheap.  `nil` for `property` or
/// `target` returns the input unchanged.
///
/// # Examples
///
/// - `[{ t: "x" }, { t: "y" }, { t: ["x", "z"] }] | where: "t", "x"` returns
///   `[{ t: "x" }, { t: ["x", "z"] }]`
/// - `[{ n: 1 }, { n: 2 }] | where: "n", "1"` returns `[{ n: 1 }]`
#[filter_fn]
pub fn r#where(
    value: IValue,
    property: IValue,
    target: IValue,
    ctx: &mut dyn ContextView,
) -> Result<IValue> {
    if property.is_null() || target.is_null() {
        return Ok(value);
    }
    let Some(items) = items(&value) else {
        return Ok(value);
    };

    let property = property.to_text();
    let compute = || -> Result<IValue> {
        Ok(select_matching(items, &property, &target.to_text()))
    };

    match ctx.where_cache() {
        Some(cache) => cache.get_or_try_insert_with(&value, &property, &target, compute),
        None => compute(),
    }
}

/// Signature: `value: List | where_exp(variable: String, condition: String): List`
///
/// Keeps the items for which `condition` holds, with `variable` bound to the
/// item.  A structure's values are filtered.
///
/// # Examples
///
/// - `[{ n: 1 }, { n: 2 }, { n: 3 }] | where_exp: "item", "item.n > 1"` returns
///   `[{ n: 2 }, { n: 3 }]`
/// - `posts | where_exp: "post", "post.tags contains 'rust'"`
#[filter_fn]
pub fn where_exp(
    value: IValue,
    variable: Arc<str>,
    condition: Arc<str>,
    ctx: &mut dyn ContextView,
) -> Result<IValue> {
    let Some(items) = items(&value) else {
        return Ok(value);
    };

    let mut kept = Vec::new();
    for item in items {
        if ctx.evaluate_condition(&variable, item.clone(), &condition)? {
            kept.push(item);
        }
    }

    Ok(Value::List(kept))
}

/// Checks that each neighbouring pair of sorted `keys` has a natural order,
/// which holds for every pair when they were sorted by [`IValue::total_cmp`].
fn ensure_comparable<'a>(keys: impl IntoIterator<Item = &'a IValue>) -> Result<()> {
    let mut keys = keys.into_iter();
    let Some(mut prev) = keys.next() else {
        return Ok(());
    };

    for key in keys {
        prev.natural_cmp(key)?;
        prev = key;
    }
    Ok(())
}

/// Signature: `value: List | sort(property: String?, nils: String?): List`
///
/// Sorts the items in natural order (see [`IValue::natural_cmp`]), or by
/// their value at `property` if it is given.  With a property, items missing
/// it go first, or last when `nils` is `"last"`.  A structure's values are
/// sorted.
///
/// # Errors
///
/// Sorting `nil`, a `nils` other than `"first"` or `"last"`, and values
/// that cannot be compared, like a string and a number, are errors.
///
/// # Examples
///
/// - `[3, 1, 2] | sort` returns `[1, 2, 3]`
/// - `[{ n: 2 }, {}, { n: 1 }] | sort: "n"` returns `[{}, { n: 1 }, { n: 2 }]`
/// - `[{ n: 2 }, {}, { n: 1 }] | sort: "n", "last"` returns `[{ n: 1 }, { n: 2 }, {}]`
#[filter_fn]
pub fn sort(value: IValue, property: IValue, nils: IValue) -> Result<IValue> {
    if value.is_null() {
        return Err(Error::argument("Cannot sort a null object."));
    }
    let Some(mut items) = items(&value) else {
        return Ok(value);
    };

    if property.is_null() {
        items.sort_by(IValue::total_cmp);
        ensure_comparable(&items)?;
        return Ok(Value::List(items));
    }

    let nils_first = match &nils {
        Value::Null => true,
        Value::String(s) if &**s == "first" => true,
        Value::String(s) if &**s == "last" => false,
        other => {
            return Err(Error::argument(format!(
                "Invalid nils order: '{}' is not a valid nils order. It must be 'first' or 'last'.",
                other.to_text()
            )))
        }
    };

    let property = property.to_text();
    let mut decorated = items
        .into_iter()
        .map(|item| (item_property(&item, &property), item))
        .collect::<Vec<_>>();

    decorated.sort_by(|(a, _), (b, _)| match (a.is_null(), b.is_null()) {
        (false, true) if nils_first => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, false) if nils_first => Ordering::Less,
        (true, false) => Ordering::Greater,
        _ => a.total_cmp(b),
    });
    ensure_comparable(decorated.iter().map(|(key, _)| key).filter(|key| !key.is_null()))?;

    Ok(Value::List(
        decorated.into_iter().map(|(_, item)| item).collect(),
    ))
}

/// Reads the count for `pop` and `shift`.  `nil` is 1.
fn count(n: &IValue) -> Result<usize> {
    if n.is_null() {
        return Ok(1);
    }

    let n = strict_integer(n).ok_or_else(|| Error::argument(format!("invalid integer: {n}")))?;
    usize::try_from(n).map_err(|_| Error::argument(format!("negative array size: {n}")))
}

/// Signature: `value: List | pop(n: Int?): List`
///
/// A copy of the list without its last `n` items (default 1).
///
/// # Examples
///
/// - `[1, 2, 3] | pop` returns `[1, 2]`
/// - `[1, 2, 3] | pop: 5` returns `[]`
#[filter_fn]
pub fn pop(value: IValue, n: IValue) -> Result<IValue> {
    let Value::List(mut list) = value else {
        return Ok(value);
    };

    let n = count(&n)?;
    list.truncate(list.len().saturating_sub(n));
    Ok(Value::List(list))
}

/// Signature: `value: List | push(item: Any): List`
///
/// A copy of the list with `item` appended.
///
/// # Examples
///
/// - `[1, 2] | push: 3` returns `[1, 2, 3]`
#[filter_fn]
pub fn push(value: IValue, item: IValue) -> Result<IValue> {
    let Value::List(mut list) = value else {
        return Ok(value);
    };

    list.push(item);
    Ok(Value::List(list))
}

/// Signature: `value: List | shift(n: Int?): List`
///
/// A copy of the list without its first `n` items (default 1).
///
/// # Examples
///
/// - `[1, 2, 3] | shift: 2` returns `[3]`
#[filter_fn]
pub fn shift(value: IValue, n: IValue) -> Result<IValue> {
    let Value::List(mut list) = value else {
        return Ok(value);
    };

    let n = count(&n)?.min(list.len());
    list.drain(..n);
    Ok(Value::List(list))
}

/// Signature: `value: List | unshift(item: Any): List`
///
/// A copy of the list with `item` prepended.
#[filter_fn]
pub fn unshift(value: IValue, item: IValue) -> Result<IValue> {
    let Value::List(mut list) = value else {
        return Ok(value);
    };

    list.insert(0, item);
    Ok(Value::List(list))
}

/// Signature: `value: List | sample(n: Int?): Any`
///
/// Picks a random item from the list, or with `n` other than 1, a list of
/// `n` distinct random items (fewer if the list is shorter).  An `n` that is
/// not a non-negative integer counts as 1.
///
/// # Examples
///
/// - `[1, 2, 3] | sample` returns one of `1`, `2` or `3`
/// - `[1, 2, 3] | sample: 2` returns e.g. `[3, 1]`
/// - `[] | sample` returns `nil`
#[filter_fn]
pub fn sample(value: IValue, n: IValue, ctx: &mut dyn ContextView) -> Result<IValue> {
    let Value::List(list) = value else {
        return Ok(value);
    };

    let n = strict_integer(&n)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(1);

    if n == 1 {
        return Ok(list.choose(ctx.rng()).cloned().unwrap_or(Value::Null));
    }

    Ok(Value::List(
        list.choose_multiple(ctx.rng(), n).cloned().collect(),
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sitefilters_filter_types::{ContextView, Error, IValue, Value};

    use crate::{dispatch_filter, Config, Context};

    fn apply(name: &str, value: serde_json::Value, args: Vec<IValue>) -> Result<IValue, Error> {
        dispatch_filter(name, value.into(), args, &mut Context::new())
    }

    fn ok(name: &str, value: serde_json::Value, args: Vec<IValue>) -> IValue {
        apply(name, value, args).expect("filter should succeed")
    }

    #[test]
    fn test_where() {
        let items = json!([
            {"type": "x", "id": 1},
            {"type": "y", "id": 2},
            {"type": ["z", "x"], "id": 3},
            {"id": 4},
            {"type": 1, "id": 5},
        ]);

        assert_eq!(
            ok("where", items.clone(), vec!["type".into(), "x".into()]).path("size"),
            IValue::Int(2)
        );
        assert_eq!(
            ok("where", items.clone(), vec!["type".into(), IValue::Int(1)]),
            IValue::from(json!([{"type": 1, "id": 5}]))
        );
        assert_eq!(
            ok("where", items.clone(), vec!["type".into(), Value::Null]),
            IValue::from(items)
        );
        assert_eq!(ok("where", json!("text"), vec!["a".into(), "b".into()]), "text".into());
    }

    #[test]
    fn test_where_structure_values() {
        let items = json!({"a": {"on": true}, "b": {"on": false}});
        assert_eq!(
            ok("where", items, vec!["on".into(), "true".into()]),
            IValue::from(json!([{"on": true}]))
        );
    }

    #[test]
    fn test_where_memoized() {
        let mut ctx = Context::new();
        let items = IValue::from(json!([{"k": "a"}, {"k": "b"}]));
        let args = || vec![IValue::from("k"), IValue::from("a")];

        let first = dispatch_filter("where", items.clone(), args(), &mut ctx);
        let second = dispatch_filter("where", items.clone(), args(), &mut ctx);
        assert_eq!(first.ok(), second.ok());

        let cache = ctx.where_cache().expect("cache is on by default");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);

        let mut uncached = Context::with_config(Config {
            cache_where: false,
            ..Config::default()
        });
        let result = dispatch_filter("where", items, args(), &mut uncached);
        assert_eq!(result.ok(), Some(IValue::from(json!([{"k": "a"}]))));
    }

    #[test]
    fn test_where_exp() {
        let items = json!([{"n": 1}, {"n": 2}, {"n": 3}]);
        assert_eq!(
            ok("where_exp", items.clone(), vec!["item".into(), "item.n > 1".into()]),
            IValue::from(json!([{"n": 2}, {"n": 3}]))
        );
        assert_eq!(
            ok("where_exp", items.clone(), vec!["item".into(), "item.n == 4".into()]),
            IValue::List(vec![])
        );

        let err = apply("where_exp", items, vec!["item".into(), "item.n >".into()]);
        assert!(err.is_err());
    }

    #[test]
    fn test_sort() {
        assert_eq!(ok("sort", json!([3, 1.5, 2]), vec![]), json!([1.5, 2, 3]).into());
        assert_eq!(ok("sort", json!(["b", "a"]), vec![]), json!(["a", "b"]).into());

        let items = json!([{"n": 2}, {}, {"n": 1}]);
        assert_eq!(
            ok("sort", items.clone(), vec!["n".into()]),
            json!([{}, {"n": 1}, {"n": 2}]).into()
        );
        assert_eq!(
            ok("sort", items.clone(), vec!["n".into(), "first".into()]),
            json!([{}, {"n": 1}, {"n": 2}]).into()
        );
        assert_eq!(
            ok("sort", items, vec!["n".into(), "last".into()]),
            json!([{"n": 1}, {"n": 2}, {}]).into()
        );
    }

    #[test]
    fn test_sort_is_stable() {
        let items = json!([
            {"k": 1, "id": "a"},
            {"k": 0, "id": "b"},
            {"k": 1, "id": "c"},
            {"k": 0, "id": "d"},
        ]);
        let sorted = ok("sort", items, vec!["k".into()]);
        let ids = (0..4)
            .map(|i| sorted.path(&format!("{i}.id")).to_text().into_owned())
            .collect::<String>();
        assert_eq!(ids, "bdac");
    }

    #[test]
    fn test_sort_errors() {
        let err = apply("sort", json!([{"n": 1}]), vec!["n".into(), "middle".into()])
            .expect_err("invalid nils");
        assert!(matches!(err.root(), Error::Argument { .. }));
        assert_eq!(
            err.root().to_string(),
            "Invalid nils order: 'middle' is not a valid nils order. It must be 'first' or 'last'."
        );

        let err = apply("sort", json!([1, "a"]), vec![]).expect_err("mixed types");
        assert!(err.root().to_string().starts_with("comparison of"));

        let err = apply("sort", json!(null), vec![]).expect_err("null input");
        assert_eq!(err.root().to_string(), "Cannot sort a null object.");
    }

    #[test]
    fn test_sort_mixed_lists_error() {
        for len in 2..40 {
            let list = (0..len)
                .map(|i| if i % 3 == 2 { json!("s") } else { json!(len - i) })
                .collect::<Vec<_>>();
            let expect_err = len > 2;

            let result = apply("sort", json!(list), vec![]);
            assert_eq!(result.is_err(), expect_err, "length {len}");

            let posts = list.into_iter().map(|n| json!({"n": n})).collect();
            let result = apply("sort", serde_json::Value::Array(posts), vec!["n".into()]);
            assert_eq!(result.is_err(), expect_err, "length {len}");
        }

        let nan = IValue::List(vec![IValue::Int(1), IValue::Float(f64::NAN), IValue::Int(0)]);
        let err = dispatch_filter("sort", nan, vec![], &mut Context::new()).expect_err("NaN");
        assert!(matches!(err.root(), Error::Argument { .. }));
    }

    #[test]
    fn test_pop_and_shift() {
        assert_eq!(ok("pop", json!([1, 2, 3]), vec![]), json!([1, 2]).into());
        assert_eq!(ok("pop", json!([1, 2, 3]), vec![IValue::Int(2)]), json!([1]).into());
        assert_eq!(ok("pop", json!([1, 2, 3]), vec!["5".into()]), json!([]).into());
        assert_eq!(ok("shift", json!([1, 2, 3]), vec![]), json!([2, 3]).into());
        assert_eq!(ok("shift", json!([1, 2, 3]), vec![IValue::Int(2)]), json!([3]).into());
        assert_eq!(ok("shift", json!([1]), vec![IValue::Int(4)]), json!([]).into());
        assert_eq!(ok("pop", json!("abc"), vec![]), "abc".into());

        for n in [IValue::Int(-1), IValue::from("two")] {
            let err = apply("pop", json!([1]), vec![n.clone()]).expect_err("bad count");
            assert!(matches!(err.root(), Error::Argument { .. }));
            let err = apply("shift", json!([1]), vec![n]).expect_err("bad count");
            assert!(matches!(err.root(), Error::Argument { .. }));
        }
    }

    #[test]
    fn test_push_and_unshift() {
        assert_eq!(ok("push", json!([1]), vec![IValue::Int(2)]), json!([1, 2]).into());
        assert_eq!(ok("unshift", json!([1]), vec![IValue::Int(0)]), json!([0, 1]).into());
        assert_eq!(
            ok("push", json!([]), vec![IValue::from(json!({"a": 1}))]),
            json!([{"a": 1}]).into()
        );
        assert_eq!(ok("unshift", json!({"a": 1}), vec![IValue::Int(0)]), json!({"a": 1}).into());
    }

    fn seeded() -> Context {
        Context::with_config(Config {
            seed: Some(42),
            ..Config::default()
        })
    }

    #[test]
    fn test_sample() {
        let items = IValue::from(json!([1, 2, 3, 4, 5]));
        let sample = |args: Vec<IValue>| {
            let a = dispatch_filter("sample", items.clone(), args.clone(), &mut seeded());
            let b = dispatch_filter("sample", items.clone(), args, &mut seeded());
            let a = a.expect("sample does not fail");
            assert_eq!(Some(&a), b.as_ref().ok());
            a
        };

        let one = sample(vec![]);
        assert!(matches!(one, Value::Int(1..=5)));

        let three = sample(vec![IValue::Int(3)]);
        let Value::List(three) = three else {
            panic!("expected a list, got {three}");
        };
        assert_eq!(three.len(), 3);
        for (i, x) in three.iter().enumerate() {
            assert!(!three[i + 1..].contains(x), "{x} sampled twice");
        }

        assert_eq!(sample(vec![IValue::Int(0)]), IValue::List(vec![]));
        assert!(matches!(sample(vec![IValue::Int(9)]), Value::List(l) if l.len() == 5));
        assert!(matches!(sample(vec!["lots".into()]), Value::Int(_)));
        assert!(matches!(sample(vec![IValue::Int(-2)]), Value::Int(_)));
    }

    #[test]
    fn test_sample_edges() {
        let mut ctx = seeded();
        let empty = dispatch_filter("sample", IValue::List(vec![]), vec![], &mut ctx);
        assert_eq!(empty.ok(), Some(Value::Null));

        let text = dispatch_filter("sample", "abc".into(), vec![], &mut ctx);
        assert_eq!(text.ok(), Some("abc".into()));
    }
}
