//! Filters that partition a collection into named groups.
//!
//! Both filters return `[{ name, items, size }, ...]`, one structure per
//! group, in the order each group is first seen.

use std::sync::Arc;

use indexmap::IndexMap;
use sitefilters_filter_types::{filter_fn, ContextView, IValue, Result, Value, ValueKey};

use super::{item_property, items, structure};

fn grouped<K>(groups: IndexMap<K, Vec<IValue>>, name: impl Fn(K) -> IValue) -> IValue {
    Value::List(
        groups
            .into_iter()
            .map(|(key, items)| {
                let size = Value::Int(i64::try_from(items.len()).unwrap_or(i64::MAX));
                structure([
                    ("name", name(key)),
                    ("items", Value::List(items)),
                    ("size", size),
                ])
            })
            .collect(),
    )
}

/// Signature: `value: List | group_by(property: String): List`
///
/// Groups the items by the text form of their value at `property`, a
/// dot-separated path.  Items without the property are grouped under `""`.
/// A structure's values are grouped; any other input is returned unchanged.
///
/// # Examples
///
/// - `[{ k: "a" }, { k: "a" }, { k: "b" }] | group_by: "k"` returns
///   `[{ name: "a", items: [{ k: "a" }, { k: "a" }], size: 2 }, { name: "b", items: [{ k: "b" }], size: 1 }]`
#[filter_fn]
pub fn group_by(value: IValue, property: IValue) -> Result<IValue> {
    let Some(items) = items(&value) else {
        return Ok(value);
    };

    let property = property.to_text();
    let mut groups = IndexMap::<String, Vec<IValue>>::new();
    for item in items {
        let key = item_property(&item, &property).to_text().into_owned();
        groups.entry(key).or_default().push(item);
    }

    Ok(grouped(groups, IValue::from))
}

/// Signature: `value: List | group_by_exp(variable: String, expression: String): List`
///
/// Groups the items by the value of `expression`, evaluated once per item
/// with `variable` bound to the item.  `name` holds the evaluated value
/// itself, so `2019` and `"2019"` are different groups.  The binding does
/// not outlive the call.
///
/// # Examples
///
/// - `posts | group_by_exp: "post", "post.date | date_to_string"` groups posts by day
/// - `[{ n: 1 }, { n: 2 }, { n: 3 }] | group_by_exp: "x", "x.n | to_integer"` returns three
///   groups named `1`, `2`, and `3`
#[filter_fn]
pub fn group_by_exp(
    value: IValue,
    variable: Arc<str>,
    expression: Arc<str>,
    ctx: &mut dyn ContextView,
) -> Result<IValue> {
    let Some(items) = items(&value) else {
        return Ok(value);
    };

    let mut groups = IndexMap::<ValueKey, Vec<IValue>>::new();
    for item in items {
        let key = ctx.evaluate(&variable, item.clone(), &expression)?;
        groups.entry(ValueKey(key)).or_default().push(item);
    }

    Ok(grouped(groups, |key| key.0))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sitefilters_filter_types::{ContextView, IValue};

    use crate::{dispatch_filter, Context};

    #[test]
    fn test_group_by() {
        let items = IValue::from(json!([{"k": "a"}, {"k": "a"}, {"k": "b"}, {"j": 1}]));
        let groups = dispatch_filter("group_by", items, vec!["k".into()], &mut Context::new());

        insta::assert_json_snapshot!(groups.expect("group_by does not fail"), @r###"
        [
          {
            "items": [
              {
                "k": "a"
              },
              {
                "k": "a"
              }
            ],
            "name": "a",
            "size": 2
          },
          {
            "items": [
              {
                "k": "b"
              }
            ],
            "name": "b",
            "size": 1
          },
          {
            "items": [
              {
                "j": 1
              }
            ],
            "name": "",
            "size": 1
          }
        ]
        "###);
    }

    #[test]
    fn test_group_by_nested_property() {
        let items = IValue::from(json!([
            {"author": {"name": "Ann"}},
            {"author": {"name": "Bo"}},
            {"author": {"name": "Ann"}},
        ]));
        let groups = dispatch_filter(
            "group_by",
            items,
            vec!["author.name".into()],
            &mut Context::new(),
        )
        .expect("group_by does not fail");

        assert_eq!(groups.path("0.name"), IValue::from("Ann"));
        assert_eq!(groups.path("0.size"), IValue::Int(2));
        assert_eq!(groups.path("1.name"), IValue::from("Bo"));
    }

    #[test]
    fn test_group_by_passthrough() {
        let result = dispatch_filter(
            "group_by",
            IValue::from("abc"),
            vec!["k".into()],
            &mut Context::new(),
        );
        assert_eq!(result.ok(), Some(IValue::from("abc")));
    }

    #[test]
    fn test_group_by_exp() {
        let mut ctx = Context::new();
        let items = IValue::from(json!([
            {"title": "a", "year": 2019},
            {"title": "b", "year": 2020},
            {"title": "c", "year": 2019},
        ]));

        let groups = dispatch_filter(
            "group_by_exp",
            items,
            vec!["post".into(), "post.year".into()],
            &mut ctx,
        )
        .expect("group_by_exp does not fail");

        assert_eq!(
            groups,
            IValue::from(json!([
                {"name": 2019, "items": [{"title": "a", "year": 2019}, {"title": "c", "year": 2019}], "size": 2},
                {"name": 2020, "items": [{"title": "b", "year": 2020}], "size": 1},
            ]))
        );
        assert_eq!(ContextView::get(&ctx, "post"), None);
    }

    #[test]
    fn test_group_by_exp_error_restores_binding() {
        let mut ctx = Context::new();
        ctx.set("post", IValue::from("outer"));

        let result = dispatch_filter(
            "group_by_exp",
            IValue::from(json!([1, 2])),
            vec!["post".into(), "post | not_a_filter".into()],
            &mut ctx,
        );

        assert!(result.is_err());
        assert_eq!(ctx.get("post"), Some(&IValue::from("outer")));
    }
}
