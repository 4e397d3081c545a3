use std::{collections::BTreeMap, collections::HashMap, sync::Arc};

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use rand::RngCore;
use serde::Serialize;

use crate::{Data, IValue, Result, Value, ValueKey};

/// The host capabilities a filter may call back into while it runs.
///
/// A template engine implements this once per render.  Filters only see it
/// as `&mut dyn ContextView`, so they never depend on a concrete engine.
pub trait ContextView {
    /// Looks up the variable `name` in the enclosing template scope.
    fn get(&self, name: &str) -> Option<IValue>;

    /// Evaluates the value `expression` with `binding` bound to `item` for
    /// the duration of the call.  The binding does not outlive the call,
    /// whether it succeeds or not.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if `expression` does not parse or cannot be evaluated.
    fn evaluate(&mut self, binding: &str, item: IValue, expression: &str) -> Result<IValue>;

    /// Evaluates the condition `expression` with `binding` bound to `item`,
    /// following the same scoping as [`ContextView::evaluate`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if `expression` does not parse or cannot be evaluated.
    fn evaluate_condition(&mut self, binding: &str, item: IValue, expression: &str)
        -> Result<bool>;

    /// The memo table for `where` for this render, if memoization is enabled.
    #[inline]
    fn where_cache(&mut self) -> Option<&mut WhereCache> {
        None
    }

    /// The random source used by `sample`.
    fn rng(&mut self) -> &mut dyn RngCore;

    /// The UTC offset to give a date read without one, like a bare
    /// `2024-03-09`, at the given `instant`.  Defaults to the system's local
    /// time zone.
    #[inline]
    fn local_offset(&self, instant: DateTime<Utc>) -> FixedOffset {
        *Local.from_utc_datetime(&instant.naive_utc()).offset()
    }
}

/// Holds a mapping of named bindings to [`Value`]s.
///
/// Plain [`Data`] by default; the filter context binds [`IValue`]s with
/// `Bindings<Item>`.
#[derive(Debug, Serialize)]
pub struct Bindings<X = Data>(pub BTreeMap<Arc<str>, Value<X>>);

impl<X> Bindings<X> {
    /// Creates a new, empty [`Bindings`] instance.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Gets the binding with name `name`, if it is present.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value<X>> {
        self.0.get(name)
    }

    /// Sets the binding with name `name` to `value`, returning the previous
    /// value bound to that name, if one was present.
    #[inline]
    pub fn set(&mut self, name: impl Into<Arc<str>>, value: Value<X>) -> Option<Value<X>> {
        self.0.insert(name.into(), value)
    }
}

impl<X> Default for Bindings<X> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

type WhereKey = (ValueKey, Arc<str>, ValueKey);

/// Memo table for `where`, keyed by the input collection, the property name
/// and the target value.
///
/// A cache lives for one render.  Inputs are compared by content (host
/// objects by identity), so a hit always returns the result for an equal
/// input.
#[derive(Debug, Default)]
pub struct WhereCache {
    entries: HashMap<WhereKey, IValue>,
    hits: usize,
}

impl WhereCache {
    /// Creates a new, empty [`WhereCache`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached result for `(input, property, target)`, computing
    /// and storing it with `compute` on a miss.
    ///
    /// # Errors
    ///
    /// Returns the error from `compute`; nothing is cached in that case.
    pub fn get_or_try_insert_with<F>(
        &mut self,
        input: &IValue,
        property: &str,
        target: &IValue,
        compute: F,
    ) -> Result<IValue>
    where
        F: FnOnce() -> Result<IValue>,
    {
        let key = (
            ValueKey(input.clone()),
            Arc::from(property),
            ValueKey(target.clone()),
        );

        if let Some(result) = self.entries.get(&key) {
            self.hits += 1;
            tracing::trace!(property, hits = self.hits, "where cache hit");
            return Ok(result.clone());
        }

        let result = compute()?;
        self.entries.insert(key, result.clone());
        Ok(result)
    }

    /// The number of distinct entries stored.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been cached yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The number of lookups answered from the cache.
    #[inline]
    #[must_use]
    pub const fn hits(&self) -> usize {
        self.hits
    }

    /// Drops every cached entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Bindings, WhereCache};
    use crate::{IValue, Item, Value};

    #[test]
    fn test_where_cache_hits_equal_inputs() {
        let mut cache = WhereCache::new();
        let input = IValue::from(json!([{"a": 1}, {"a": 2}]));
        let mut calls = 0;

        for _ in 0..3 {
            let result = cache
                .get_or_try_insert_with(&input, "a", &IValue::Int(1), || {
                    calls += 1;
                    Ok(IValue::from(json!([{"a": 1}])))
                })
                .expect("compute does not fail");
            assert_eq!(result, IValue::from(json!([{"a": 1}])));
        }

        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 2);
    }

    #[test]
    fn test_where_cache_distinguishes_keys() {
        let mut cache = WhereCache::new();
        let input = IValue::from(json!([{"a": 1}]));

        let _ = cache.get_or_try_insert_with(&input, "a", &IValue::Int(1), || Ok(Value::Null));
        let _ = cache.get_or_try_insert_with(&input, "a", &IValue::from("1"), || Ok(Value::Null));
        let _ = cache.get_or_try_insert_with(&input, "b", &IValue::Int(1), || Ok(Value::Null));

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.hits(), 0);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_where_cache_skips_errors() {
        let mut cache = WhereCache::new();
        let result = cache.get_or_try_insert_with(&Value::Null, "a", &Value::Null, || {
            Err(crate::Error::argument("nope"))
        });

        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_bindings() {
        let mut bindings = Bindings::<Item>::new();
        assert_eq!(bindings.set("x", IValue::Int(1)), None);
        assert_eq!(bindings.set("x", IValue::Int(2)), Some(IValue::Int(1)));
        assert_eq!(bindings.get("x"), Some(&IValue::Int(2)));
        assert_eq!(bindings.get("y"), None);
    }

    #[test]
    fn test_where_cache_hits_nan_targets() {
        let mut cache = WhereCache::new();
        let input = IValue::from(json!([{"a": 1}]));

        for _ in 0..2 {
            let _ = cache.get_or_try_insert_with(&input, "a", &IValue::Float(f64::NAN), || {
                Ok(Value::List(vec![]))
            });
        }

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);
    }
}
