use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use sitefilters_filter_types::{Bindings, ContextView, IValue, Item, Result, WhereCache};

use crate::expression::{self, Condition, Expression};

/// Options for a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// The UTC offset dates are shown in.  `None` uses the system's local
    /// time zone.
    pub utc_offset: Option<FixedOffset>,
    /// Seed for the random source of `sample`.  `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Whether `where` results are memoized for this render.
    pub cache_where: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            utc_offset: None,
            seed: None,
            cache_where: true,
        }
    }
}

/// A stack of binding scopes, searched innermost first.  Always holds at
/// least the outermost scope.
#[derive(Debug)]
pub struct Scopes(Vec<Bindings<Item>>);

impl Scopes {
    #[must_use]
    pub fn new() -> Self {
        Self(vec![Bindings::new()])
    }

    /// Looks `name` up, starting in the innermost scope.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IValue> {
        self.0.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Binds `name` to `value` in the innermost scope.
    pub fn set(&mut self, name: impl Into<Arc<str>>, value: IValue) {
        if let Some(scope) = self.0.last_mut() {
            scope.set(name, value);
        }
    }

    pub fn push(&mut self) {
        self.0.push(Bindings::new());
    }

    /// Pops the innermost scope.  The outermost scope is never popped.
    pub fn pop(&mut self) {
        if self.0.len() > 1 {
            self.0.pop();
        }
    }

    /// The number of scopes, including the outermost one.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl Default for Scopes {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// The default [`ContextView`]: one render's variables, parsed expressions
/// and `where` results.
#[derive(Debug)]
pub struct Context {
    scopes: Scopes,
    expressions: HashMap<String, Arc<Expression>>,
    conditions: HashMap<String, Arc<Condition>>,
    where_cache: Option<WhereCache>,
    rng: StdRng,
    utc_offset: Option<FixedOffset>,
}

impl Context {
    /// Creates a new [`Context`] with the default [`Config`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            scopes: Scopes::new(),
            expressions: HashMap::new(),
            conditions: HashMap::new(),
            where_cache: config.cache_where.then(WhereCache::new),
            rng: config
                .seed
                .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
            utc_offset: config.utc_offset,
        }
    }

    /// Binds `name` to `value` in the current scope.
    pub fn set(&mut self, name: impl Into<Arc<str>>, value: IValue) {
        self.scopes.set(name, value);
    }

    /// Looks up the variable `name`, innermost scope first.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IValue> {
        self.scopes.get(name)
    }

    #[inline]
    #[must_use]
    pub const fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    /// Runs `f` with `name` bound to `value` in a new scope.  The scope is
    /// popped when `f` returns, whether it succeeded or not.
    ///
    /// # Errors
    ///
    /// Returns the error returned by `f`.
    pub fn scoped<T, F>(&mut self, name: &str, value: IValue, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.scopes.push();
        self.scopes.set(name, value);
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn expression(&mut self, source: &str) -> Result<Arc<Expression>> {
        if let Some(expression) = self.expressions.get(source) {
            return Ok(Arc::clone(expression));
        }

        let expression = Arc::new(expression::parse_value(source)?);
        tracing::trace!(source, "parsed expression");
        self.expressions
            .insert(source.to_owned(), Arc::clone(&expression));
        Ok(expression)
    }

    fn condition(&mut self, source: &str) -> Result<Arc<Condition>> {
        if let Some(condition) = self.conditions.get(source) {
            return Ok(Arc::clone(condition));
        }

        let condition = Arc::new(expression::parse_condition(source)?);
        tracing::trace!(source, "parsed condition");
        self.conditions
            .insert(source.to_owned(), Arc::clone(&condition));
        Ok(condition)
    }
}

impl Default for Context {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ContextView for Context {
    fn get(&self, name: &str) -> Option<IValue> {
        self.scopes.get(name).cloned()
    }

    fn evaluate(&mut self, binding: &str, item: IValue, expression: &str) -> Result<IValue> {
        let expression = self.expression(expression)?;
        self.scoped(binding, item, |ctx| expression.evaluate(ctx))
    }

    fn evaluate_condition(
        &mut self,
        binding: &str,
        item: IValue,
        expression: &str,
    ) -> Result<bool> {
        let condition = self.condition(expression)?;
        self.scoped(binding, item, |ctx| condition.evaluate(ctx))
    }

    fn where_cache(&mut self) -> Option<&mut WhereCache> {
        self.where_cache.as_mut()
    }

    fn rng(&mut self) -> &mut dyn RngCore {
        &mut self.rng
    }

    fn local_offset(&self, instant: DateTime<Utc>) -> FixedOffset {
        self.utc_offset
            .unwrap_or_else(|| *Local.from_utc_datetime(&instant.naive_utc()).offset())
    }
}
