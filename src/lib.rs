#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
//! Template filters for static-site content.
//!
//! Every filter is registered by name in [`filter::FILTERS`] and called
//! through [`dispatch_filter`] with the piped value, its positional
//! arguments, and a [`ContextView`] for the render.  [`Context`] is the
//! default context, evaluating embedded expressions with the small
//! [`expression`] dialect.
//!
//! ```
//! use sitefilters::{dispatch_filter, Context, IValue};
//!
//! let mut ctx = Context::new();
//! let items = IValue::from(serde_json::json!(["a", "b", "c"]));
//! let serial = dispatch_filter("array_to_serial", items, vec![], &mut ctx)?;
//!
//! assert_eq!(serial, IValue::from("a, b, and c"));
//! # Ok::<(), sitefilters::Error>(())
//! ```

pub mod context;
pub mod expression;
pub mod filter;

pub use context::{Config, Context, Scopes};
pub use filter::{dispatch_filter, filter_names, FILTERS};
pub use sitefilters_filter_types::{
    bail, filter_fn, other, Args, Bindings, ContextView, Error, Filter, FilterDyn, IValue, Item,
    MessageExt, Object, Result, Structure, TryFromValue, Value, ValueKey, WhereCache, WrapExt,
};
