#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
//! API types for making template filters for `sitefilters`.
//!
//! # Value
//!
//! This crate provides the value type [`Value`] and its filter extension
//! [`Item`] (see [`IValue`]), which adds dates and host [`Object`]s.  Also
//! provides the trait [`TryFromValue`] to unwrap a [`Value`] to a type it's
//! implemented for.
//!
//! # Errors
//!
//! Provides the [`Error`] enum to handle and create errors, including other
//! Rust errors with [`other!`], [`MessageExt`] and [`WrapExt`].
//!
//! # Context
//!
//! Provides the [`ContextView`] trait, the capabilities a filter may use from
//! the template engine rendering it: variable lookup, expression evaluation,
//! the per-render [`WhereCache`], randomness and the local time zone.
//!
//! # Filters
//!
//! Provides the typed [`Filter`] trait and object-safe [`FilterDyn`] one, as well
//! as the [`filter_fn`] macro for easily implementing a typed [`Filter`] on a
//! function.

#[macro_use]
mod error;
mod context;
mod filter;
mod value;

pub use context::{Bindings, ContextView, WhereCache};
pub use error::{Error, MessageExt, Result, WrapExt};
pub use filter::{filter_fn, Args, Filter, FilterDyn};
pub use value::{
    Data, IValue, Item, Object, Structure, TryFromValue, Value, ValueKey, DATE_TEXT_FORMAT,
};
