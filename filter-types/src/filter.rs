use super::{
    value::{IValue, Item, TryFromValue},
    ContextView, Result,
};

pub use sitefilters_filter_proc_macro::{filter_fn, Args};

/// Typed arguments for a [`Filter`].
///
/// Arguments are positional, the way they are written in a template
/// (`value | name: a, b`).  If all the fields in the struct implement
/// [`TryFromValue<Item>`], it is easier to use the derive macro [`Args`],
/// but this can also be implemented manually if you need to express more
/// custom deserializing logic.
///
/// [`Args`](sitefilters_filter_proc_macro::Args)
pub trait Args: Sized {
    /// Try to deserialize the typed arguments from the given `args`.
    ///
    /// # Errors
    ///
    /// The arguments are invalid to deserialize to this structure.
    fn try_deserialize(args: Vec<IValue>) -> Result<Self>;
}

impl Args for () {
    fn try_deserialize(args: Vec<IValue>) -> Result<Self> {
        if !args.is_empty() {
            bail!("expected no arguments, found {}", args.len());
        }

        Ok(())
    }
}

/// A typed filter, callable with the given arguments in `apply`.
///
/// The easiest way to create this is with [`filter_fn`](sitefilters_filter_proc_macro::filter_fn).
///
/// However, it can be implemented manually if necessary.
pub trait Filter {
    /// The `value` type; the type of the input value to the filter call in
    /// `value | name: args...`.
    ///
    /// It must implement [`TryFromValue`] for [`Item`] values.  This is implemented
    /// for unwrapped variants of `Value` but you can provide your own implementation on
    /// a newtype if necessary.
    type Value: TryFromValue<Item>;
    /// The type of the arguments for this filter; see [`Args`]
    type Args: Args;

    /// Call this filter with the given `value`, `args`, and `ctx`, returning
    /// the modified value by the filter call or an error.
    ///
    /// # Errors
    ///
    /// An implementor should return `Err` if the filter was called with invalid
    /// arguments, or if the filter cannot be called for some reason.
    fn apply(value: Self::Value, args: Self::Args, ctx: &mut dyn ContextView) -> Result<IValue>;
}

/// An object-safe version of [`Filter`]. All `F: Filter` implement this trait,
/// so prefer implementing `Filter` unless you must:
///
/// 1. Deserialize the input [`IValue`] in a custom way (not using [`TryFromValue`])
/// 2. Use custom arg-deserializing logic (but often you will be able to implement
///    [`Args`] manually instead, and still get the typed guarantees of [`Filter`])
/// 3. Use the `&self` reference.  Filters are shared between every render and
///    must be `Send + Sync`, so per-render state belongs in the [`ContextView`].
pub trait FilterDyn {
    /// Call this filter with the given `value`, `args`, and `ctx`.
    ///
    /// # Errors
    ///
    /// Implementors should return an `Err` if the filter call is invalid.
    fn apply(&self, value: IValue, args: Vec<IValue>, ctx: &mut dyn ContextView)
        -> Result<IValue>;
}

impl<F: Filter> FilterDyn for F {
    #[inline]
    fn apply(
        &self,
        value: IValue,
        args: Vec<IValue>,
        ctx: &mut dyn ContextView,
    ) -> Result<IValue> {
        F::apply(value.try_unwrap()?, F::Args::try_deserialize(args)?, ctx)
    }
}
