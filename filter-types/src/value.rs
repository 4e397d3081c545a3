#![allow(clippy::enum_glob_use)]
use std::{
    borrow::Cow,
    cmp::Ordering,
    collections::BTreeMap,
    convert::Infallible,
    fmt,
    hash::{Hash, Hasher},
    mem,
    sync::Arc,
};

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::{Error, Result};

/// Type alias representing a key-value structure of [`Value`]
pub type Structure<T> = BTreeMap<Arc<str>, Value<T>>;

/// Format used for the text form of a date.
pub const DATE_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Trait for attempting to unwrap a [`Value`] into a concrete type.
pub trait TryFromValue<T>: Sized {
    /// Try to unwrap a [`Value`] variant into an instance of type `Self`.
    ///
    /// # Errors
    ///
    /// Implementors should return an `Err` if the input value cannot be unwrapped
    /// into `Self.`
    fn try_from_value(value: Value<T>) -> Result<Self>;
    /// Try to unwrap a [`Option<Value>`] into `Self`.  The default implementation
    /// is often sufficient, but sometimes it is helpful to be able to express
    /// this.
    ///
    /// # Errors
    ///
    /// Implementors should return an `Err` if the input value cannot be unwrapped
    /// into `Self.`
    fn try_from_option(value: Option<Value<T>>) -> Result<Self> {
        match value {
            Some(value) => Self::try_from_value(value),
            None => bail!("Expected a value, found nothing."),
        }
    }
}

/// A variant-typed value of any type of value that can flow through a filter.
///
/// # Extension Type
///
/// It is possible to store other fields in the `Extra` variant of this enum, by
/// changing the type parameter `T`.  The filters use the [`Item`] extension
/// (see [`IValue`]), which adds dates and host objects.  [`Data`] (never type,
/// no extra) marks plain, JSON-representable data.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value<T = Data> {
    /// A value of `null`.
    #[serde(serialize_with = "serialize_null_as_option")]
    Null,
    /// A floating-point value.
    Float(f64),
    /// A signed integer value.
    Int(i64),
    /// A boolean value.  Note that this is distinct from the integer type.
    Bool(bool),
    /// A UTF-8 string value, stored as an `Arc<str>` for cheaper cloning.
    String(Arc<str>),
    /// A list of other values, not necessarily of the same type.
    List(Vec<Value<T>>),
    /// A String-value nested mapping of values.
    Structure(Structure<T>),
    /// Any extensions variants to this type.  See the main struct for more.
    Extra(T),
}

/// Helper trait to implement [`TryFromValue<T>`] on all [`Value<X>`] for T if T is a
/// common data type that doesn't depend on X.
trait TryFromData: Sized {
    fn try_from_data<X: fmt::Display>(value: Value<X>) -> Result<Self>;
}

macro_rules! generate_impls {
    ($($variant:ident ($ty:ty)$(,)?)*) => {
        $(
            impl TryFromData for $ty {
                fn try_from_data<X: fmt::Display>(value: Value<X>) -> Result<Self> {
                    let Value::$variant(x) = value else {
                        bail!("expected a {}, got {}", stringify!($variant), value);
                    };
                    Ok(x)
                }

            }
            impl <X> From<$ty> for Value<X> {
                #[inline]
                fn from(x: $ty) -> Self {
                    Self::$variant(x)
                }
            }
        )*
    };
}

generate_impls! {
    Float(f64),
    Int(i64),
    Bool(bool),
    String(Arc<str>),
}

impl<X> Value<X> {
    /// Returns `true` if this is `Value::Null`.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// A short name for the variant of this value, for use in messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Float(_) => "float",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Structure(_) => "structure",
            Self::Extra(_) => "extra",
        }
    }
}

impl<T: TryFromData, X: fmt::Display> TryFromValue<X> for T {
    fn try_from_value(value: Value<X>) -> Result<Self> {
        T::try_from_data(value)
    }
}

/// The default extension for a [`Value`], marking that it is not possible to
/// have a `Value::Extra` variant.
#[allow(unreachable_code)]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Data(Infallible);

impl Serialize for Data {
    fn serialize<S>(&self, _: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.0 {}
    }
}

impl fmt::Display for Data {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {}
    }
}

/// A host value that exposes properties by name, like a page or a post
/// handed to the template by a site generator.
///
/// Implementors are compared by identity: two [`Item::Object`]s are equal
/// only when they point to the same allocation.
pub trait Object: fmt::Debug + fmt::Display + Send + Sync {
    /// Looks up the property `key`, returning `None` if it is not present.
    fn get(&self, key: &str) -> Option<IValue>;

    /// Converts this object into a plain value for serialization.
    ///
    /// This may return another [`Item::Object`], which is converted in turn.
    /// Returning this same object again stops the conversion, and the
    /// object's [`Display`](fmt::Display) form is used instead.
    fn to_value(&self) -> IValue;
}

/// [`Value`] flowing through a filter pipeline.
pub type IValue = Value<Item>;

/// Extension to hold the non-data values a filter can see.
#[derive(Debug, Clone)]
pub enum Item {
    /// An instant with its UTC offset.
    Date(DateTime<FixedOffset>),
    /// A host object with property lookup.
    Object(Arc<dyn Object>),
}

impl Item {
    /// Whether two object references point to the same allocation.
    #[inline]
    #[must_use]
    pub fn same_object(a: &Arc<dyn Object>, b: &Arc<dyn Object>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Self::same_object(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format(DATE_TEXT_FORMAT)),
            Self::Object(object) => write!(f, "{object}"),
        }
    }
}

impl Serialize for Item {
    fn serialize<S>(&self, se: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Date(date) => se.collect_str(&date.format(DATE_TEXT_FORMAT)),
            Self::Object(_) => Value::Extra(self.clone()).to_data().serialize(se),
        }
    }
}

impl From<DateTime<FixedOffset>> for IValue {
    #[inline]
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::Extra(Item::Date(value))
    }
}

impl From<Arc<dyn Object>> for IValue {
    #[inline]
    fn from(value: Arc<dyn Object>) -> Self {
        Self::Extra(Item::Object(value))
    }
}

impl IValue {
    /// Wraps a host object into a value.
    #[must_use]
    pub fn object<O: Object + 'static>(object: O) -> Self {
        Self::Extra(Item::Object(Arc::new(object)))
    }

    /// The variant name of this value, naming dates and objects instead of
    /// `extra`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Extra(Item::Date(_)) => "date",
            Self::Extra(Item::Object(_)) => "object",
            other => other.type_name(),
        }
    }

    /// Converts this value into plain data.
    ///
    /// Dates become their text form.  Objects are converted with
    /// [`Object::to_value`]; a conversion that yields the same object again
    /// stops there and uses the object's display form.
    #[must_use]
    pub fn to_data(&self) -> Value {
        use Value::*;

        match self {
            Null => Null,
            Float(f) => Float(*f),
            Int(i) => Int(*i),
            Bool(b) => Bool(*b),
            String(s) => String(Arc::clone(s)),
            List(l) => List(l.iter().map(Self::to_data).collect()),
            Structure(s) => Structure(
                s.iter()
                    .map(|(k, v)| (Arc::clone(k), v.to_data()))
                    .collect(),
            ),
            Extra(Item::Date(_)) => String(self.to_text().into()),
            Extra(Item::Object(object)) => match object.to_value() {
                Extra(Item::Object(converted)) if Item::same_object(&converted, object) => {
                    String(object.to_string().into())
                }
                converted => converted.to_data(),
            },
        }
    }

    /// Looks up a single property `key` of this value.
    ///
    /// - `Structure`s by key, or `size` for the number of entries
    /// - `List`s by index, `first`, `last`, or `size`
    /// - `String`s by `size`, the number of characters
    /// - `Object`s with [`Object::get`]
    #[must_use]
    pub fn property(&self, key: &str) -> Option<Self> {
        match self {
            Self::Structure(s) => match s.get(key) {
                Some(v) => Some(v.clone()),
                None if key == "size" => Some(Self::Int(len_as_int(s.len()))),
                None => None,
            },
            Self::List(l) => match key {
                "first" => l.first().cloned(),
                "last" => l.last().cloned(),
                "size" => Some(Self::Int(len_as_int(l.len()))),
                _ => key.parse::<usize>().ok().and_then(|i| l.get(i).cloned()),
            },
            Self::String(s) if key == "size" => Some(Self::Int(len_as_int(s.chars().count()))),
            Self::Extra(Item::Object(object)) => object.get(key),
            _ => None,
        }
    }

    /// Follows a dot-separated property `path` (e.g., `author.name`) through
    /// this value.  Any missing step yields `Null`.
    #[must_use]
    pub fn path(&self, path: &str) -> Self {
        let mut keys = path.split('.');
        let Some(first) = keys.next().and_then(|key| self.property(key)) else {
            return Self::Null;
        };

        keys.try_fold(first, |value, key| value.property(key))
            .unwrap_or(Self::Null)
    }

    /// Compares two values in their natural order.
    ///
    /// Numbers compare numerically (across `Int` and `Float`), strings by
    /// bytes, `false < true`, dates by instant, lists element-wise, and
    /// `null` equals `null`.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Argument`] when the two values have no order
    /// between them, e.g., a string and an int.
    pub fn natural_cmp(&self, other: &Self) -> Result<Ordering> {
        use Value::*;

        let ordering = match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Int(a), Float(b)) => (!b.is_nan()).then(|| cmp_int_float(*a, *b)),
            (Float(a), Int(b)) => (!a.is_nan()).then(|| cmp_int_float(*b, *a).reverse()),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Extra(Item::Date(a)), Extra(Item::Date(b))) => Some(a.cmp(b)),
            (List(a), List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.natural_cmp(y)? {
                        Ordering::Equal => continue,
                        unequal => return Ok(unequal),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        };

        ordering.ok_or_else(|| {
            Error::argument(format!(
                "comparison of {} with {} failed",
                self.kind(),
                other.kind()
            ))
        })
    }

    /// A total order over all values, which agrees with
    /// [`natural_cmp`](Self::natural_cmp) wherever that succeeds.
    ///
    /// Values of different kinds order by kind (`null`, bools, numbers,
    /// strings, dates, lists, structures, then objects).  `NaN`s go to the
    /// ends of the numbers, structures compare entry by entry, and objects
    /// by address.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        use Value::*;

        match (self, other) {
            (Int(a), Int(b)) => a.cmp(b),
            (Int(a), Float(b)) => cmp_int_float(*a, *b),
            (Float(a), Int(b)) => cmp_int_float(*b, *a).reverse(),
            (Float(a), Float(b)) => a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b)),
            (String(a), String(b)) => a.cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Extra(Item::Date(a)), Extra(Item::Date(b))) => a.cmp(b),
            (List(a), List(b)) => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Structure(a), Structure(b)) => a
                .iter()
                .zip(b)
                .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| va.total_cmp(vb)))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Extra(Item::Object(a)), Extra(Item::Object(b))) => {
                Arc::as_ptr(a).cast::<()>().cmp(&Arc::as_ptr(b).cast::<()>())
            }
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }

    const fn kind_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::String(_) => 3,
            Self::Extra(Item::Date(_)) => 4,
            Self::List(_) => 5,
            Self::Structure(_) => 6,
            Self::Extra(Item::Object(_)) => 7,
        }
    }
}

impl<X: fmt::Display> Value<X> {
    /// The text form of this value, as it would be written into a template.
    ///
    /// `null` is the empty string, strings are unquoted, floats always keep a
    /// fractional digit, and lists are the concatenation of their elements.
    #[must_use]
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed(""),
            Self::String(s) => Cow::Borrowed(s),
            Self::Int(n) => Cow::Owned(n.to_string()),
            Self::Float(x) => Cow::Owned(format_float(*x)),
            Self::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Self::List(l) => Cow::Owned(l.iter().map(|x| x.to_text()).collect()),
            Self::Structure(_) => Cow::Owned(self.to_string()),
            Self::Extra(t) => Cow::Owned(t.to_string()),
        }
    }
}

/// Compares an int with a float exactly.  A negative `NaN` is below every
/// int and any other `NaN` above.
#[allow(clippy::cast_possible_truncation)]
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    // 2^63, exactly representable
    const BOUND: f64 = 9_223_372_036_854_775_808.0;

    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if f >= BOUND {
        return Ordering::Less;
    }
    if f < -BOUND {
        return Ordering::Greater;
    }

    let whole = f.trunc();
    i.cmp(&(whole as i64)).then_with(|| {
        let fract = f - whole;
        if fract > 0.0 {
            Ordering::Less
        } else if fract < 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

#[allow(clippy::cast_possible_wrap)]
#[inline]
const fn len_as_int(len: usize) -> i64 {
    len as i64
}

/// Formats a float so it is never mistaken for an integer (`1.0`, not `1`).
fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// Helper function to serialize `Value::Null` as `Option::None`, which is understood
/// as a null value by e.g., `serde_json`.
#[inline]
fn serialize_null_as_option<S: serde::Serializer>(se: S) -> core::result::Result<S::Ok, S::Error> {
    None::<()>.serialize(se)
}

/// A debugging representation: strings are quoted, lists are `[a, b]` and
/// structures are `{"key": value}`.
impl<T: fmt::Display> fmt::Display for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{}", format_float(*x)),
            Self::Bool(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "{:?}", &**s),
            Self::List(ls) => {
                write!(f, "[")?;
                for (i, x) in ls.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            Self::Structure(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {v}", &**k)?;
                }
                write!(f, "}}")
            }
            Self::Extra(t) => write!(f, "{t}"),
        }
    }
}

impl<T, X> From<Option<T>> for Value<X>
where
    T: Into<Value<X>>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            None => Self::Null,
            Some(x) => x.into(),
        }
    }
}

impl<'a, X> From<&'a str> for Value<X> {
    fn from(value: &'a str) -> Self {
        Self::String(Arc::from(value))
    }
}

impl<X> From<String> for Value<X> {
    fn from(value: String) -> Self {
        Self::String(Arc::from(value))
    }
}

impl<X> From<Vec<Value<X>>> for Value<X> {
    fn from(value: Vec<Value<X>>) -> Self {
        Self::List(value)
    }
}

/// Numbers become `Int` when they fit an `i64`, otherwise `Float`.
impl<X> From<serde_json::Value> for Value<X> {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match value {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Self::String(s.into()),
            Json::Array(a) => Self::List(a.into_iter().map(Self::from).collect()),
            Json::Object(o) => Self::Structure(
                o.into_iter()
                    .map(|(k, v)| (Arc::from(k), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl<X> Value<X> {
    /// Try to unwrap a value that implements [`TryFromValue<X>`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if it is not possible to unwrap `self` to an instance
    /// of type `T`.
    #[inline]
    pub fn try_unwrap<T: TryFromValue<X>>(self) -> Result<T> {
        T::try_from_value(self)
    }
}

impl<X> TryFromValue<X> for Value<X> {
    #[inline]
    fn try_from_value(value: Value<X>) -> Result<Self> {
        Ok(value)
    }

    /// A missing value is `Null`, so filters can take any trailing argument
    /// as optional.
    #[inline]
    fn try_from_option(value: Option<Value<X>>) -> Result<Self> {
        Ok(value.unwrap_or(Value::Null))
    }
}

impl<X, T: TryFromValue<X>> TryFromValue<X> for Option<T> {
    fn try_from_value(value: Value<X>) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::try_from_value(other).map(Some),
        }
    }

    fn try_from_option(value: Option<Value<X>>) -> Result<Self> {
        match value {
            Some(v) => Self::try_from_value(v),
            None => Ok(None),
        }
    }
}

impl TryFromValue<Item> for Vec<IValue> {
    fn try_from_value(value: IValue) -> Result<Self> {
        let Value::List(v) = value else {
            bail!("expected a List, got {value}")
        };
        Ok(v)
    }
}

/// Wrapper to use an [`IValue`] as a hash key.
///
/// Data is hashed and compared by content; objects by identity.
///
/// Unlike [`Value`]'s `PartialEq`, a `NaN` float equals itself here, so every
/// key is equal to itself.
#[derive(Debug, Clone)]
pub struct ValueKey(pub IValue);

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        same_key(&self.0, &other.0)
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state);
    }
}

fn same_key(a: &IValue, b: &IValue) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x == y || x.to_bits() == y.to_bits(),
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_key(x, y))
        }
        (Value::Structure(a), Value::Structure(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|((ka, va), (kb, vb))| ka == kb && same_key(va, vb))
        }
        _ => a == b,
    }
}

fn hash_value<H: Hasher>(value: &IValue, state: &mut H) {
    mem::discriminant(value).hash(state);
    match value {
        Value::Null => (),
        // `0.0 == -0.0`
        Value::Float(x) if *x == 0.0 => 0u64.hash(state),
        Value::Float(x) => x.to_bits().hash(state),
        Value::Int(n) => n.hash(state),
        Value::Bool(b) => b.hash(state),
        Value::String(s) => s.hash(state),
        Value::List(l) => {
            l.len().hash(state);
            for x in l {
                hash_value(x, state);
            }
        }
        Value::Structure(s) => {
            s.len().hash(state);
            for (k, v) in s {
                k.hash(state);
                hash_value(v, state);
            }
        }
        Value::Extra(Item::Date(date)) => {
            date.timestamp().hash(state);
            date.timestamp_subsec_nanos().hash(state);
        }
        Value::Extra(Item::Object(object)) => Arc::as_ptr(object).cast::<()>().hash(state),
    }
}
