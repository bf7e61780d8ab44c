use std::sync::Arc;
use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

pub type Dict<K = Arc<str>, V = Value> = BTreeMap<K, V>;

/// Any data value a caller can hand to a transformation.
///
/// Values are cheap to clone: strings, arrays, and dictionaries are all
/// reference counted. They (de)serialize untagged, so a `Value` can be read
/// directly out of TOML or JSON.
#[derive(Debug, Default, Serialize, Hash, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Num(Num),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Dict(Arc<Dict>),
}

impl Value {
    pub fn to_null(&self) -> Option<()> {
        match self {
            Value::Null => Some(()),
            _ => None
        }
    }

    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None
        }
    }

    pub fn to_num(&self) -> Option<Num> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None
        }
    }

    pub fn into_str(self) -> Result<Arc<str>, Value> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(self),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None
        }
    }

    pub fn into_vec(self) -> Result<Arc<Vec<Value>>, Value> {
        match self {
            Value::Array(v) => Ok(v),
            _ => Err(self)
        }
    }

    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(v) => Some(&**v),
            _ => None
        }
    }

    pub fn into_dict(self) -> Result<Arc<Dict>, Value> {
        match self {
            Value::Dict(v) => Ok(v),
            _ => Err(self)
        }
    }

    /// Looks up a `.`-separated key through nested dictionaries.
    ///
    /// ```rust
    /// use alembic::dict;
    /// use alembic::value::Value;
    ///
    /// let value = Value::from(dict! {
    ///     "site" => Value::from(dict! { "title" => "Alembic" }),
    /// });
    ///
    /// assert_eq!(value.lookup("site.title").and_then(|v| v.as_str()), Some("Alembic"));
    /// assert!(value.lookup("site.missing").is_none());
    /// assert_eq!(value.lookup(""), Some(&value));
    /// ```
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        if key.is_empty() {
            return Some(self);
        }

        key.split('.').try_fold(self, |value, attr| value.as_dict()?.get(attr))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Dict(_) => "dict",
        }
    }
}

macro_rules! impl_from_primitive {
    ($($T:ty),+ => $E:ident::$kind:ident) => {
        $(
            impl From<$T> for $E {
                fn from(value: $T) -> Self {
                    $E::$kind(value.into())
                }
            }
        )+
    };
}

impl_from_primitive!(bool => Value::Bool);
impl_from_primitive!(&str => Value::String);
impl_from_primitive!(std::borrow::Cow<'_, str> => Value::String);
impl_from_primitive!(String => Value::String);
impl_from_primitive!(Arc<str> => Value::String);
impl_from_primitive!(Arc<Vec<Value>> => Value::Array);
impl_from_primitive!(Arc<Dict> => Value::Dict);
impl_from_primitive!(u8, u16, u32, u64, u128, usize => Value::Num);
impl_from_primitive!(i8, i16, i32, i64, i128, isize => Value::Num);
impl_from_primitive!(f32, f64 => Value::Num);

impl From<()> for Value  {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T> From<Option<T>> for Value where Value: From<T> {
    fn from(value: Option<T>) -> Self {
        value.map(Value::from).unwrap_or(Value::Null)
    }
}

impl<T> From<Vec<T>> for Value where Value: From<T> {
    fn from(value: Vec<T>) -> Self {
        value.into_iter()
            .map(Value::from)
            .collect()
    }
}

impl<K, V> From<Dict<K, V>> for Value where Arc<str>: From<K>, Value: From<V> {
    fn from(value: Dict<K, V>) -> Self {
        let dict = value.into_iter()
            .map(|(k, v)| (<Arc::<str>>::from(k), Value::from(v)))
            .collect::<Dict>();

        Value::Dict(Arc::new(dict))
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        let vec = iter.into_iter().collect::<Vec<Value>>();
        Value::Array(Arc::from(vec))
    }
}

/// An integer of any width, or a float.
///
/// Numbers compare by mathematical value, not by representation: `10i32 ==
/// 10u64` and `2.0f64 == 2u8`. Floats are totally ordered: `NaN` sorts above
/// every other number.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Num {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    USize(usize),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    ISize(isize),
    F64(f64),
}

/// The comparison form of a [`Num`]: integral floats collapse to integers.
#[derive(Clone, Copy)]
enum Canonical {
    Neg(i128),
    Pos(u128),
    Float(f64),
}

impl Num {
    /// The exact integer value of `self`: `Ok` when non-negative, `Err` when
    /// negative. `None` for floats that are fractional, infinite, `NaN`, or
    /// out of range.
    pub fn to_integer(self) -> Option<Result<u128, i128>> {
        let signed = match self {
            Num::U8(v) => return Some(Ok(v as u128)),
            Num::U16(v) => return Some(Ok(v as u128)),
            Num::U32(v) => return Some(Ok(v as u128)),
            Num::U64(v) => return Some(Ok(v as u128)),
            Num::U128(v) => return Some(Ok(v)),
            Num::USize(v) => return Some(Ok(v as u128)),
            Num::I8(v) => v as i128,
            Num::I16(v) => v as i128,
            Num::I32(v) => v as i128,
            Num::I64(v) => v as i128,
            Num::I128(v) => v,
            Num::ISize(v) => v as i128,
            Num::F64(v) if v.fract() != 0.0 => return None,
            Num::F64(v) if v >= 0.0 && v < u128::MAX as f64 => return Some(Ok(v as u128)),
            Num::F64(v) if v < 0.0 && v >= i128::MIN as f64 => v as i128,
            Num::F64(_) => return None,
        };

        match u128::try_from(signed) {
            Ok(v) => Some(Ok(v)),
            Err(_) => Some(Err(signed)),
        }
    }

    /// The value of `self` as the nearest `f64`.
    pub fn to_f64(self) -> f64 {
        match (self, self.to_integer()) {
            (Num::F64(v), _) => v,
            (_, Some(Ok(v))) => v as f64,
            (_, Some(Err(v))) => v as f64,
            (_, None) => f64::NAN,
        }
    }

    fn canonical(self) -> Canonical {
        match self.to_integer() {
            Some(Ok(v)) => Canonical::Pos(v),
            Some(Err(v)) => Canonical::Neg(v),
            None => Canonical::Float(self.to_f64()),
        }
    }
}

impl PartialEq for Num {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Num { }

impl std::hash::Hash for Num {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self.canonical() {
            Canonical::Pos(v) => v.hash(state),
            Canonical::Neg(v) => v.hash(state),
            Canonical::Float(v) => v.to_bits().hash(state),
        }
    }
}

impl PartialOrd for Num {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Num {
    /// ```rust
    /// use alembic::value::Num;
    ///
    /// assert!(Num::from(-1i8) < Num::from(0u8));
    /// assert!(Num::from(-0i8) == Num::from(0u8));
    /// assert!(Num::from(10i32) == Num::from(10u64));
    /// assert!(Num::from(-2i8) > Num::from(-3i8));
    /// assert!(Num::from(5u32) > Num::from(-1i64));
    /// assert!(Num::from(2.0) == Num::from(2u8));
    /// assert!(Num::from(1.5) > Num::from(1u8) && Num::from(1.5) < Num::from(2i64));
    /// assert!(Num::from(-0.5) < Num::from(0u8));
    /// assert!(Num::from(f64::NAN) > Num::from(f64::INFINITY));
    /// ```
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering::*;

        match (self.canonical(), other.canonical()) {
            (Canonical::Pos(a), Canonical::Pos(b)) => a.cmp(&b),
            (Canonical::Neg(a), Canonical::Neg(b)) => a.cmp(&b),
            (Canonical::Pos(_), Canonical::Neg(_)) => Greater,
            (Canonical::Neg(_), Canonical::Pos(_)) => Less,
            (Canonical::Float(a), Canonical::Float(b)) => a.total_cmp(&b),
            // A float that is not integral never equals an integer; ties only
            // come from rounding the integer, which sits below the float.
            (Canonical::Float(a), _) => a.total_cmp(&other.to_f64()).then(Greater),
            (_, Canonical::Float(b)) => self.to_f64().total_cmp(&b).then(Less),
        }
    }
}

macro_rules! impl_from_for_num_value {
    ($($T:ty: $V:ident),* $(,)?) => ($(
        impl From<$T> for Num {
            fn from(value: $T) -> Num {
                Num::$V(value.into())
            }
        }
    )*)
}

impl_from_for_num_value! {
    u8: U8, u16: U16, u32: U32, u64: U64, u128: U128, usize: USize,
    i8: I8, i16: I16, i32: I32, i64: I64, i128: I128, isize: ISize,
    f32: F64, f64: F64,
}

macro_rules! impl_try_from_value {
    ($($T:ty),+ => | $v:ident | $e:expr) => {
        $(
            impl TryFrom<$crate::value::Value> for $T {
                type Error = Value;

                fn try_from($v: $crate::value::Value) -> Result<Self, Self::Error> {
                    $e
                }
            }
        )+
    };
}

impl_try_from_value!(() => |v| v.to_null().ok_or(v));
impl_try_from_value!(bool => |v| v.to_bool().ok_or(v));
impl_try_from_value!(Arc<str> => |v| v.into_str());
impl_try_from_value!(Arc<Dict> => |v| v.into_dict());
impl_try_from_value!(Num => |v| v.to_num().ok_or(v));

impl_try_from_value!(u8, u16, u32, u64, u128, usize =>
    |v| v.to_num().and_then(|n| n.to_integer()?.ok()?.try_into().ok()).ok_or(v));

impl_try_from_value!(i8, i16, i32, i64, i128, isize => |v| {
    let signed = v.to_num().and_then(|n| match n.to_integer()? {
        Ok(u) => i128::try_from(u).ok(),
        Err(i) => Some(i),
    });

    signed.and_then(|i| i.try_into().ok()).ok_or(v)
});

impl_try_from_value!(f64 => |v| v.to_num().map(Num::to_f64).ok_or(v));

impl<T: TryFrom<Value, Error = Value>> TryFrom<Value> for Vec<T> {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let arc = value.into_vec()?;
        match Arc::try_unwrap(arc) {
            Ok(vec) => vec.into_iter().map(|v| v.try_into()).collect(),
            Err(arc) => arc.iter().cloned().map(|v| v.try_into()).collect()
        }
    }
}
