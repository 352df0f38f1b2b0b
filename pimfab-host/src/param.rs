// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Component parameter values.
//!
//! The host accepts a flat mapping from parameter name to value. Values are
//! integers, strings or lists of values.

use std::collections::BTreeMap;
use std::fmt;

/// A single parameter value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValue {
    Int(i64),
    UInt(u64),
    Str(String),
    List(Vec<ParamValue>),
}

/// An ordered mapping from parameter name to value.
pub type Params = BTreeMap<String, ParamValue>;

/// Build a [`Params`] mapping.
///
/// ```rust
/// use pimfab_host::params;
/// let p = params! {
///     "node_id" => 0,
///     "clock" => "1.0GHz",
///     "sources" => vec![1, 2],
/// };
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! params {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut p = $crate::param::Params::new();
        $(
            p.insert($key.to_string(), $crate::param::ParamValue::from($value));
        )*
        p
    }};
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::UInt(v) => write!(f, "{v}"),
            ParamValue::Str(s) => write!(f, "{s}"),
            ParamValue::List(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<u8> for ParamValue {
    fn from(v: u8) -> Self {
        ParamValue::UInt(u64::from(v))
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::UInt(u64::from(v))
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        ParamValue::UInt(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::UInt(v as u64)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<&String> for ParamValue {
    fn from(v: &String) -> Self {
        ParamValue::Str(v.clone())
    }
}

impl<T> From<Vec<T>> for ParamValue
where
    T: Into<ParamValue>,
{
    fn from(values: Vec<T>) -> Self {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::param::ParamValue;

    #[test]
    fn display_values() {
        assert_eq!(ParamValue::from(-1).to_string(), "-1");
        assert_eq!(ParamValue::from(0x8000_0000u64).to_string(), "2147483648");
        assert_eq!(ParamValue::from("64 KiB").to_string(), "64 KiB");
        assert_eq!(ParamValue::from(vec![1u32, 2]).to_string(), "[1, 2]");
        assert_eq!(ParamValue::from(Vec::<u32>::new()).to_string(), "[]");
    }

    #[test]
    fn later_keys_override() {
        let mut p = params! { "verbose" => 0, "clock" => "1.0GHz" };
        p.extend(params! { "verbose" => 3 });
        assert_eq!(p.get("verbose"), Some(&ParamValue::Int(3)));
        assert_eq!(p.len(), 2);
    }
}
