use std::fmt;

use super::ParamError;

/// A converted path parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Path(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Str(s) | Self::Path(s) => f.write_str(s),
            Self::Int(int) => int.fmt(f),
            Self::Float(float) => float.fmt(f),
        }
    }
}

/// Path parameters bound by the router, in template order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: ParamValue) {
        self.entries.push((name.into(), value));
    }

    /// Returns typed parameter `name`.
    pub fn get<T: FromParam>(&self, name: &str) -> Result<T, ParamError> {
        let value = self
            .value(name)
            .ok_or_else(|| ParamError::Missing(name.to_owned()))?;
        T::from_param(value).ok_or_else(|| ParamError::Type {
            name: name.to_owned(),
            expected: T::EXPECTED,
        })
    }

    /// Returns the raw converted value of parameter `name`.
    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A type that can be read from a [`ParamValue`].
pub trait FromParam: Sized {
    /// Name of the expected kind, used in errors.
    const EXPECTED: &'static str;

    fn from_param(value: &ParamValue) -> Option<Self>;
}

impl FromParam for String {
    const EXPECTED: &'static str = "string";

    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Str(s) | ParamValue::Path(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromParam for ParamValue {
    const EXPECTED: &'static str = "value";

    fn from_param(value: &ParamValue) -> Option<Self> {
        Some(value.clone())
    }
}

macro_rules! int_param {
    ($($ty:ty),*) => {
        $(
            impl FromParam for $ty {
                const EXPECTED: &'static str = "integer";

                fn from_param(value: &ParamValue) -> Option<Self> {
                    match value {
                        ParamValue::Int(int) => <$ty>::try_from(*int).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

int_param!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl FromParam for f64 {
    const EXPECTED: &'static str = "number";

    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Float(float) => Some(*float),
            ParamValue::Int(int) => Some(*int as f64),
            _ => None,
        }
    }
}

impl FromParam for f32 {
    const EXPECTED: &'static str = "number";

    fn from_param(value: &ParamValue) -> Option<Self> {
        f64::from_param(value).map(|e| e as f32)
    }
}
