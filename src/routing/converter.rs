//! Path segment converters.
//!
//! A converter parses the raw text of one path segment into a typed [`ParamValue`], or rejects
//! it. Converters are created from a name and arguments found in a route template:
//!
//! ```text
//! /users/<id:int(min=1)>/<slug:str(max_length=32)>/<rest:path>
//! ```
use std::{collections::HashMap, fmt, sync::Arc};

use super::{CompileError, ParamValue, Reject};

/// Parser and validator for one path segment.
pub trait Converter: fmt::Debug + Send + Sync + 'static {
    /// Parse `raw`, or reject it.
    fn convert(&self, raw: &str) -> Result<ParamValue, Reject>;

    /// Whether this converter consumes every remaining segment.
    fn is_greedy(&self) -> bool {
        false
    }
}

/// Creates a converter from template arguments.
pub type Factory =
    Arc<dyn Fn(&mut ConverterArgs) -> Result<Arc<dyn Converter>, CompileError> + Send + Sync>;

/// Named converter factories.
///
/// [`ConverterRegistry::new`] comes with `str`, `int`, `float` and `path`.
#[derive(Clone)]
pub struct ConverterRegistry {
    factories: HashMap<String, Factory>,
}

impl ConverterRegistry {
    /// Create new registry with the built-in converters.
    pub fn new() -> Self {
        let mut me = Self { factories: HashMap::new() };
        me.register("str", StrConverter::from_args);
        me.register("int", IntConverter::from_args);
        me.register("float", FloatConverter::from_args);
        me.register("path", PathConverter::from_args);
        me
    }

    /// Register a converter factory, replacing any previous one with the same name.
    pub fn register<F, C>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&mut ConverterArgs) -> Result<C, CompileError> + Send + Sync + 'static,
        C: Converter,
    {
        let factory: Factory = Arc::new(
            move |args: &mut ConverterArgs| -> Result<Arc<dyn Converter>, CompileError> {
                Ok(Arc::new(factory(args)?))
            },
        );
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build converter `name` with `args`.
    ///
    /// Every argument must be consumed by the factory, leftovers are reported as unknown.
    pub fn build(&self, name: &str, mut args: ConverterArgs) -> Result<Arc<dyn Converter>, CompileError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| CompileError::UnknownConverter(name.to_owned()))?;
        args.converter = name.to_owned();
        let converter = factory(&mut args)?;
        args.finish()?;
        Ok(converter)
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut names = self.factories.keys().collect::<Vec<_>>();
        names.sort();
        f.debug_struct("ConverterRegistry").field("converters", &names).finish()
    }
}

// ===== Arguments =====

/// A literal argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ArgValue {
    fn parse(value: &str) -> Self {
        let value = value.trim();
        match value {
            "true" | "True" => return Self::Bool(true),
            "false" | "False" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(int) = value.parse() {
            return Self::Int(int);
        }
        if let Ok(float) = value.parse() {
            return Self::Float(float);
        }
        Self::Str(value.trim_matches(|c| c == '\'' || c == '"').to_owned())
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
        }
    }
}

/// Arguments given to a converter in a template, `name:conv(key=value, ...)`.
#[derive(Debug, Clone, Default)]
pub struct ConverterArgs {
    converter: String,
    args: Vec<(String, ArgValue)>,
}

impl ConverterArgs {
    /// Parse the text between the parentheses.
    pub fn parse(input: &str) -> Result<Self, CompileError> {
        let mut args = Vec::new();
        for arg in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((key, value)) = arg.split_once('=') else {
                return Err(CompileError::Malformed(arg.to_owned()));
            };
            args.push((key.trim().to_owned(), ArgValue::parse(value)));
        }
        Ok(Self { converter: String::new(), args })
    }

    /// Take a raw argument.
    pub fn take(&mut self, key: &str) -> Option<ArgValue> {
        let index = self.args.iter().position(|(k, _)| k == key)?;
        Some(self.args.remove(index).1)
    }

    pub fn take_bool(&mut self, key: &str) -> Result<Option<bool>, CompileError> {
        match self.take(key) {
            None => Ok(None),
            Some(ArgValue::Bool(value)) => Ok(Some(value)),
            Some(other) => Err(self.invalid(key, format!("expected boolean, got {}", other.kind()))),
        }
    }

    pub fn take_int(&mut self, key: &str) -> Result<Option<i64>, CompileError> {
        match self.take(key) {
            None => Ok(None),
            Some(ArgValue::Int(value)) => Ok(Some(value)),
            Some(other) => Err(self.invalid(key, format!("expected integer, got {}", other.kind()))),
        }
    }

    pub fn take_usize(&mut self, key: &str) -> Result<Option<usize>, CompileError> {
        match self.take_int(key)? {
            None => Ok(None),
            Some(value) => usize::try_from(value)
                .map(Some)
                .map_err(|_| self.invalid(key, "expected non negative integer")),
        }
    }

    pub fn take_float(&mut self, key: &str) -> Result<Option<f64>, CompileError> {
        match self.take(key) {
            None => Ok(None),
            Some(ArgValue::Float(value)) => Ok(Some(value)),
            Some(ArgValue::Int(value)) => Ok(Some(value as f64)),
            Some(other) => Err(self.invalid(key, format!("expected number, got {}", other.kind()))),
        }
    }

    /// Error for an argument with an unusable value.
    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> CompileError {
        CompileError::InvalidArgument {
            converter: self.converter.clone(),
            argument: key.to_owned(),
            reason: reason.into(),
        }
    }

    fn finish(self) -> Result<(), CompileError> {
        match self.args.into_iter().next() {
            Some((argument, _)) => Err(CompileError::UnknownArgument {
                converter: self.converter,
                argument,
            }),
            None => Ok(()),
        }
    }
}

// ===== Built-in =====

/// `str` converter.
#[derive(Debug, Clone, Default)]
pub struct StrConverter {
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub allow_empty: bool,
}

impl StrConverter {
    fn from_args(args: &mut ConverterArgs) -> Result<Self, CompileError> {
        let me = Self {
            length: args.take_usize("length")?,
            min_length: args.take_usize("min_length")?,
            max_length: args.take_usize("max_length")?,
            allow_empty: args.take_bool("allow_empty")?.unwrap_or(false),
        };
        if let (Some(min), Some(max)) = (me.min_length, me.max_length) {
            if min > max {
                return Err(args.invalid("min_length", "greater than max_length"));
            }
        }
        Ok(me)
    }
}

impl Converter for StrConverter {
    fn convert(&self, raw: &str) -> Result<ParamValue, Reject> {
        let len = raw.chars().count();
        if len == 0 && !self.allow_empty {
            return Err(Reject::new("expected a non empty string"));
        }
        if let Some(length) = self.length {
            if len != length {
                return Err(Reject(format!("expected string of length {length}, got {len}")));
            }
        }
        if let Some(min) = self.min_length {
            if len < min {
                return Err(Reject(format!("expected at least {min} characters, got {len}")));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                return Err(Reject(format!("expected at most {max} characters, got {len}")));
            }
        }
        Ok(ParamValue::Str(raw.to_owned()))
    }
}

/// `int` converter.
#[derive(Debug, Clone)]
pub struct IntConverter {
    pub base: u32,
    pub signed: bool,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl Default for IntConverter {
    fn default() -> Self {
        Self { base: 10, signed: false, min: None, max: None }
    }
}

impl IntConverter {
    fn from_args(args: &mut ConverterArgs) -> Result<Self, CompileError> {
        let base = match args.take_int("base")? {
            None => 10,
            Some(base @ 2..=36) => base as u32,
            Some(_) => return Err(args.invalid("base", "must be between 2 and 36")),
        };
        Ok(Self {
            base,
            signed: args.take_bool("signed")?.unwrap_or(false),
            min: args.take_int("min")?,
            max: args.take_int("max")?,
        })
    }
}

impl Converter for IntConverter {
    fn convert(&self, raw: &str) -> Result<ParamValue, Reject> {
        if !self.signed && raw.starts_with(['+', '-']) {
            return Err(Reject::new("expected unsigned integer"));
        }
        let int = i64::from_str_radix(raw, self.base)
            .map_err(|err| Reject(format!("invalid integer {raw:?}: {err}")))?;
        if let Some(min) = self.min {
            if int < min {
                return Err(Reject(format!("expected integer of at least {min}")));
            }
        }
        if let Some(max) = self.max {
            if int > max {
                return Err(Reject(format!("expected integer of at most {max}")));
            }
        }
        Ok(ParamValue::Int(int))
    }
}

/// `float` converter.
#[derive(Debug, Clone, Default)]
pub struct FloatConverter {
    pub signed: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub allow_infinity: bool,
    pub allow_nan: bool,
}

impl FloatConverter {
    fn from_args(args: &mut ConverterArgs) -> Result<Self, CompileError> {
        Ok(Self {
            signed: args.take_bool("signed")?.unwrap_or(false),
            min: args.take_float("min")?,
            max: args.take_float("max")?,
            allow_infinity: args.take_bool("allow_infinity")?.unwrap_or(false),
            allow_nan: args.take_bool("allow_nan")?.unwrap_or(false),
        })
    }
}

impl Converter for FloatConverter {
    fn convert(&self, raw: &str) -> Result<ParamValue, Reject> {
        if !self.signed && raw.starts_with(['+', '-']) {
            return Err(Reject::new("expected unsigned float"));
        }
        let float: f64 = raw
            .parse()
            .map_err(|err| Reject(format!("invalid float {raw:?}: {err}")))?;
        if float.is_nan() && !self.allow_nan {
            return Err(Reject::new("expected a non NaN value"));
        }
        if float.is_infinite() && !self.allow_infinity {
            return Err(Reject::new("expected a finite value"));
        }
        if let Some(min) = self.min {
            if float < min {
                return Err(Reject(format!("expected float of at least {min}")));
            }
        }
        if let Some(max) = self.max {
            if float > max {
                return Err(Reject(format!("expected float of at most {max}")));
            }
        }
        Ok(ParamValue::Float(float))
    }
}

/// `path` converter, matches the rest of the path including `/`.
#[derive(Debug, Clone, Default)]
pub struct PathConverter {
    pub allow_empty: bool,
}

impl PathConverter {
    fn from_args(args: &mut ConverterArgs) -> Result<Self, CompileError> {
        Ok(Self {
            allow_empty: args.take_bool("allow_empty")?.unwrap_or(false),
        })
    }
}

impl Converter for PathConverter {
    fn convert(&self, raw: &str) -> Result<ParamValue, Reject> {
        if raw.is_empty() && !self.allow_empty {
            return Err(Reject::new("expected a non empty path"));
        }
        Ok(ParamValue::Path(raw.to_owned()))
    }

    fn is_greedy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn build(name: &str, args: &str) -> Result<Arc<dyn Converter>, CompileError> {
        ConverterRegistry::new().build(name, ConverterArgs::parse(args)?)
    }

    #[test]
    fn int_constraints() {
        let int = build("int", "min=1, max=100").unwrap();
        assert_eq!(int.convert("42"), Ok(ParamValue::Int(42)));
        assert!(int.convert("0").is_err());
        assert!(int.convert("101").is_err());
        assert!(int.convert("-5").is_err());
        assert!(int.convert("abc").is_err());

        let signed = build("int", "signed=True").unwrap();
        assert_eq!(signed.convert("-5"), Ok(ParamValue::Int(-5)));

        let hex = build("int", "base=16").unwrap();
        assert_eq!(hex.convert("ff"), Ok(ParamValue::Int(255)));
    }

    #[test]
    fn float_constraints() {
        let float = build("float", "").unwrap();
        assert_eq!(float.convert("1.5"), Ok(ParamValue::Float(1.5)));
        assert!(float.convert("inf").is_err());
        assert!(float.convert("NaN").is_err());
        assert!(float.convert("-1.5").is_err());

        let lenient = build("float", "allow_infinity=true, allow_nan=true, signed=true").unwrap();
        assert!(lenient.convert("-inf").is_ok());
        assert!(lenient.convert("NaN").is_ok());
    }

    #[test]
    fn str_constraints() {
        let exact = build("str", "length=3").unwrap();
        assert!(exact.convert("abc").is_ok());
        assert!(exact.convert("abcd").is_err());

        let bounded = build("str", "min_length=2, max_length=4").unwrap();
        assert!(bounded.convert("a").is_err());
        assert!(bounded.convert("abcde").is_err());
        assert!(bounded.convert("").is_err());
    }

    #[test]
    fn bad_arguments() {
        assert!(matches!(
            build("int", "nope=1"),
            Err(CompileError::UnknownArgument { .. })
        ));
        assert!(matches!(
            build("int", "min=low"),
            Err(CompileError::InvalidArgument { .. })
        ));
        assert!(matches!(
            build("int", "base=99"),
            Err(CompileError::InvalidArgument { .. })
        ));
        assert!(matches!(
            build("uuid", ""),
            Err(CompileError::UnknownConverter(_))
        ));
    }

    #[derive(Debug)]
    struct Even;

    impl Converter for Even {
        fn convert(&self, raw: &str) -> Result<ParamValue, Reject> {
            match raw.parse::<i64>() {
                Ok(int) if int % 2 == 0 => Ok(ParamValue::Int(int)),
                _ => Err(Reject::new("expected an even number")),
            }
        }
    }

    #[test]
    fn custom_converter() {
        let mut registry = ConverterRegistry::new();
        registry.register("even", |_: &mut ConverterArgs| Ok(Even));
        let even = registry.build("even", ConverterArgs::default()).unwrap();
        assert!(even.convert("4").is_ok());
        assert!(even.convert("3").is_err());
    }
}
