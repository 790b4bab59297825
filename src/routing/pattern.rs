use regex::Regex;
use std::{fmt, sync::{Arc, LazyLock}};

use super::{CompileError, Converter, ConverterArgs, ConverterRegistry, Params, UrlError};

static PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<(?P<name>\w+)(?::(?P<conv>\w+)(?:\((?P<args>[^)]*)\))?)?>$")
        .expect("valid static regex")
});

/// One segment of a compiled template.
#[derive(Debug, Clone)]
pub enum Segment {
    Literal(String),
    Param {
        name: String,
        converter: Arc<dyn Converter>,
    },
}

/// A route template compiled into literal and parameter segments.
///
/// Templates are `/` separated, a segment is either literal text or a single parameter
/// `<name>` / `<name:converter(args)>`. Parameters without converter use `str`.
#[derive(Clone)]
pub struct Pattern {
    template: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile `template` with converters from `registry`.
    pub fn compile(template: &str, registry: &ConverterRegistry) -> Result<Self, CompileError> {
        let template = normalize(template);
        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();

        for raw in split(template) {
            if !raw.contains(['<', '>']) {
                segments.push(Segment::Literal(raw.to_owned()));
                continue;
            }

            let captures = PARAM
                .captures(raw)
                .ok_or_else(|| CompileError::Malformed(raw.to_owned()))?;
            let name = captures.name("name").map_or("", |e| e.as_str());
            if names.contains(&name) {
                return Err(CompileError::DuplicateParam {
                    name: name.to_owned(),
                    pattern: template.to_owned(),
                });
            }
            names.push(name);

            let conv = captures.name("conv").map_or("str", |e| e.as_str());
            let args = match captures.name("args") {
                Some(args) => ConverterArgs::parse(args.as_str())?,
                None => ConverterArgs::default(),
            };
            segments.push(Segment::Param {
                name: name.to_owned(),
                converter: registry.build(conv, args)?,
            });
        }

        let greedy = segments.iter().position(|e| {
            matches!(e, Segment::Param { converter, .. } if converter.is_greedy())
        });
        if let Some(index) = greedy {
            if index + 1 != segments.len() {
                if let Segment::Param { name, .. } = &segments[index] {
                    return Err(CompileError::GreedyNotLast(name.clone()));
                }
            }
        }

        Ok(Self {
            template: template.to_owned(),
            segments,
        })
    }

    /// Returns the normalized template.
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns parameter names in template order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|e| match e {
            Segment::Param { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Structural match, returns the raw text of every parameter.
    ///
    /// Literal segments must be equal, converters are not consulted.
    pub fn captures(&self, path: &str) -> Option<Vec<(&str, String)>> {
        let raw = split(normalize(path)).collect::<Vec<_>>();
        let mut captures = Vec::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(literal) => {
                    if raw.get(i) != Some(&literal.as_str()) {
                        return None;
                    }
                }
                Segment::Param { name, converter } if converter.is_greedy() => {
                    let rest = raw.get(i..).map(|e| e.join("/")).unwrap_or_default();
                    captures.push((name.as_str(), rest));
                    return Some(captures);
                }
                Segment::Param { name, .. } => {
                    captures.push((name.as_str(), (*raw.get(i)?).to_owned()));
                }
            }
        }

        (raw.len() == self.segments.len()).then_some(captures)
    }

    /// Match `path` and convert every parameter.
    ///
    /// A converter rejection is a non match.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let captures = self.captures(path)?;
        let mut params = Params::new();
        let converters = self.segments.iter().filter_map(|e| match e {
            Segment::Param { converter, .. } => Some(converter),
            Segment::Literal(_) => None,
        });
        for ((name, raw), converter) in captures.into_iter().zip(converters) {
            params.push(name, converter.convert(&raw).ok()?);
        }
        Some(params)
    }

    /// Build a concrete path by substituting `values` into the template.
    pub fn build(&self, values: &[(&str, &str)]) -> Result<String, UrlError> {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(literal) => out.push_str(literal),
                Segment::Param { name, converter } => {
                    let value = values
                        .iter()
                        .find(|(n, _)| n == name)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| UrlError::Missing(name.clone()))?;
                    converter.convert(value).map_err(|reject| UrlError::Rejected {
                        name: name.clone(),
                        reject,
                    })?;
                    out.push_str(value);
                }
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.template).finish()
    }
}

/// Strip trailing `/`, the root stays `/`.
pub(crate) fn normalize(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        path => path,
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.trim_start_matches('/');
    trimmed.split('/').filter(move |_| !trimmed.is_empty())
}
