use crate::error::TransformError;
use model::core::value::AttributeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Case {
    Keep,
    Upper,
    Lower,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Field { name: String, case: Case },
}

/// A string template such as `ALBUM#{AlbumId}` or `SEARCH#{Name:upper}`.
///
/// Placeholders name an attribute and may carry an `upper` or `lower` modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    source: String,
    parts: Vec<Part>,
}

impl KeyTemplate {
    pub fn parse(template: &str) -> Result<Self, TransformError> {
        let invalid = |reason: &str| TransformError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find(['{', '}']) {
            if rest[open..].starts_with('}') {
                return Err(invalid("unmatched '}'"));
            }
            if open > 0 {
                parts.push(Part::Literal(rest[..open].to_string()));
            }

            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| invalid("unclosed '{'"))?;
            let placeholder = &after[..close];
            if placeholder.contains('{') {
                return Err(invalid("nested '{'"));
            }

            let (name, case) = match placeholder.split_once(':') {
                None => (placeholder, Case::Keep),
                Some((name, "upper")) => (name, Case::Upper),
                Some((name, "lower")) => (name, Case::Lower),
                Some((_, modifier)) => {
                    return Err(invalid(&format!("unknown modifier '{modifier}'")));
                }
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(invalid("empty placeholder"));
            }
            parts.push(Part::Field {
                name: name.to_string(),
                case,
            });
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }

        Ok(KeyTemplate {
            source: template.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Renders against `attributes`. Returns `None` if a referenced attribute
    /// is missing or null.
    pub fn render(&self, attributes: &AttributeMap) -> Option<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Field { name, case } => {
                    let value = attributes.get(name)?.key_string()?;
                    match case {
                        Case::Keep => out.push_str(&value),
                        Case::Upper => out.push_str(&value.to_uppercase()),
                        Case::Lower => out.push_str(&value.to_lowercase()),
                    }
                }
            }
        }
        Some(out)
    }
}
