//! Input values accepted by the mutation API, and their coercion into RDF
//! terms guided by a property's declared range (`cpt::variant_to_node`).

use crate::consts::{RDFS_LITERAL, XSD_BOOLEAN, XSD_DATE_TIME, XSD_DOUBLE, XSD_INTEGER, XSD_STRING};
use crate::errors::{Error, Result};
use chrono::{TimeZone, Utc};
use oxigraph::model::vocab::xsd;
use oxigraph::model::{Literal, NamedNode, NamedNodeRef, Term};

/// A value as handed to `addProperty`/`setProperty`/ingestion before it is
/// coerced into an RDF term. Mirrors the loosely-typed values a caller
/// passes across the transport boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Resource(String),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Double(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Converts an input [`Value`] into an RDF [`Term`] using the target
/// property's declared range. `range` is `None` when the property has no CPT
/// entry at all, in which case values are coerced conservatively to plain
/// string literals (properties with no CPT entry are defining by default,
/// but carry no range constraint to coerce against).
pub fn variant_to_node(value: &Value, range: Option<NamedNodeRef<'_>>) -> Result<Term> {
    match range {
        Some(r) if r == RDFS_LITERAL => Ok(Term::Literal(plain_literal(value))),
        Some(r) if is_resource_range(r) => resource_node(value),
        Some(r) if r == XSD_DATE_TIME => date_time_node(value),
        Some(r) if r == XSD_DOUBLE => double_node(value),
        Some(r) if r == XSD_INTEGER => integer_node(value),
        Some(r) if r == XSD_BOOLEAN => boolean_node(value),
        Some(r) if r == XSD_STRING => Ok(Term::Literal(Literal::new_typed_literal(
            to_display_string(value),
            NamedNode::from(r),
        ))),
        Some(r) => {
            // Unrecognised literal datatype: coerce to a typed literal of that datatype
            // using the value's string form, matching the original's permissive fallback.
            Ok(Term::Literal(Literal::new_typed_literal(
                to_display_string(value),
                NamedNode::from(r),
            )))
        }
        None => Ok(Term::Literal(plain_literal(value))),
    }
}

fn is_resource_range(range: NamedNodeRef<'_>) -> bool {
    // Anything that isn't a recognised XSD literal datatype or rdfs:Literal is
    // treated as an object (resource) range, matching the original's
    // "everything else is a resource" default.
    range != RDFS_LITERAL
        && range != XSD_DATE_TIME
        && range != XSD_DOUBLE
        && range != XSD_INTEGER
        && range != XSD_BOOLEAN
        && range != XSD_STRING
        && !range.as_str().starts_with("http://www.w3.org/2001/XMLSchema#")
}

fn to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Resource(s) => s.clone(),
    }
}

fn plain_literal(value: &Value) -> Literal {
    Literal::new_simple_literal(to_display_string(value))
}

fn resource_node(value: &Value) -> Result<Term> {
    let raw = match value {
        Value::Resource(s) => s.clone(),
        Value::String(s) => s.clone(),
        other => {
            return Err(Error::InvalidArgument(format!(
                "value {other:?} cannot be coerced to a resource reference"
            )))
        }
    };
    if raw.contains("://") || raw.starts_with("nepomuk:/") {
        NamedNode::new(&raw)
            .map(Term::NamedNode)
            .map_err(|e| Error::InvalidArgument(format!("invalid resource URI '{raw}': {e}")))
    } else {
        // A bare string naming an existing local file is promoted to a file:// URI.
        let path = std::path::Path::new(&raw);
        if path.exists() {
            let abs = path
                .canonicalize()
                .map_err(|e| Error::InvalidArgument(format!("cannot resolve '{raw}': {e}")))?;
            NamedNode::new(format!("file://{}", abs.display()))
                .map(Term::NamedNode)
                .map_err(|e| Error::InvalidArgument(format!("invalid resource URI: {e}")))
        } else {
            NamedNode::new(&raw)
                .map(Term::NamedNode)
                .map_err(|e| Error::InvalidArgument(format!("invalid resource URI '{raw}': {e}")))
        }
    }
}

fn date_time_node(value: &Value) -> Result<Term> {
    match value {
        Value::Integer(year) if (1..=9999).contains(year) => {
            let dt = Utc
                .with_ymd_and_hms(*year as i32, 1, 1, 0, 0, 0)
                .single()
                .ok_or_else(|| Error::InvalidArgument(format!("invalid year {year}")))?;
            Ok(Term::Literal(Literal::new_typed_literal(
                dt.to_rfc3339(),
                xsd::DATE_TIME,
            )))
        }
        Value::String(s) => {
            if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
                Ok(Term::Literal(Literal::new_typed_literal(
                    dt.to_rfc3339(),
                    xsd::DATE_TIME,
                )))
            } else if let Ok(year) = s.parse::<i32>() {
                if (1..=9999).contains(&year) {
                    let dt = Utc
                        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
                        .single()
                        .ok_or_else(|| Error::InvalidArgument(format!("invalid year {year}")))?;
                    Ok(Term::Literal(Literal::new_typed_literal(
                        dt.to_rfc3339(),
                        xsd::DATE_TIME,
                    )))
                } else {
                    Err(Error::InvalidArgument(format!("'{s}' is not a valid dateTime")))
                }
            } else {
                Err(Error::InvalidArgument(format!("'{s}' is not a valid dateTime")))
            }
        }
        other => Err(Error::InvalidArgument(format!(
            "value {other:?} cannot be coerced to xsd:dateTime"
        ))),
    }
}

fn double_node(value: &Value) -> Result<Term> {
    let d = match value {
        Value::Double(d) => *d,
        Value::Integer(i) => *i as f64,
        Value::String(s) => {
            if let Some((num, den)) = s.split_once('/') {
                let num: f64 = num
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidArgument(format!("'{s}' is not a valid fraction")))?;
                let den: f64 = den
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidArgument(format!("'{s}' is not a valid fraction")))?;
                if den == 0.0 {
                    return Err(Error::InvalidArgument(format!("'{s}' has a zero denominator")));
                }
                num / den
            } else {
                s.parse()
                    .map_err(|_| Error::InvalidArgument(format!("'{s}' is not a valid double")))?
            }
        }
        other => {
            return Err(Error::InvalidArgument(format!(
                "value {other:?} cannot be coerced to xsd:double"
            )))
        }
    };
    Ok(Term::Literal(Literal::new_typed_literal(
        d.to_string(),
        xsd::DOUBLE,
    )))
}

fn integer_node(value: &Value) -> Result<Term> {
    let i = match value {
        Value::Integer(i) => *i,
        Value::String(s) => s
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("'{s}' is not a valid integer")))?,
        other => {
            return Err(Error::InvalidArgument(format!(
                "value {other:?} cannot be coerced to xsd:integer"
            )))
        }
    };
    Ok(Term::Literal(Literal::new_typed_literal(
        i.to_string(),
        xsd::INTEGER,
    )))
}

fn boolean_node(value: &Value) -> Result<Term> {
    let b = match value {
        Value::Boolean(b) => *b,
        Value::String(s) => match s.as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => return Err(Error::InvalidArgument(format!("'{s}' is not a valid boolean"))),
        },
        Value::Integer(i) => *i != 0,
        other => {
            return Err(Error::InvalidArgument(format!(
                "value {other:?} cannot be coerced to xsd:boolean"
            )))
        }
    };
    Ok(Term::Literal(Literal::new_typed_literal(
        b.to_string(),
        xsd::BOOLEAN,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_as_integer_becomes_datetime() {
        let node = variant_to_node(&Value::Integer(1999), Some(XSD_DATE_TIME)).unwrap();
        match node {
            Term::Literal(lit) => assert!(lit.value().starts_with("1999-01-01")),
            _ => panic!("expected literal"),
        }
    }

    #[test]
    fn fraction_string_becomes_double() {
        let node = variant_to_node(&Value::String("1/4".into()), Some(XSD_DOUBLE)).unwrap();
        match node {
            Term::Literal(lit) => assert_eq!(lit.value(), "0.25"),
            _ => panic!("expected literal"),
        }
    }

    #[test]
    fn rdfs_literal_range_accepts_any_value_as_plain_literal() {
        let node = variant_to_node(&Value::Integer(42), Some(RDFS_LITERAL)).unwrap();
        match node {
            Term::Literal(lit) => {
                assert_eq!(lit.value(), "42");
                assert_eq!(lit.datatype(), xsd::STRING);
            }
            _ => panic!("expected literal"),
        }
    }

    #[test]
    fn bad_double_string_is_invalid_argument() {
        let err = variant_to_node(&Value::String("not-a-number".into()), Some(XSD_DOUBLE));
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }
}
