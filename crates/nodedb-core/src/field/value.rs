//! Typed interpretation of raw default literals.

use serde::{Deserialize, Serialize};

use super::{FieldType, ValueKind};

/// A default value interpreted according to its field type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    BoolList(Vec<bool>),
    Int(i32),
    IntList(Vec<i32>),
    Number(f64),
    NumberList(Vec<f64>),
    /// A fixed-width numeric tuple (vectors, colors, rotations, matrices).
    Tuple(Vec<f64>),
    TupleList(Vec<Vec<f64>>),
    /// An image header triple (width, height, components).
    Image(Vec<i32>),
    ImageList(Vec<Vec<i32>>),
    String(String),
    StringList(Vec<String>),
    /// `NULL` node reference.
    Null,
    /// A list of `NULL` node references.
    NullList(usize),
}

/// Interpret `raw` as a value of type `ty`.
///
/// Returns `None` when the literal does not fit the type; a missing typed
/// value is not an error by itself.
pub fn parse_field_value(ty: FieldType, raw: &str) -> Option<FieldValue> {
    let kind = ty.kind();
    let multi = ty.is_multi();
    match kind {
        ValueKind::Bool => {
            let values = normalize(raw)
                .split_whitespace()
                .map(parse_bool)
                .collect::<Option<Vec<_>>>()?;
            if multi {
                Some(FieldValue::BoolList(values))
            } else if values.len() == 1 {
                Some(FieldValue::Bool(values[0]))
            } else {
                None
            }
        }
        ValueKind::String => {
            let values = parse_strings(raw)?;
            if multi {
                Some(FieldValue::StringList(values))
            } else if values.len() == 1 {
                values.into_iter().next().map(FieldValue::String)
            } else {
                None
            }
        }
        ValueKind::Node => {
            let normalized = normalize(raw);
            let tokens: Vec<&str> = normalized.split_whitespace().collect();
            if !tokens.iter().all(|t| *t == "NULL") {
                return None;
            }
            match (multi, tokens.len()) {
                (true, n) => Some(FieldValue::NullList(n)),
                (false, 1) => Some(FieldValue::Null),
                _ => None,
            }
        }
        _ => {
            let width = kind.tuple_width()?;
            if kind.is_integral() {
                let ints = normalize(raw)
                    .split_whitespace()
                    .map(parse_int)
                    .collect::<Option<Vec<_>>>()?;
                shape_ints(ints, width, multi)
            } else {
                let numbers = normalize(raw)
                    .split_whitespace()
                    .map(parse_number)
                    .collect::<Option<Vec<_>>>()?;
                shape_numbers(numbers, width, multi)
            }
        }
    }
}

/// Strip enclosing brackets; outside of strings commas and pipes separate.
fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);
    if inner.contains('"') {
        inner.to_string()
    } else {
        inner.replace([',', '|'], " ")
    }
}

fn parse_bool(token: &str) -> Option<bool> {
    match token.to_ascii_uppercase().as_str() {
        "TRUE" => Some(true),
        "FALSE" => Some(false),
        _ => None,
    }
}

fn parse_int(token: &str) -> Option<i32> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).ok()
}

fn parse_number(token: &str) -> Option<f64> {
    token
        .parse::<f64>()
        .ok()
        .or_else(|| parse_int(token).map(f64::from))
}

fn shape_numbers(numbers: Vec<f64>, width: usize, multi: bool) -> Option<FieldValue> {
    if numbers.len() % width != 0 {
        return None;
    }
    let tuples = numbers.len() / width;
    match (width, multi) {
        (1, false) if tuples == 1 => Some(FieldValue::Number(numbers[0])),
        (1, true) => Some(FieldValue::NumberList(numbers)),
        (_, false) if tuples == 1 => Some(FieldValue::Tuple(numbers)),
        (_, true) => Some(FieldValue::TupleList(
            numbers.chunks(width).map(<[f64]>::to_vec).collect(),
        )),
        _ => None,
    }
}

fn shape_ints(ints: Vec<i32>, width: usize, multi: bool) -> Option<FieldValue> {
    if ints.len() % width != 0 {
        return None;
    }
    let tuples = ints.len() / width;
    match (width, multi) {
        (1, false) if tuples == 1 => Some(FieldValue::Int(ints[0])),
        (1, true) => Some(FieldValue::IntList(ints)),
        (_, false) if tuples == 1 => Some(FieldValue::Image(ints)),
        (_, true) => Some(FieldValue::ImageList(
            ints.chunks(width).map(<[i32]>::to_vec).collect(),
        )),
        _ => None,
    }
}

/// Parse a sequence of double-quoted strings separated by whitespace,
/// commas or pipes, unescaping `\\` and `\"`.
fn parse_strings(raw: &str) -> Option<Vec<String>> {
    let normalized = normalize(raw);
    let mut chars = normalized.chars().peekable();
    let mut values = Vec::new();
    loop {
        while chars
            .peek()
            .is_some_and(|c| c.is_whitespace() || *c == ',' || *c == '|')
        {
            chars.next();
        }
        match chars.next() {
            None => return Some(values),
            Some('"') => {}
            Some(_) => return None,
        }
        let mut value = String::new();
        loop {
            match chars.next()? {
                '"' => break,
                '\\' => match chars.peek() {
                    Some('\\') | Some('"') => value.extend(chars.next()),
                    _ => value.push('\\'),
                },
                c => value.push(c),
            }
        }
        values.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans() {
        assert_eq!(
            parse_field_value(FieldType::SFBool, "TRUE"),
            Some(FieldValue::Bool(true))
        );
        assert_eq!(
            parse_field_value(FieldType::MFBool, "[TRUE, FALSE]"),
            Some(FieldValue::BoolList(vec![true, false]))
        );
        assert_eq!(parse_field_value(FieldType::SFBool, "TRUE FALSE"), None);
        assert_eq!(parse_field_value(FieldType::SFBool, "yes"), None);
    }

    #[test]
    fn numbers_and_tuples() {
        assert_eq!(
            parse_field_value(FieldType::SFInt32, "0x10"),
            Some(FieldValue::Int(16))
        );
        assert_eq!(
            parse_field_value(FieldType::SFFloat, "-1.5"),
            Some(FieldValue::Number(-1.5))
        );
        assert_eq!(
            parse_field_value(FieldType::SFRotation, "0 0 1 0"),
            Some(FieldValue::Tuple(vec![0.0, 0.0, 1.0, 0.0]))
        );
        assert_eq!(
            parse_field_value(FieldType::MFVec2f, "[0 0, 1 1]"),
            Some(FieldValue::TupleList(vec![vec![0.0, 0.0], vec![1.0, 1.0]]))
        );
        assert_eq!(parse_field_value(FieldType::SFVec3f, "0 0"), None);
        assert_eq!(
            parse_field_value(FieldType::MFFloat, "[]"),
            Some(FieldValue::NumberList(vec![]))
        );
    }

    #[test]
    fn images_are_integer_triples() {
        assert_eq!(
            parse_field_value(FieldType::SFImage, "0 0 0"),
            Some(FieldValue::Image(vec![0, 0, 0]))
        );
        assert_eq!(parse_field_value(FieldType::SFImage, "0 0.5 0"), None);
    }

    #[test]
    fn strings_unescape() {
        assert_eq!(
            parse_field_value(FieldType::SFString, r#""say \"hi\" \\ bye""#),
            Some(FieldValue::String(r#"say "hi" \ bye"#.into()))
        );
        assert_eq!(
            parse_field_value(FieldType::MFString, r#"["MIDDLE" "BEGIN"]"#),
            Some(FieldValue::StringList(vec!["MIDDLE".into(), "BEGIN".into()]))
        );
        assert_eq!(parse_field_value(FieldType::SFString, r#""a" "b""#), None);
        assert_eq!(parse_field_value(FieldType::SFString, "bare"), None);
    }

    #[test]
    fn node_references() {
        assert_eq!(
            parse_field_value(FieldType::SFNode, "NULL"),
            Some(FieldValue::Null)
        );
        assert_eq!(
            parse_field_value(FieldType::MFNode, "[]"),
            Some(FieldValue::NullList(0))
        );
        assert_eq!(parse_field_value(FieldType::SFNode, "[]"), None);
    }
}
