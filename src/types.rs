//! The logical column type algebra (§3): `{ Primitive(p) | Nullable(t) | Array(t) | Nested(fields) }`,
//! plus `escape` and `nested_root`, the two naming primitives the planner (§4.4) and the
//! `columns.txt` grammar (§6) both depend on.

use crate::error::{Error, Result};

/// A leaf scalar type. The concrete set this crate ships with; `colpart` itself is agnostic
/// to the binary encoding of any one of these — that is a contract with the caller's
/// per-type serializer (§1, Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Str,
}

impl PrimitiveType {
    fn grammar_name(self) -> &'static str {
        match self {
            PrimitiveType::U8 => "U8",
            PrimitiveType::U16 => "U16",
            PrimitiveType::U32 => "U32",
            PrimitiveType::U64 => "U64",
            PrimitiveType::I8 => "I8",
            PrimitiveType::I16 => "I16",
            PrimitiveType::I32 => "I32",
            PrimitiveType::I64 => "I64",
            PrimitiveType::F32 => "F32",
            PrimitiveType::F64 => "F64",
            PrimitiveType::Str => "Str",
        }
    }

    fn from_grammar_name(name: &str) -> Option<Self> {
        Some(match name {
            "U8" => PrimitiveType::U8,
            "U16" => PrimitiveType::U16,
            "U32" => PrimitiveType::U32,
            "U64" => PrimitiveType::U64,
            "I8" => PrimitiveType::I8,
            "I16" => PrimitiveType::I16,
            "I32" => PrimitiveType::I32,
            "I64" => PrimitiveType::I64,
            "F32" => PrimitiveType::F32,
            "F64" => PrimitiveType::F64,
            "Str" => PrimitiveType::Str,
            _ => return None,
        })
    }
}

/// The type tree over a logical column (§3).
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    Primitive(PrimitiveType),
    Nullable(Box<ColumnType>),
    Array(Box<ColumnType>),
    Nested(Vec<(String, ColumnType)>),
}

impl ColumnType {
    /// Renders the `<type-expr>` grammar described in SPEC_FULL §6.
    pub fn to_grammar(&self) -> String {
        match self {
            ColumnType::Primitive(p) => p.grammar_name().to_string(),
            ColumnType::Nullable(inner) => format!("Nullable({})", inner.to_grammar()),
            ColumnType::Array(inner) => format!("Array({})", inner.to_grammar()),
            ColumnType::Nested(fields) => {
                let body = fields
                    .iter()
                    .map(|(name, ty)| format!("{}:{}", name, ty.to_grammar()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Nested({})", body)
            }
        }
    }

    /// Parses the `<type-expr>` grammar described in SPEC_FULL §6.
    pub fn from_grammar(input: &str) -> Result<Self> {
        let (ty, rest) = parse_type(input.trim())?;
        if !rest.trim().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "trailing characters after type expression: {:?}",
                rest
            )));
        }
        Ok(ty)
    }
}

fn parse_type(input: &str) -> Result<(ColumnType, &str)> {
    let input = input.trim_start();
    if let Some(rest) = input.strip_prefix("Nullable(") {
        let (inner, rest) = parse_type(rest)?;
        let rest = expect_close(rest)?;
        return Ok((ColumnType::Nullable(Box::new(inner)), rest));
    }
    if let Some(rest) = input.strip_prefix("Array(") {
        let (inner, rest) = parse_type(rest)?;
        let rest = expect_close(rest)?;
        return Ok((ColumnType::Array(Box::new(inner)), rest));
    }
    if let Some(mut rest) = input.strip_prefix("Nested(") {
        let mut fields = Vec::new();
        loop {
            rest = rest.trim_start();
            if let Some(after) = rest.strip_prefix(')') {
                rest = after;
                break;
            }
            let colon = rest.find(':').ok_or_else(|| {
                Error::InvalidConfig(format!("expected 'name:type' in Nested(...), got {:?}", rest))
            })?;
            let name = rest[..colon].trim().to_string();
            let (ty, after_ty) = parse_type(&rest[colon + 1..])?;
            fields.push((name, ty));
            rest = after_ty.trim_start();
            if let Some(after) = rest.strip_prefix(',') {
                rest = after;
            } else if let Some(after) = rest.strip_prefix(')') {
                rest = after;
                break;
            } else {
                return Err(Error::InvalidConfig(format!(
                    "expected ',' or ')' in Nested(...), got {:?}",
                    rest
                )));
            }
        }
        return Ok((ColumnType::Nested(fields), rest));
    }
    let end = input
        .find(|c: char| !(c.is_ascii_alphanumeric()))
        .unwrap_or(input.len());
    let (name, rest) = input.split_at(end);
    let primitive = PrimitiveType::from_grammar_name(name)
        .ok_or_else(|| Error::InvalidConfig(format!("unknown primitive type {:?}", name)))?;
    Ok((ColumnType::Primitive(primitive), rest))
}

fn expect_close(input: &str) -> Result<&str> {
    input
        .strip_prefix(')')
        .ok_or_else(|| Error::InvalidConfig(format!("expected ')', got {:?}", input)))
}

/// Maps any file-unsafe byte (`/`, `.`, control bytes, non-ASCII, `%` itself) to a
/// reversible `%XX` percent encoding (§4.4). Safe bytes pass through unchanged.
pub fn escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        let safe = byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-';
        if safe {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Reverses [`escape`].
pub fn unescape(escaped: &str) -> Result<String> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = escaped
                .get(i + 1..i + 3)
                .ok_or_else(|| Error::InvalidConfig(format!("truncated escape in {:?}", escaped)))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| Error::InvalidConfig(format!("invalid escape in {:?}", escaped)))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|e| Error::InvalidConfig(e.to_string()))
}

/// Strips the final dotted suffix of a logical column name: `a.b.c` has nested root `a.b`
/// (§4.4). A name with no `.` is its own nested root.
pub fn nested_root(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_roundtrips_unsafe_bytes() {
        let name = "a/b.c\u{0}Мир%";
        let escaped = escape(name);
        assert!(escaped.chars().all(|c| c.is_ascii()));
        assert_eq!(unescape(&escaped).unwrap(), name);
    }

    #[test]
    fn escape_leaves_safe_names_alone() {
        assert_eq!(escape("plain_name-1"), "plain_name-1");
    }

    #[test]
    fn nested_root_strips_final_segment() {
        assert_eq!(nested_root("a.b.c"), "a.b");
        assert_eq!(nested_root("a"), "a");
    }

    #[test]
    fn type_grammar_roundtrips() {
        let cases = [
            ColumnType::Primitive(PrimitiveType::U32),
            ColumnType::Nullable(Box::new(ColumnType::Array(Box::new(ColumnType::Primitive(
                PrimitiveType::U8,
            ))))),
            ColumnType::Nested(vec![
                ("x".to_string(), ColumnType::Primitive(PrimitiveType::U8)),
                ("y".to_string(), ColumnType::Primitive(PrimitiveType::U8)),
            ]),
        ];
        for ty in cases {
            let grammar = ty.to_grammar();
            assert_eq!(ColumnType::from_grammar(&grammar).unwrap(), ty);
        }
    }

    #[test]
    fn rejects_unknown_primitive() {
        assert!(ColumnType::from_grammar("NotAType").is_err());
    }
}
