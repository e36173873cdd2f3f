//! [`ColumnLayoutPlanner`], component C4 (§4.4): resolves a logical column name and type
//! tree into the physical streams it needs, sharing one array-sizes stream per nesting level
//! across every sibling rooted at the same [`nested_root`].

use std::collections::HashSet;

use crate::types::{nested_root, ColumnType};

/// Structural role of one physical stream within a logical column (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// The column's own values, or a nested field's values.
    Value,
    /// A `Nullable` column's byte-per-row mask.
    Null,
    /// A shared offset-sizes stream for one nesting level of an `Array`/`Nested` group.
    ArraySizes,
}

impl StreamKind {
    /// `(data extension, mark extension)` for this stream kind (§6).
    pub fn extensions(self) -> (&'static str, &'static str) {
        match self {
            StreamKind::Value | StreamKind::ArraySizes => (".bin", ".mrk"),
            StreamKind::Null => (".null", ".null_mrk"),
        }
    }
}

/// One physical stream a logical column requires.
#[derive(Debug, Clone)]
pub struct StreamSlot {
    /// Key the part's stream table is keyed by: unescaped, and identical for every sibling
    /// sharing one array-sizes stream (I3, P4).
    pub key: String,
    /// Escaped filesystem stem; the caller appends [`StreamKind::extensions`].
    pub file_stem: String,
    pub kind: StreamKind,
}

/// A naming strategy: [`crate::types::escape`] for a full
/// [`PartAssembler`](crate::part::PartAssembler), or an append-assembler's caller-supplied
/// override that uses the logical name verbatim as input to the same `escape` function,
/// integrating the new file into an existing part's naming convention (§4.4, §9).
pub type EscapeName<'a> = &'a dyn Fn(&str) -> String;

/// The slot for a `Nullable` column's mask stream.
pub fn null_slot(name: &str, escape_name: EscapeName) -> StreamSlot {
    StreamSlot {
        key: format!("{}.null", name),
        file_stem: escape_name(name),
        kind: StreamKind::Null,
    }
}

/// The slot for a primitive (or nested-field leaf) value stream.
pub fn value_slot(name: &str, escape_name: EscapeName) -> StreamSlot {
    StreamSlot {
        key: name.to_string(),
        file_stem: escape_name(name),
        kind: StreamKind::Value,
    }
}

/// The slot for the `nested_root(name) + "%size" + level` stream, or `None` if a previous
/// sibling already claimed it this part (I3, P4: exactly one array-sizes stream per group).
pub fn array_sizes_slot(
    name: &str,
    level: usize,
    known_sizes: &mut HashSet<String>,
    escape_name: EscapeName,
) -> Option<StreamSlot> {
    let root = nested_root(name);
    let key = format!("{}%size{}", root, level);
    if known_sizes.insert(key.clone()) {
        Some(StreamSlot {
            file_stem: format!("{}%size{}", escape_name(root), level),
            key,
            kind: StreamKind::ArraySizes,
        })
    } else {
        None
    }
}

/// Full recursive plan for `(name, ty)`: every physical stream it touches, in the order its
/// granularity loops must visit them. Used for directory-contents introspection (tests,
/// `AppendAssembler` pre-flight) rather than by the write path itself, which interleaves this
/// traversal with the caller's materialized column data (see `part::write_logical_column`).
pub fn plan_column(
    name: &str,
    ty: &ColumnType,
    known_sizes: &mut HashSet<String>,
    escape_name: EscapeName,
) -> Vec<StreamSlot> {
    plan_level(name, ty, 0, known_sizes, escape_name)
}

fn plan_level(
    name: &str,
    ty: &ColumnType,
    level: usize,
    known_sizes: &mut HashSet<String>,
    escape_name: EscapeName,
) -> Vec<StreamSlot> {
    match ty {
        ColumnType::Nullable(inner) => {
            let mut slots = vec![null_slot(name, escape_name)];
            slots.extend(plan_level(name, inner, level, known_sizes, escape_name));
            slots
        }
        ColumnType::Array(inner) => {
            let mut slots: Vec<StreamSlot> =
                array_sizes_slot(name, level, known_sizes, escape_name)
                    .into_iter()
                    .collect();
            slots.extend(plan_level(name, inner, level + 1, known_sizes, escape_name));
            slots
        }
        ColumnType::Nested(fields) => {
            let mut slots: Vec<StreamSlot> =
                array_sizes_slot(name, level, known_sizes, escape_name)
                    .into_iter()
                    .collect();
            for (field_name, field_ty) in fields {
                let child = format!("{}.{}", name, field_name);
                slots.extend(plan_level(&child, field_ty, level + 1, known_sizes, escape_name));
            }
            slots
        }
        ColumnType::Primitive(_) => vec![value_slot(name, escape_name)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{escape, PrimitiveType};

    fn escaper() -> EscapeName<'static> {
        &escape
    }

    #[test]
    fn primitive_plans_one_value_stream() {
        let mut known = HashSet::new();
        let slots = plan_column("n", &ColumnType::Primitive(PrimitiveType::U32), &mut known, escaper());
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].kind, StreamKind::Value);
        assert_eq!(slots[0].key, "n");
    }

    #[test]
    fn nullable_array_plans_null_sizes_and_value() {
        let ty = ColumnType::Nullable(Box::new(ColumnType::Array(Box::new(ColumnType::Primitive(
            PrimitiveType::U8,
        )))));
        let mut known = HashSet::new();
        let slots = plan_column("a", &ty, &mut known, escaper());
        let kinds: Vec<_> = slots.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, [StreamKind::Null, StreamKind::ArraySizes, StreamKind::Value]);
        assert_eq!(slots[1].key, "a%size0");
    }

    #[test]
    fn sibling_fields_share_one_array_sizes_stream() {
        let mut known = HashSet::new();
        let t_x = plan_column(
            "t.x",
            &ColumnType::Array(Box::new(ColumnType::Primitive(PrimitiveType::U8))),
            &mut known,
            escaper(),
        );
        let t_y = plan_column(
            "t.y",
            &ColumnType::Array(Box::new(ColumnType::Primitive(PrimitiveType::U8))),
            &mut known,
            escaper(),
        );
        assert_eq!(t_x.len(), 2); // sizes + value
        assert_eq!(t_y.len(), 1); // value only: sizes already claimed
        assert_eq!(t_x[0].key, "t%size0");
    }

    #[test]
    fn nested_group_shares_sizes_across_fields() {
        let ty = ColumnType::Nested(vec![
            ("x".to_string(), ColumnType::Primitive(PrimitiveType::U8)),
            ("y".to_string(), ColumnType::Primitive(PrimitiveType::U8)),
        ]);
        let mut known = HashSet::new();
        let slots = plan_column("t", &ty, &mut known, escaper());
        // one shared sizes stream, plus one value stream per field
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].key, "t%size0");
        assert_eq!(slots[1].key, "t.x");
        assert_eq!(slots[2].key, "t.y");
    }
}
