//! `columns.txt`: the ordered `(name, type)` descriptor of a part (§3, §6).

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{io_err, Error, Result};
use crate::types::ColumnType;

/// One logical column as declared to a [`PartAssembler`](crate::part::PartAssembler).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub ty: ColumnType,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Writes the `<name>\t<type-expr>` grammar from SPEC_FULL §6, one line per column, in
/// declaration order.
pub fn write_columns_txt(path: impl AsRef<Path>, columns: &[ColumnDescriptor]) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path).map_err(|e| io_err(path, e))?;
    for column in columns {
        writeln!(file, "{}\t{}", column.name, column.ty.to_grammar()).map_err(|e| io_err(path, e))?;
    }
    Ok(())
}

/// Parses a `columns.txt` file back into its ordered column list.
pub fn read_columns_txt(path: impl AsRef<Path>) -> Result<Vec<ColumnDescriptor>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut columns = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| io_err(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, '\t');
        let name = parts
            .next()
            .ok_or_else(|| Error::InvalidConfig(format!("malformed columns.txt line: {:?}", line)))?;
        let type_expr = parts
            .next()
            .ok_or_else(|| Error::InvalidConfig(format!("malformed columns.txt line: {:?}", line)))?;
        columns.push(ColumnDescriptor::new(name, ColumnType::from_grammar(type_expr)?));
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveType;

    #[test]
    fn round_trips_through_text() {
        let columns = vec![
            ColumnDescriptor::new("n", ColumnType::Primitive(PrimitiveType::U32)),
            ColumnDescriptor::new(
                "a",
                ColumnType::Nullable(Box::new(ColumnType::Array(Box::new(ColumnType::Primitive(
                    PrimitiveType::U8,
                ))))),
            ),
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("columns.txt");
        write_columns_txt(&path, &columns).unwrap();
        let read_back = read_columns_txt(&path).unwrap();
        assert_eq!(columns, read_back);
    }
}
