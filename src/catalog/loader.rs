use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::common::{DbError, Result, StorageConfig, TableId, DEFAULT_STRING_LENGTH};
use crate::storage::HeapFile;
use crate::tuple::{Column, DataType, Schema};

use super::Catalog;

/// One parsed line of a schema file.
#[derive(Debug, PartialEq, Eq)]
struct TableDef {
    name: String,
    columns: Vec<Column>,
    primary_key: String,
}

/// Registers every table listed in the schema file at `path`.
///
/// Each non-blank line has the form `name (field type [pk], ...)` where type is
/// `int` or `string`. Table `name` is backed by `<dir>/<name>.dat`, created if
/// missing. Returns the registered ids in file order.
pub fn load_schema<P: AsRef<Path>>(catalog: &Catalog, path: P, config: &StorageConfig) -> Result<Vec<TableId>> {
    let path = path.as_ref();
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let text = fs::read_to_string(path)?;

    let mut ids = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let def = parse_line(line).map_err(|reason| DbError::SchemaFile { line: i + 1, reason })?;
        let schema = Arc::new(Schema::new(def.columns)?);
        let store = HeapFile::open(base.join(format!("{}.dat", def.name)), schema, config.page_size)?;
        ids.push(catalog.add_table(Arc::new(store), def.name, def.primary_key));
    }
    Ok(ids)
}

fn parse_line(line: &str) -> std::result::Result<TableDef, String> {
    let open = line.find('(').ok_or("missing '('")?;
    let close = line.rfind(')').ok_or("missing ')'")?;
    if close < open {
        return Err("')' before '('".into());
    }
    let name = line[..open].trim();
    if name.is_empty() {
        return Err("missing table name".into());
    }

    let mut columns = Vec::new();
    let mut primary_key = String::new();
    for field in line[open + 1..close].split(',') {
        let parts: Vec<&str> = field.split_whitespace().collect();
        let (field_name, type_name, annotation) = match parts.as_slice() {
            [n, t] => (*n, *t, None),
            [n, t, a] => (*n, *t, Some(*a)),
            _ => return Err(format!("cannot parse field '{}'", field.trim())),
        };
        let data_type = DataType::parse(type_name, DEFAULT_STRING_LENGTH)
            .ok_or_else(|| format!("unknown type '{}'", type_name))?;
        match annotation {
            None => {}
            Some("pk") => primary_key = field_name.to_string(),
            Some(other) => return Err(format!("unknown annotation '{}'", other)),
        }
        columns.push(Column::new(field_name, data_type));
    }

    Ok(TableDef {
        name: name.to_string(),
        columns,
        primary_key,
    })
}
