use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
};

use crate::{error::TableLocation, CosmologyError, Result};

const BUNDLED_MODES: &str = include_str!("../../data/mappings/modes.csv");
const BUNDLED_FAMILIES: &str = include_str!("../../data/mappings/modal_families_index.csv");
const BUNDLED_ELEMENTS: &str = include_str!("../../data/mappings/element_timbres.csv");

/// Separator used inside list-valued cells such as `members` or `aliases`.
pub const LIST_SEPARATOR: char = ';';

/// The three canonical source tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableName {
    Modes,
    FamilyIndex,
    ElementTimbres,
}

impl TableName {
    pub const ALL: [TableName; 3] = [
        TableName::Modes,
        TableName::FamilyIndex,
        TableName::ElementTimbres,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            TableName::Modes => "modes.csv",
            TableName::FamilyIndex => "modal_families_index.csv",
            TableName::ElementTimbres => "element_timbres.csv",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// One data row together with the line it was read from.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub line: u64,
    cells: Vec<String>,
}

/// A header-addressed CSV table. Cells are trimmed; nothing is interpreted
/// beyond that.
#[derive(Debug, Clone)]
pub struct RawTable {
    name: TableName,
    headers: Vec<String>,
    rows: Vec<RawRow>,
}

impl RawTable {
    pub fn parse(name: TableName, text: &str) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut seen = HashSet::new();
        for header in &headers {
            if header.is_empty() {
                return Err(CosmologyError::validation(
                    TableLocation::new(name.file_name(), None, "<header>"),
                    "header contains an unnamed column",
                ));
            }
            if !seen.insert(header.as_str()) {
                return Err(CosmologyError::validation(
                    TableLocation::new(name.file_name(), None, header.clone()),
                    "column is declared more than once",
                ));
            }
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|pos| pos.line()).unwrap_or_default();
            if record.iter().all(str::is_empty) {
                continue;
            }
            if record.len() != headers.len() {
                return Err(CosmologyError::validation(
                    TableLocation::new(name.file_name(), Some(line), "<row>"),
                    format!(
                        "row has {} fields but the header declares {}",
                        record.len(),
                        headers.len()
                    ),
                ));
            }
            rows.push(RawRow {
                line,
                cells: record.iter().map(str::to_string).collect(),
            });
        }

        Ok(Self {
            name,
            headers,
            rows,
        })
    }

    pub fn name(&self) -> TableName {
        self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Fails with a validation error naming the first missing column.
    pub fn require_columns(&self, columns: &[&str]) -> Result<()> {
        match columns.iter().find(|column| !self.has_column(column)) {
            Some(missing) => Err(CosmologyError::validation(
                self.location(None, *missing),
                "required column is missing",
            )),
            None => Ok(()),
        }
    }

    /// Cell value for `column`, or `None` when the column does not exist.
    pub fn cell<'a>(&self, row: &'a RawRow, column: &str) -> Option<&'a str> {
        self.column_index(column)
            .and_then(|index| row.cells.get(index))
            .map(String::as_str)
    }

    /// Non-empty cell value for a required column.
    pub fn required<'a>(&self, row: &'a RawRow, column: &str) -> Result<&'a str> {
        match self.cell(row, column) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(CosmologyError::validation(
                self.location(Some(row.line), column),
                "value is empty",
            )),
        }
    }

    /// Splits a list cell on [`LIST_SEPARATOR`], dropping empty entries.
    pub fn list(&self, row: &RawRow, column: &str) -> Vec<String> {
        self.cell(row, column)
            .map(|value| {
                value
                    .split(LIST_SEPARATOR)
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn location(&self, row: Option<u64>, field: impl Into<String>) -> TableLocation {
        TableLocation::new(self.name.file_name(), row, field)
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == column)
    }
}

/// The complete input of one load.
#[derive(Debug, Clone)]
pub struct TableSet {
    pub modes: RawTable,
    pub families: RawTable,
    pub elements: RawTable,
}

impl TableSet {
    pub fn from_texts(modes: &str, families: &str, elements: &str) -> Result<Self> {
        Ok(Self {
            modes: RawTable::parse(TableName::Modes, modes)?,
            families: RawTable::parse(TableName::FamilyIndex, families)?,
            elements: RawTable::parse(TableName::ElementTimbres, elements)?,
        })
    }

    /// The canonical tables compiled into the crate.
    pub fn bundled() -> Result<Self> {
        Self::from_texts(BUNDLED_MODES, BUNDLED_FAMILIES, BUNDLED_ELEMENTS)
    }

    /// Reads the three tables from `dir` using their canonical file names.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        tracing::debug!(dir = %dir.display(), "reading canonical tables");
        let read = |name: TableName| -> Result<RawTable> {
            let path = dir.join(name.file_name());
            let text = std::fs::read_to_string(&path)
                .map_err(|source| CosmologyError::Read { path, source })?;
            RawTable::parse(name, &text)
        };
        Ok(Self {
            modes: read(TableName::Modes)?,
            families: read(TableName::FamilyIndex)?,
            elements: read(TableName::ElementTimbres)?,
        })
    }

    /// Loads from the first candidate directory that exists. Returns `None`
    /// when none of them do.
    pub fn discover<P: AsRef<Path>>(candidates: &[P]) -> Result<Option<(PathBuf, Self)>> {
        for candidate in candidates {
            let dir = candidate.as_ref();
            if dir.is_dir() {
                let tables = Self::from_dir(dir)?;
                return Ok(Some((dir.to_path_buf(), tables)));
            }
            tracing::debug!(dir = %dir.display(), "mapping directory not present");
        }
        Ok(None)
    }

    pub fn table(&self, name: TableName) -> &RawTable {
        match name {
            TableName::Modes => &self.modes,
            TableName::FamilyIndex => &self.families,
            TableName::ElementTimbres => &self.elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_rows_and_line_numbers() {
        let text = "# leading comment\nid,members\n a , x;y \n\nb,z\n";
        let table = RawTable::parse(TableName::FamilyIndex, text).unwrap();

        assert_eq!(table.headers(), ["id", "members"]);
        assert_eq!(table.rows().len(), 2);

        let first = &table.rows()[0];
        assert_eq!(table.cell(first, "id"), Some("a"));
        assert_eq!(table.list(first, "members"), vec!["x", "y"]);
        assert_eq!(table.cell(first, "missing"), None);
        assert!(table.rows()[1].line > first.line);
    }

    #[test]
    fn rejects_duplicate_header_columns() {
        let err = RawTable::parse(TableName::Modes, "mode_id,mode_id\na,b\n").unwrap_err();
        assert!(matches!(err, CosmologyError::Validation { .. }));
        assert!(err.to_string().contains("modes.csv"));
    }

    #[test]
    fn rejects_ragged_rows_with_their_line() {
        let err = RawTable::parse(TableName::Modes, "a,b\n1,2\n3\n").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("line 3"), "{text}");
    }

    #[test]
    fn required_cells_must_be_present() {
        let table = RawTable::parse(TableName::Modes, "mode_id,notes\nx,\n").unwrap();
        let row = &table.rows()[0];
        assert_eq!(table.required(row, "mode_id").unwrap(), "x");
        assert!(table.required(row, "notes").is_err());
        assert!(table.require_columns(&["mode_id", "family_id"]).is_err());
    }

    #[test]
    fn bundled_tables_parse() {
        let tables = TableSet::bundled().unwrap();
        assert_eq!(tables.modes.rows().len(), 24);
        assert_eq!(tables.families.rows().len(), 12);
        assert!(tables.table(TableName::ElementTimbres).has_column("family_id"));
    }

    #[test]
    fn discover_skips_missing_directories() {
        let found = TableSet::discover(&["/definitely/not/a/mapping/dir"]).unwrap();
        assert!(found.is_none());
    }
}
