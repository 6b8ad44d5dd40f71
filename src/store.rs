use std::path::{Path, PathBuf};

use log::{debug, info};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;

use crate::data::model::{ColumnKind, Table, Value};
use crate::error::Result;

// ---------------------------------------------------------------------------
// SQLite persistence
// ---------------------------------------------------------------------------

/// A SQLite database file holding named tables.
///
/// Every call opens its own connection and closes it before returning.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Open (creating if needed) the database at `path`, including any
    /// missing parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Connection::open(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `table` as `name`, replacing any existing table of that name.
    pub fn save(&self, table: &Table, name: &str) -> Result<()> {
        let mut conn = Connection::open(&self.path)?;
        let tx = conn.transaction()?;

        tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)), [])?;
        tx.execute(&create_table_sql(table, name), [])?;
        {
            let placeholders = vec!["?"; table.n_cols()].join(", ");
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} VALUES ({placeholders})",
                quote_ident(name)
            ))?;
            for i in 0..table.n_rows() {
                stmt.execute(rusqlite::params_from_iter(table.row(i)))?;
            }
        }
        tx.commit()?;

        let (rows, cols) = table.shape();
        info!("stored table {name} ({rows} rows x {cols} columns)");
        Ok(())
    }

    /// Read table `name` back in full.
    pub fn load(&self, name: &str) -> Result<Table> {
        let conn = Connection::open(&self.path)?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(name)))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut data: Vec<Vec<Value>> = vec![Vec::new(); columns.len()];
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (i, values) in data.iter_mut().enumerate() {
                values.push(from_sql(row.get_ref(i)?));
            }
        }
        debug!("loaded table {name} with {} columns", columns.len());
        Table::new(columns, data)
    }

    /// Names of every table in the database, sorted.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let conn = Connection::open(&self.path)?;
        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(table: &Table, name: &str) -> String {
    let columns: Vec<String> = table
        .columns()
        .map(|(col, values)| {
            let affinity = match ColumnKind::of(values) {
                ColumnKind::Integer | ColumnKind::Bool => " INTEGER",
                ColumnKind::Float => " REAL",
                ColumnKind::Text => " TEXT",
                ColumnKind::Empty | ColumnKind::Mixed => "",
            };
            format!("{}{affinity}", quote_ident(col))
        })
        .collect();
    format!("CREATE TABLE {} ({})", quote_ident(name), columns.join(", "))
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let out = match self {
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Float(v) if v.is_nan() => ToSqlOutput::from(rusqlite::types::Null),
            Value::Float(v) => ToSqlOutput::from(*v),
            Value::Bool(b) => ToSqlOutput::from(*b as i64),
            Value::String(s) => ToSqlOutput::from(s.as_str()),
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
        };
        Ok(out)
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Value::String(String::from_utf8_lossy(t).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use pretty_assertions::assert_eq;

    fn sample() -> Table {
        Table::from_rows(
            vec!["column0".into(), "column1".into(), "column2".into()],
            vec![
                vec![Value::Integer(0), Value::Integer(1), Value::Integer(2)],
                vec![Value::Integer(3), Value::Integer(4), Value::Integer(5)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.sqlite")).unwrap();

        store.save(&sample(), "test_table").unwrap();
        assert_eq!(store.load("test_table").unwrap(), sample());
    }

    #[test]
    fn round_trips_mixed_types_and_missing_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.sqlite")).unwrap();
        let table = Table::from_rows(
            vec!["Country".into(), "F2000".into(), "odd \"name\"".into()],
            vec![
                vec!["Chad".into(), Value::Float(0.25), Value::Null],
                vec![Value::Null, Value::Float(f64::NAN), Value::Integer(7)],
            ],
        )
        .unwrap();

        store.save(&table, "Forest area").unwrap();
        let loaded = store.load("Forest area").unwrap();
        assert_eq!(loaded.column_names(), table.column_names());
        assert_eq!(
            loaded.column("F2000").unwrap(),
            &[Value::Float(0.25), Value::Null][..]
        );
        assert_eq!(
            loaded.column("Country").unwrap(),
            &[Value::from("Chad"), Value::Null][..]
        );
    }

    #[test]
    fn save_replaces_existing_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.sqlite")).unwrap();

        store.save(&sample(), "t").unwrap();
        let smaller = sample().retain_columns(|c| c == "column1").take_rows(&[1]);
        store.save(&smaller, "t").unwrap();

        assert_eq!(store.load("t").unwrap(), smaller);
        assert_eq!(store.table_names().unwrap(), vec!["t".to_string()]);
    }

    #[test]
    fn saving_columnless_table_keeps_previous_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.sqlite")).unwrap();

        store.save(&sample(), "t").unwrap();
        let columnless = sample().retain_columns(|_| false);
        let err = store.save(&columnless, "t").unwrap_err();

        assert!(matches!(err, EtlError::Store(_)), "{err:?}");
        assert_eq!(store.load("t").unwrap(), sample());
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("climate_change.db");
        Store::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn loading_unknown_table_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.sqlite")).unwrap();
        assert!(matches!(store.load("nope"), Err(EtlError::Store(_))));
    }
}
