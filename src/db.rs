// 🗄️ Storage collaborator
//
// The engine only needs three things from storage: list a relation's columns,
// read it (optionally projected), and replace a set of relations at once.
// SqliteStore is the production backend, MemoryStore backs tests and dry runs.

use crate::error::{EngineError, Result};
use crate::table::{Table, Value};
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

pub trait TableStore {
    /// Column names of a stored relation
    fn columns(&self, table: &str) -> Result<Vec<String>>;

    /// Read a full relation (subject to the store's row bound)
    fn read_table(&self, table: &str) -> Result<Table>;

    /// Read selected columns of a relation (subject to the store's row bound)
    fn read_columns(&self, table: &str, columns: &[&str]) -> Result<Table>;

    /// Replace every given relation, all or nothing
    fn replace_tables(&mut self, tables: Vec<Table>) -> Result<()>;
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
    read_limit: Option<usize>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(SqliteStore {
            conn,
            read_limit: None,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(SqliteStore {
            conn: Connection::open_in_memory()?,
            read_limit: None,
        })
    }

    pub fn with_read_limit(mut self, read_limit: Option<usize>) -> Self {
        self.read_limit = read_limit;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Number of rows currently stored in a relation
    pub fn count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    fn select(&self, table: &str, columns: Vec<String>) -> Result<Table> {
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("SELECT {} FROM {}", column_list, quote_ident(table));
        if let Some(limit) = self.read_limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let width = columns.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut result = Table::with_columns(table, columns);
        for row in rows {
            result.push_row(row);
        }

        debug!(table, rows = result.len(), "read relation");
        Ok(result)
    }
}

impl TableStore for SqliteStore {
    fn columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;

        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Err(EngineError::MissingTable(table.to_string()));
        }
        Ok(columns)
    }

    fn read_table(&self, table: &str) -> Result<Table> {
        let columns = self.columns(table)?;
        self.select(table, columns)
    }

    fn read_columns(&self, table: &str, columns: &[&str]) -> Result<Table> {
        let available = Table::with_columns(table, self.columns(table)?);
        available.require_columns(columns)?;
        self.select(table, columns.iter().map(|c| c.to_string()).collect())
    }

    fn replace_tables(&mut self, tables: Vec<Table>) -> Result<()> {
        // One transaction: either every relation is replaced or none is
        let tx = self.conn.transaction()?;

        for table in &tables {
            let name = quote_ident(&table.name);
            tx.execute(&format!("DROP TABLE IF EXISTS {}", name), [])?;

            let column_defs = table
                .columns()
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            tx.execute(&format!("CREATE TABLE {} ({})", name, column_defs), [])?;

            let placeholders = (1..=table.columns().len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = tx.prepare(&format!("INSERT INTO {} VALUES ({})", name, placeholders))?;
            for row in table.rows() {
                stmt.execute(params_from_iter(row.iter()))?;
            }

            debug!(table = %table.name, rows = table.len(), "replaced relation");
        }

        tx.commit()?;
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Table>,
    read_limit: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_limit(mut self, read_limit: Option<usize>) -> Self {
        self.read_limit = read_limit;
        self
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn get(&self, table: &str) -> Option<&Table> {
        self.tables.get(table)
    }

    fn bounded(&self, mut table: Table) -> Table {
        if let Some(limit) = self.read_limit {
            table.truncate(limit);
        }
        table
    }
}

impl TableStore for MemoryStore {
    fn columns(&self, table: &str) -> Result<Vec<String>> {
        self.tables
            .get(table)
            .map(|t| t.columns().to_vec())
            .ok_or_else(|| EngineError::MissingTable(table.to_string()))
    }

    fn read_table(&self, table: &str) -> Result<Table> {
        let stored = self
            .tables
            .get(table)
            .ok_or_else(|| EngineError::MissingTable(table.to_string()))?;
        Ok(self.bounded(stored.clone()))
    }

    fn read_columns(&self, table: &str, columns: &[&str]) -> Result<Table> {
        let stored = self
            .tables
            .get(table)
            .ok_or_else(|| EngineError::MissingTable(table.to_string()))?;
        Ok(self.bounded(stored.project(columns)?))
    }

    fn replace_tables(&mut self, tables: Vec<Table>) -> Result<()> {
        for table in tables {
            self.tables.insert(table.name.clone(), table);
        }
        Ok(())
    }
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// Read a CSV relation: header row gives column names, empty cells are NULL
pub fn read_csv_table<R: Read>(name: &str, reader: R) -> Result<Table> {
    let mut rdr = csv::Reader::from_reader(reader);

    let columns: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut table = Table::with_columns(name, columns);
    for record in rdr.records() {
        let record = record?;
        table.push_row(
            record
                .iter()
                .map(|cell| {
                    let cell = cell.trim();
                    if cell.is_empty() {
                        Value::Null
                    } else {
                        Value::Text(cell.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(table)
}

pub fn load_csv(name: &str, csv_path: &Path) -> Result<Table> {
    let file = std::fs::File::open(csv_path)?;
    read_csv_table(name, file)
}

/// Load a cleaned-transaction CSV into the store as the named relation
pub fn import_csv<S: TableStore>(store: &mut S, name: &str, csv_path: &Path) -> Result<usize> {
    let table = load_csv(name, csv_path)?;
    let rows = table.len();
    store.replace_tables(vec![table])?;

    info!(table = name, rows, "imported CSV");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people_table(name: &str) -> Table {
        let mut table = Table::new(name, &["id", "alias", "amount"]);
        table.push_row(vec![
            Value::Text("1".to_string()),
            Value::Text("abebe kebede".to_string()),
            Value::Real(100.0),
        ]);
        table.push_row(vec![Value::Text("2".to_string()), Value::Null, Value::Integer(7)]);
        table.push_row(vec![
            Value::Text("3".to_string()),
            Value::Text("x".to_string()),
            Value::Real(0.5),
        ]);
        table
    }

    #[test]
    fn test_sqlite_replace_and_read_back() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.replace_tables(vec![people_table("people")]).unwrap();

        assert_eq!(store.columns("people").unwrap(), vec!["id", "alias", "amount"]);
        assert_eq!(store.count("people").unwrap(), 3);

        let read = store.read_table("people").unwrap();
        assert_eq!(read, people_table("people"));

        let projected = store.read_columns("people", &["amount", "id"]).unwrap();
        assert_eq!(projected.columns(), &["amount".to_string(), "id".to_string()]);
        assert_eq!(projected.rows()[1][0], Value::Integer(7));
    }

    #[test]
    fn test_sqlite_replace_overwrites_previous_contents() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.replace_tables(vec![people_table("people")]).unwrap();

        let mut smaller = Table::new("people", &["id"]);
        smaller.push_row(vec![Value::Text("only".to_string())]);
        store.replace_tables(vec![smaller]).unwrap();

        assert_eq!(store.columns("people").unwrap(), vec!["id"]);
        assert_eq!(store.count("people").unwrap(), 1);
    }

    #[test]
    fn test_sqlite_read_limit_truncates_silently() {
        let mut store = SqliteStore::in_memory().unwrap().with_read_limit(Some(2));
        store.replace_tables(vec![people_table("people")]).unwrap();

        assert_eq!(store.read_table("people").unwrap().len(), 2);
    }

    #[test]
    fn test_sqlite_missing_table_and_columns() {
        let mut store = SqliteStore::in_memory().unwrap();
        assert!(matches!(
            store.columns("nope"),
            Err(EngineError::MissingTable(_))
        ));

        store.replace_tables(vec![people_table("people")]).unwrap();
        assert!(matches!(
            store.read_columns("people", &["id", "phone"]),
            Err(EngineError::MissingColumns { .. })
        ));
    }

    #[test]
    fn test_memory_store_matches_sqlite_contract() {
        let mut store = MemoryStore::new().with_read_limit(Some(1));
        store.replace_tables(vec![people_table("people")]).unwrap();

        assert_eq!(store.columns("people").unwrap().len(), 3);
        assert_eq!(store.read_table("people").unwrap().len(), 1);
        assert_eq!(store.read_columns("people", &["alias"]).unwrap().columns().len(), 1);
        assert!(store.read_table("missing").is_err());
    }

    #[test]
    fn test_read_csv_table() {
        let data = "TransactionId, AmountInBirr ,benfullname\nt1,100.5,abebe\nt2,,\n";
        let table = read_csv_table("cleaned_transactions", data.as_bytes()).unwrap();

        assert_eq!(
            table.columns(),
            &["transactionid".to_string(), "amountinbirr".to_string(), "benfullname".to_string()]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0][1], Value::Text("100.5".to_string()));
        assert_eq!(table.rows()[1][1], Value::Null);
        assert_eq!(table.rows()[1][2], Value::Null);
    }
}
