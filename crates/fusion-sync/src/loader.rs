//! SQLite loader for delimited source files
//!
//! Each source gets its own database file. `setup` loads every input file
//! into the table named after it (`fusion_ppi.txt` -> `fusion_ppi`,
//! `mitelman_db/MBCA.TXT.DATA` -> `MBCA`), replacing any previous copy.
//! Files sharing a name share the table.
//! Columns come from the header row when the file has one, otherwise they
//! are `col_1..col_n` sized to the widest row. All values are stored as TEXT.

use crate::error::Result;
use fusion_common::types::TextEncoding;
use rusqlite::{params_from_iter, Connection};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How to read the files handed to [`Database::setup`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub delimiter: u8,
    /// The first row holds column names, not data
    pub skip_header: bool,
    pub encoding: TextEncoding,
}

impl LoadOptions {
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            skip_header: false,
            encoding: TextEncoding::Utf8,
        }
    }

    pub fn with_header(mut self) -> Self {
        self.skip_header = true;
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::tsv()
    }
}

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "synchronous", "OFF")?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every file into the table named after it; returns rows per table.
    ///
    /// Files that map to the same table name are loaded into one table, in
    /// the order given. Each file is read twice: once to size the columns,
    /// once to insert, so no file is held in memory.
    pub fn setup(
        &mut self,
        files: &[PathBuf],
        options: &LoadOptions,
    ) -> Result<BTreeMap<String, usize>> {
        let mut groups: Vec<(String, Vec<&Path>)> = Vec::new();
        for file in files {
            let table = table_name(file);
            match groups.iter_mut().find(|(name, _)| *name == table) {
                Some((_, group)) => group.push(file),
                None => groups.push((table, vec![file.as_path()])),
            }
        }

        let mut counts = BTreeMap::new();
        for (table, group) in groups {
            let columns = measure_columns(&group, options)?;
            let inserted = self.replace_table(&table, &columns, &group, options)?;

            info!(
                database = %self.path.display(),
                table = %table,
                files = group.len(),
                rows = inserted,
                encoding = %options.encoding,
                "Loaded table"
            );
            counts.insert(table, inserted);
        }

        Ok(counts)
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    /// All rows of a table in insertion order, NULLs as `None`
    pub fn rows(&self, table: &str) -> Result<Vec<Vec<Option<String>>>> {
        let width = self.columns(table)?.len();
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} ORDER BY rowid", quote_ident(table)))?;
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, Option<String>>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn replace_table(
        &mut self,
        table: &str,
        columns: &[String],
        files: &[&Path],
        options: &LoadOptions,
    ) -> Result<usize> {
        let table_ident = quote_ident(table);
        let column_defs = columns
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        let width = columns.len();
        let mut inserted = 0;

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table_ident}; CREATE TABLE {table_ident} ({column_defs});"
        ))?;
        {
            let mut insert =
                tx.prepare(&format!("INSERT INTO {table_ident} VALUES ({placeholders})"))?;
            for file in files {
                let mut reader = open_delimited(file, options)?;
                let mut records = reader.byte_records();
                if options.skip_header {
                    records.next().transpose()?;
                }
                for record in records {
                    let fields = decode_record(&record?, options)?;
                    let values = (0..width).map(|i| fields.get(i).map(String::as_str));
                    insert.execute(params_from_iter(values))?;
                    inserted += 1;
                }
            }
        }
        tx.commit()?;

        Ok(inserted)
    }
}

fn open_delimited(file: &Path, options: &LoadOptions) -> Result<csv::Reader<std::fs::File>> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(file)?)
}

fn decode_record(record: &csv::ByteRecord, options: &LoadOptions) -> Result<Vec<String>> {
    Ok(record
        .iter()
        .map(|field| options.encoding.decode(field))
        .collect::<fusion_common::Result<Vec<_>>>()?)
}

/// First pass over a table's files: the header of the first file (when
/// headers are expected) and the widest data row decide the columns
fn measure_columns(files: &[&Path], options: &LoadOptions) -> Result<Vec<String>> {
    let mut header: Option<Vec<String>> = None;
    let mut widest = 0;
    let mut rows = 0usize;

    for file in files {
        let mut reader = open_delimited(file, options)?;
        for (i, record) in reader.byte_records().enumerate() {
            let record = record?;
            if options.skip_header && i == 0 {
                if header.is_none() {
                    header = Some(decode_record(&record, options)?);
                }
                continue;
            }
            widest = widest.max(record.len());
            rows += 1;
        }
    }

    let columns = column_names(header.as_deref().unwrap_or(&[]), widest);
    debug!(files = files.len(), rows, columns = columns.len(), "Measured delimited files");
    Ok(columns)
}

/// Table name from a file path: the file name up to its first `.`
pub fn table_name(file: &Path) -> String {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    sanitize_identifier(stem, "data")
}

/// Column names for a table: sanitized header names, then `col_<n>` for any
/// column beyond the header. Always at least one column.
fn column_names(header: &[String], widest: usize) -> Vec<String> {
    let width = header.len().max(widest).max(1);
    let mut seen = HashSet::new();

    (0..width)
        .map(|i| {
            let fallback = format!("col_{}", i + 1);
            let base = header
                .get(i)
                .map(|h| sanitize_identifier(h, &fallback))
                .unwrap_or(fallback);

            let mut name = base.clone();
            let mut suffix = 2;
            while !seen.insert(name.to_ascii_lowercase()) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            name
        })
        .collect()
}

fn sanitize_identifier(raw: &str, fallback: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('_');

    if cleaned.is_empty() {
        fallback.to_string()
    } else if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("c_{}", cleaned)
    } else {
        cleaned.to_string()
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_table_name() {
        assert_eq!(table_name(Path::new("fusion_ppi.txt")), "fusion_ppi");
        assert_eq!(table_name(Path::new("out/mitelman_db/MBCA.TXT.DATA")), "MBCA");
        assert_eq!(table_name(Path::new("CosmicFusionExport.tsv")), "CosmicFusionExport");
        assert_eq!(table_name(Path::new("2024-fusions.tsv")), "c_2024_fusions");
    }

    #[test]
    fn test_column_names_dedup_and_pad() {
        let header = vec!["Gene A".to_string(), "gene_a".to_string(), "".to_string()];
        assert_eq!(
            column_names(&header, 5),
            vec!["Gene_A", "gene_a_2", "col_3", "col_4", "col_5"]
        );
        assert_eq!(column_names(&[], 0), vec!["col_1"]);
    }

    #[test]
    fn test_setup_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "fusion_ppi.txt", b"BCR\tABL1\t12\nEML4\tALK\n");

        let mut db = Database::open(dir.path().join("fusiongdb.db")).unwrap();
        let counts = db.setup(&[file], &LoadOptions::tsv()).unwrap();

        assert_eq!(counts.get("fusion_ppi"), Some(&2));
        assert_eq!(db.columns("fusion_ppi").unwrap(), vec!["col_1", "col_2", "col_3"]);
        assert_eq!(
            db.rows("fusion_ppi").unwrap(),
            vec![
                vec![Some("BCR".to_string()), Some("ABL1".to_string()), Some("12".to_string())],
                vec![Some("EML4".to_string()), Some("ALK".to_string()), None],
            ]
        );
    }

    #[test]
    fn test_setup_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            dir.path(),
            "CosmicFusionExport.tsv",
            b"SAMPLE_ID\tFUSION ID\n1\tBCR-ABL1\n2\t\"quoted\tvalue\"\n",
        );

        let mut db = Database::open(dir.path().join("cosmic.db")).unwrap();
        let counts = db
            .setup(&[file], &LoadOptions::tsv().with_header())
            .unwrap();

        assert_eq!(counts.get("CosmicFusionExport"), Some(&2));
        // Quotes are data, so the embedded tab splits the field
        assert_eq!(
            db.columns("CosmicFusionExport").unwrap(),
            vec!["SAMPLE_ID", "FUSION_ID", "col_3"]
        );
        assert_eq!(db.row_count("CosmicFusionExport").unwrap(), 2);
    }

    #[test]
    fn test_setup_latin1() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "mitelman_db/MBCA.TXT.DATA", b"1\tM\xfcller\n");

        let mut db = Database::open(dir.path().join("mitelman.db")).unwrap();
        let options = LoadOptions::tsv().with_encoding(TextEncoding::Latin1);
        db.setup(&[file.clone()], &options).unwrap();
        assert_eq!(db.rows("MBCA").unwrap()[0][1].as_deref(), Some("Müller"));

        // The same bytes are not valid UTF-8
        let err = db.setup(&[file], &LoadOptions::tsv()).unwrap_err();
        assert!(matches!(err, crate::SyncError::Common(_)));
    }

    #[test]
    fn test_files_sharing_a_table_name_are_combined() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(dir.path(), "a/MBCA.TXT.DATA", b"1\tA\n2\tB\n3\tC\n");
        let second = write(dir.path(), "b/MBCA.TXT.DATA", b"4\tD\textra\n");

        let mut db = Database::open(dir.path().join("mitelman.db")).unwrap();
        let counts = db.setup(&[first, second], &LoadOptions::tsv()).unwrap();

        assert_eq!(counts.get("MBCA"), Some(&4));
        assert_eq!(db.row_count("MBCA").unwrap(), 4);
        assert_eq!(db.columns("MBCA").unwrap(), vec!["col_1", "col_2", "col_3"]);
        let rows = db.rows("MBCA").unwrap();
        assert_eq!(rows[0][2], None);
        assert_eq!(rows[3][2].as_deref(), Some("extra"));
    }

    #[test]
    fn test_combined_files_each_skip_their_header() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(dir.path(), "x/export.tsv", b"ID\tGENE\n1\tBCR\n");
        let second = write(dir.path(), "y/export.tsv", b"ID\tGENE\n2\tALK\n3\tERG\n");

        let mut db = Database::open(dir.path().join("cosmic.db")).unwrap();
        let counts = db
            .setup(&[first, second], &LoadOptions::tsv().with_header())
            .unwrap();

        assert_eq!(counts.get("export"), Some(&3));
        assert_eq!(db.row_count("export").unwrap(), 3);
        assert_eq!(db.columns("export").unwrap(), vec!["ID", "GENE"]);
    }

    #[test]
    fn test_failed_load_keeps_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "fusion_ppi.txt", b"BCR\tGRB2\n");

        let mut db = Database::open(dir.path().join("fusiongdb.db")).unwrap();
        db.setup(&[file.clone()], &LoadOptions::tsv()).unwrap();
        std::fs::write(&file, b"BCR\tGRB2\nM\xfcller\tX\n").unwrap();

        assert!(db.setup(&[file], &LoadOptions::tsv()).is_err());
        assert_eq!(db.row_count("fusion_ppi").unwrap(), 1);
    }

    #[test]
    fn test_setup_replaces_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("fusiongdb.db");
        let first = write(dir.path(), "uniprot_gsymbol.txt", b"P1\tA\nP2\tB\nP3\tC\n");

        let mut db = Database::open(&db_path).unwrap();
        db.setup(&[first.clone()], &LoadOptions::tsv()).unwrap();
        std::fs::write(&first, b"P9\tZ\n").unwrap();
        db.setup(&[first], &LoadOptions::tsv()).unwrap();

        assert_eq!(db.row_count("uniprot_gsymbol").unwrap(), 1);
    }
}
