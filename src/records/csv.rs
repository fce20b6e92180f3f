//! Minimal CSV reading and writing
//!
//! Handles quoted fields, doubled quotes, embedded commas/newlines and CRLF line
//! endings, which is everything the chunk, backstory and results files use.

use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Escape a field for CSV output
///
/// Fields containing a comma, quote or line break are wrapped in quotes with
/// inner quotes doubled.
pub fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
    {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render one CSV line (without trailing newline)
pub fn format_row<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| escape_csv(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse CSV text into records
///
/// Blank lines between records are skipped. An unterminated quoted field is an
/// error since the rest of the file cannot be trusted.
pub fn parse(input: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => {
                in_quotes = true;
                field_started = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                field_started = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                if field_started || !field.is_empty() || !record.is_empty() {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                field_started = false;
            }
            _ => {
                field.push(c);
                field_started = true;
            }
        }
    }

    if in_quotes {
        bail!("Unterminated quoted field in record {}", records.len() + 1);
    }
    if field_started || !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

/// A parsed CSV file with a header row
#[derive(Debug, Clone)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Parse CSV text whose first record is the header
    pub fn parse(input: &str) -> Result<Self> {
        let mut records = parse(input)?.into_iter();
        let headers = records
            .next()
            .map(|h| h.into_iter().map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();
        Ok(Self {
            headers,
            rows: records.collect(),
        })
    }

    /// Read and parse a CSV file
    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse CSV file: {}", path.display()))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Index of the first header matching any of the given names
    pub fn column(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.headers.iter().position(|h| h == name))
    }

    /// Rows with their 1-based record number
    pub fn rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i + 1, row.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Field lookup that treats a missing column and a short row the same way
pub fn field<'a>(row: &'a [String], column: Option<usize>) -> Option<&'a str> {
    column.and_then(|c| row.get(c)).map(|s| s.as_str())
}

/// Write a complete CSV file, replacing any existing one
pub fn write_file<S: AsRef<str>>(path: &Path, header: &[&str], rows: &[Vec<S>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", format_row(header))?;
    for row in rows {
        writeln!(writer, "{}", format_row(row))?;
    }
    writer.flush()?;
    Ok(())
}

/// Append rows to a CSV file, writing the header only when the file is new
pub fn append_rows<S: AsRef<str>>(path: &Path, header: &[&str], rows: &[Vec<S>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open CSV file for append: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    if is_new {
        writeln!(writer, "{}", format_row(header))?;
    }
    for row in rows {
        writeln!(writer, "{}", format_row(row))?;
    }
    writer.flush()?;
    Ok(())
}
