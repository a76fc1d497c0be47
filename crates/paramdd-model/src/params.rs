//! Parameter records and ordered parameter sets
//!
//! A parameter file holds one record per line:
//!
//! ```text
//! smt.arith.solver = 6 (unsigned int)
//! sat.gc = glue_psm (symbol)
//! ```
//!
//! No escaping is defined. A value containing ` = ` or a trailing
//! parenthesised group is split the same greedy way on every load, so such
//! values round-trip only when the split is unambiguous.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// `KEY = VALUE (TYPE)` with greedy key and value groups
static RECORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // Literal pattern, cannot fail to compile
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^(.*)\s=\s(.*)\s\((.*)\)$").unwrap()
});

/// A single `KEY = VALUE (TYPE)` record
///
/// Value and type tag are opaque: they are compared and written back
/// verbatim, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name, unique within a set
    pub key: String,
    /// Raw value text
    pub value: String,
    /// Type tag without the surrounding parentheses
    pub ttype: String,
}

impl Param {
    /// Create a record
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>, ttype: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttype: ttype.into(),
        }
    }

    /// Parse one record line (without the trailing newline)
    ///
    /// Returns `None` if the line does not have the record shape.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let captures = RECORD_REGEX.captures(line)?;
        Some(Self::new(&captures[1], &captures[2], &captures[3]))
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} ({})", self.key, self.value, self.ttype)
    }
}

/// Ordered collection of parameter records
///
/// Record order is the order of the source file and is significant: two sets
/// are diffed position by position (see [`crate::diff`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSet {
    records: Vec<Param>,
    index: HashMap<String, usize>,
}

impl ParamSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from records, rejecting duplicate keys
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateKey`] if a key repeats.
    pub fn from_records(records: impl IntoIterator<Item = Param>) -> Result<Self> {
        let mut set = Self::new();
        for (line, record) in records.into_iter().enumerate() {
            set.push_at(record, line + 1)?;
        }
        Ok(set)
    }

    /// Append a record at the end of the set
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateKey`] if the key is already present.
    pub fn push(&mut self, record: Param) -> Result<()> {
        let line = self.records.len() + 1;
        self.push_at(record, line)
    }

    fn push_at(&mut self, record: Param, line: usize) -> Result<()> {
        if self.index.contains_key(&record.key) {
            return Err(Error::DuplicateKey {
                line,
                key: record.key,
            });
        }
        self.index.insert(record.key.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Parse records from a buffered reader
    ///
    /// Blank lines are skipped; every other line must be a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for a malformed line, [`Error::DuplicateKey`]
    /// for a repeated key, or [`Error::Stream`] if reading fails.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut set = Self::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if line.trim().is_empty() {
                continue;
            }
            let record = Param::parse_line(line).ok_or_else(|| Error::Parse {
                line: idx + 1,
                content: line.to_string(),
            })?;
            set.push_at(record, idx + 1)?;
        }
        Ok(set)
    }

    /// Load a parameter file
    ///
    /// # Errors
    ///
    /// Returns an error naming `path` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(std::io::BufReader::new(file)).map_err(|e| e.in_file(path))
    }

    /// Write every record, in order, one per line
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn write_to<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for record in &self.records {
            writeln!(writer, "{record}")?;
        }
        writer.flush()
    }

    /// Render the set in record format
    #[must_use]
    pub fn to_record_string(&self) -> String {
        self.to_string()
    }

    /// Overwrite `path` with the set in record format
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be created or written.
    pub fn dump_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let io_err = |source| Error::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = std::fs::File::create(path).map_err(io_err)?;
        self.write_to(BufWriter::new(file)).map_err(io_err)
    }

    /// Overwrite the record stored under `key`
    ///
    /// Returns the record that was replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownKey`] if `key` is absent and
    /// [`Error::ReplaceKeyMismatch`] if `record` carries another key.
    pub fn replace(&mut self, key: &str, record: Param) -> Result<Param> {
        if record.key != key {
            return Err(Error::ReplaceKeyMismatch {
                slot: key.to_string(),
                record: record.key,
            });
        }
        let position = self
            .position(key)
            .ok_or_else(|| Error::UnknownKey(key.to_string()))?;
        Ok(std::mem::replace(&mut self.records[position], record))
    }

    /// Look up a record by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Param> {
        self.position(key).map(|i| &self.records[i])
    }

    /// Position of `key` in file order
    #[must_use]
    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the set holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in file order
    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.records.iter()
    }

    /// Keys in file order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.key.as_str())
    }

    /// Records as a slice
    #[must_use]
    pub fn records(&self) -> &[Param] {
        &self.records
    }
}

impl FromStr for ParamSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_reader(s.as_bytes())
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "{record}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ParamSet {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
