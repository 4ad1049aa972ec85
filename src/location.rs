// ==============================================================================
// Source Locations
// ==============================================================================
//
// Every diagnostic in this crate points at a `Location`: the search-path root
// a file came from (a directory, archive, or standalone file), the path of the
// file relative to that root, and optionally a line/column inside the file.
// Locations are plain values -- they hold no handle to the underlying storage,
// and two locations are equal iff their fields are equal. The `Ord` impl gives
// diagnostics a deterministic order when candidates must be sorted.

use std::fmt;

/// A position within the schema search space, used purely for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    /// The root that contains the file: a directory path, an archive path, or
    /// an inferred base directory for a standalone file. Empty when the
    /// location was configured as a bare path.
    pub base: String,
    /// Path of the file relative to `base`, with `/` separators.
    pub path: String,
    /// 1-based line number, if known.
    pub line: Option<u32>,
    /// 1-based column number, if known.
    pub column: Option<u32>,
}

impl Location {
    /// A location with no base, typically a caller-configured search path.
    pub fn get(path: impl Into<String>) -> Location {
        Location {
            base: String::new(),
            path: path.into(),
            line: None,
            column: None,
        }
    }

    /// A location for `path` under the root `base`.
    pub fn new(base: impl Into<String>, path: impl Into<String>) -> Location {
        Location {
            base: base.into(),
            path: path.into(),
            line: None,
            column: None,
        }
    }

    /// The same file, positioned at `line` and `column` (both 1-based).
    pub fn at(&self, line: u32, column: u32) -> Location {
        Location {
            base: self.base.clone(),
            path: self.path.clone(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// The same position with the root stripped, for root-relative reporting.
    pub fn without_base(&self) -> Location {
        Location {
            base: String::new(),
            ..self.clone()
        }
    }

    /// A sibling location under the same root.
    pub fn with_path(&self, path: impl Into<String>) -> Location {
        Location {
            base: self.base.clone(),
            path: path.into(),
            line: None,
            column: None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.base.is_empty() {
            write!(f, "{}/", self.base)?;
        }
        f.write_str(&self.path)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}
