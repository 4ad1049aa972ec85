// ==============================================================================
// Search-Path Roots
// ==============================================================================
//
// A configured search-path entry becomes a `Root`: a directory, a zip/jar
// archive read in place, or a single standalone schema file. Every root can
// enumerate the schema files under it and resolve an import string to at most
// one file. Symlinks are followed transparently (classification and reads use
// symlink-following metadata) while reported `Location`s always carry the
// logical, as-configured base.
//
// Resolution also produces a *physical identity* per candidate so the loader
// can tell "two roots reaching one file" (not ambiguous) apart from "two
// different files for one import" (ambiguous).
//
// Standalone files are special: their root base is inferred by stripping the
// file's package-derived directory suffix from the configured path, which
// requires the file to be parsed first. `classify` therefore reports them
// back to the loader instead of building the root directly.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::ConfigError;
use crate::location::Location;

/// The schema file extension roots enumerate and resolve.
const SCHEMA_EXTENSION: &str = "proto";

/// What a configured location turned out to be.
pub(crate) enum Classification {
    /// A directory or archive root, usable immediately.
    Root(Root),
    /// A standalone schema file. The loader parses it for its package, then
    /// builds the root with `Root::standalone`.
    SchemaFile(PathBuf),
}

/// Classify a configured search-path location.
///
/// The location's `path` is the filesystem path; symlinks are followed when
/// deciding what it is.
pub(crate) fn classify(location: &Location) -> Result<Classification, ConfigError> {
    let path = Path::new(&location.path);
    let metadata = fs::metadata(path).map_err(|e| ConfigError::UnreadableRoot {
        path: location.path.clone(),
        reason: e.to_string(),
    })?;
    if metadata.is_dir() {
        return Ok(Classification::Root(Root::Directory(DirectoryRoot::new(
            location.path.clone(),
            path,
        ))));
    }
    if has_extension(path, "zip") || has_extension(path, "jar") {
        let root = ArchiveRoot::open(location.path.clone(), path)?;
        return Ok(Classification::Root(Root::Archive(root)));
    }
    if has_extension(path, SCHEMA_EXTENSION) {
        return Ok(Classification::SchemaFile(path.to_path_buf()));
    }
    Err(ConfigError::UnexpectedRoot {
        path: location.path.clone(),
    })
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// A single search-path entry.
pub(crate) enum Root {
    Directory(DirectoryRoot),
    Archive(ArchiveRoot),
    Standalone(StandaloneRoot),
}

/// An import resolved under one root: the logical location plus the physical
/// identity used for ambiguity detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ResolvedFile {
    pub(crate) location: Location,
    pub(crate) identity: FileIdentity,
}

/// Where a resolved file physically lives. Canonicalized, so one file reached
/// through a symlink and through its target carries one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum FileIdentity {
    Disk(PathBuf),
    Entry { archive: PathBuf, name: String },
}

impl Root {
    /// Build a standalone-file root. `configured` is the path as the caller
    /// wrote it; `package` is the file's declared package, used to infer how
    /// much of the leading path is the root base.
    pub(crate) fn standalone(configured: &str, file: PathBuf, package: Option<&str>) -> Root {
        let (base, import_path) = split_standalone(configured, package);
        let identity = fs::canonicalize(&file).unwrap_or_else(|_| file.clone());
        Root::Standalone(StandaloneRoot {
            base,
            import_path,
            file,
            identity,
        })
    }

    /// The logical base reported in this root's locations.
    pub(crate) fn base(&self) -> &str {
        match self {
            Root::Directory(root) => &root.base,
            Root::Archive(root) => &root.base,
            Root::Standalone(root) => &root.base,
        }
    }

    /// Every schema file under this root, in a deterministic order.
    pub(crate) fn schema_files(&self) -> io::Result<Vec<Location>> {
        match self {
            Root::Directory(root) => root.schema_files(),
            Root::Archive(root) => Ok(root
                .entries
                .iter()
                .map(|entry| Location::new(root.base.clone(), entry.clone()))
                .collect()),
            Root::Standalone(root) => Ok(vec![Location::new(
                root.base.clone(),
                root.import_path.clone(),
            )]),
        }
    }

    /// Resolve an import string under this root.
    pub(crate) fn resolve(&self, import: &str) -> Option<ResolvedFile> {
        match self {
            Root::Directory(root) => root.resolve(import),
            Root::Archive(root) => {
                if !root.entries.contains(import) {
                    return None;
                }
                Some(ResolvedFile {
                    location: Location::new(root.base.clone(), import),
                    identity: FileIdentity::Entry {
                        archive: root.identity.clone(),
                        name: import.to_string(),
                    },
                })
            }
            Root::Standalone(root) => {
                if import != root.import_path {
                    return None;
                }
                Some(ResolvedFile {
                    location: Location::new(root.base.clone(), import),
                    identity: FileIdentity::Disk(root.identity.clone()),
                })
            }
        }
    }

    /// Read the raw bytes of a location previously produced by this root.
    pub(crate) fn read(&self, location: &Location) -> io::Result<Vec<u8>> {
        match self {
            Root::Directory(root) => fs::read(root.dir.join(&location.path)),
            Root::Archive(root) => {
                let mut archive = root.archive.borrow_mut();
                let mut entry = archive.by_name(&location.path)?;
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
            Root::Standalone(root) => fs::read(&root.file),
        }
    }
}

/// A plain directory on disk.
pub(crate) struct DirectoryRoot {
    /// The path as configured; reported as the base of every location.
    base: String,
    dir: PathBuf,
}

impl DirectoryRoot {
    fn new(base: String, dir: &Path) -> DirectoryRoot {
        DirectoryRoot {
            base,
            dir: dir.to_path_buf(),
        }
    }

    fn schema_files(&self) -> io::Result<Vec<Location>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.dir).follow_links(true).sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if !has_extension(entry.path(), SCHEMA_EXTENSION) {
                continue;
            }
            if let Some(relative) = relative_slash_path(&self.dir, entry.path()) {
                files.push(Location::new(self.base.clone(), relative));
            }
        }
        Ok(files)
    }

    fn resolve(&self, import: &str) -> Option<ResolvedFile> {
        let joined = self.dir.join(import);
        let metadata = fs::metadata(&joined).ok()?;
        if !metadata.is_file() {
            return None;
        }
        let identity = fs::canonicalize(&joined).unwrap_or(joined);
        Some(ResolvedFile {
            location: Location::new(self.base.clone(), import),
            identity: FileIdentity::Disk(identity),
        })
    }
}

/// A zip or jar archive, read in place without extraction. The archive handle
/// stays open for the lifetime of the root (one loader session) and closes
/// when the root is dropped.
pub(crate) struct ArchiveRoot {
    base: String,
    /// Canonical path of the archive file.
    identity: PathBuf,
    archive: RefCell<ZipArchive<File>>,
    /// Schema entries in the central directory, sorted by name.
    entries: BTreeSet<String>,
}

impl ArchiveRoot {
    fn open(base: String, path: &Path) -> Result<ArchiveRoot, ConfigError> {
        let unreadable = |reason: String| ConfigError::UnreadableRoot {
            path: base.clone(),
            reason,
        };
        let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
        let archive = ZipArchive::new(file).map_err(|e| unreadable(e.to_string()))?;
        let suffix = format!(".{SCHEMA_EXTENSION}");
        let entries = archive
            .file_names()
            .filter(|name| name.ends_with(&suffix))
            .map(String::from)
            .collect();
        let identity = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Ok(ArchiveRoot {
            base,
            identity,
            archive: RefCell::new(archive),
            entries,
        })
    }
}

/// A single schema file configured directly on the search path. It resolves
/// exactly one import string: its own package-derived path.
pub(crate) struct StandaloneRoot {
    base: String,
    import_path: String,
    file: PathBuf,
    identity: PathBuf,
}

/// Infer the (base, import path) split for a standalone file.
///
/// The file's directory should end with the package's directory form; the
/// part before that is the base. A file whose directory does not match its
/// package keeps its whole directory as the base and imports as its bare
/// file name.
fn split_standalone(configured: &str, package: Option<&str>) -> (String, String) {
    let (dir, file_name) = match configured.rfind('/') {
        Some(slash) => (&configured[..slash], &configured[slash + 1..]),
        None => ("", configured),
    };
    if let Some(package) = package.filter(|p| !p.is_empty()) {
        let package_dir = package.replace('.', "/");
        if dir == package_dir {
            return (String::new(), format!("{package_dir}/{file_name}"));
        }
        if let Some(base) = dir.strip_suffix(&format!("/{package_dir}")) {
            return (base.to_string(), format!("{package_dir}/{file_name}"));
        }
    }
    (dir.to_string(), file_name.to_string())
}

/// `path` relative to `base`, rendered with `/` separators.
fn relative_slash_path(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
