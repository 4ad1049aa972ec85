// ==============================================================================
// Schema Loader
// ==============================================================================
//
// Drives one load session: the source-path roots are enumerated eagerly and
// every schema file under them is parsed up front; proto-path roots are only
// consulted lazily, as imports demand them, and each import path is resolved
// and parsed at most once. Loaded files are keyed by their root-relative path,
// which is also their import string, so an import that names a source file
// never touches the proto path at all.
//
// Loading failures -- a missing import, an import two roots disagree about, a
// file that will not decode or parse -- are collected instead of thrown, so
// one run reports every problem in the compilation at once.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::ast::{Parser, ProtoFileElement};
use crate::error::{ConfigError, Error, ErrorCollector, SchemaErrors};
use crate::linker::Linker;
use crate::location::Location;
use crate::model::schema::Schema;
use crate::roots::{self, Classification, ResolvedFile, Root};

/// Loads, decodes, and parses schema files from configured roots, then hands
/// them to the linker. One loader runs one session: configure roots with
/// [`init_roots`](SchemaLoader::init_roots), then call
/// [`load_schema`](SchemaLoader::load_schema).
pub struct SchemaLoader {
    parser: Box<dyn Parser>,
    source_roots: Vec<Root>,
    proto_roots: Vec<Root>,
    /// Parsed files keyed by import path. `None` marks a path whose load
    /// failed; the failure is already collected, so later imports of the
    /// same path stay quiet.
    loaded: IndexMap<String, Option<ProtoFileElement>>,
    /// Import paths of the eagerly loaded source files, in enumeration order.
    source_files: IndexSet<String>,
    sources_loaded: bool,
    errors: ErrorCollector,
}

impl SchemaLoader {
    pub fn new(parser: Box<dyn Parser>) -> SchemaLoader {
        SchemaLoader {
            parser,
            source_roots: Vec::new(),
            proto_roots: Vec::new(),
            loaded: IndexMap::new(),
            source_files: IndexSet::new(),
            sources_loaded: false,
            errors: ErrorCollector::new(),
        }
    }

    /// Configure the search roots. Source roots hold the files being
    /// compiled; proto-path roots hold dependencies, loaded on demand.
    /// A path that is not a directory, archive, or schema file fails here.
    pub fn init_roots(
        &mut self,
        source_path: &[Location],
        proto_path: &[Location],
    ) -> Result<(), ConfigError> {
        self.source_roots = Self::roots_from(self.parser.as_ref(), source_path)?;
        self.proto_roots = Self::roots_from(self.parser.as_ref(), proto_path)?;
        Ok(())
    }

    fn roots_from(parser: &dyn Parser, locations: &[Location]) -> Result<Vec<Root>, ConfigError> {
        let mut result = Vec::with_capacity(locations.len());
        for location in locations {
            match roots::classify(location)? {
                Classification::Root(root) => result.push(root),
                Classification::SchemaFile(file) => {
                    result.push(Self::standalone_root(parser, location, file)?);
                }
            }
        }
        Ok(result)
    }

    /// Build the root for a schema file configured directly on the search
    /// path. Its base is inferred from the file's declared package, so the
    /// file is parsed here just for that; decode and parse failures stay
    /// quiet until the file is actually loaded.
    fn standalone_root(
        parser: &dyn Parser,
        location: &Location,
        file: PathBuf,
    ) -> Result<Root, ConfigError> {
        let bytes = fs::read(&file).map_err(|e| ConfigError::UnreadableRoot {
            path: location.path.clone(),
            reason: e.to_string(),
        })?;
        let package = decode(&bytes).ok().and_then(|source| {
            parser
                .parse(&Location::get(location.path.clone()), &source)
                .ok()
        });
        let package = package.and_then(|element| element.package_name);
        Ok(Root::standalone(&location.path, file, package.as_deref()))
    }

    /// Eagerly load every schema file under the source roots. Repeated calls
    /// return the already-loaded files.
    pub fn load_source_path_files(&mut self) -> Vec<&ProtoFileElement> {
        self.ensure_sources_loaded();
        self.source_files
            .iter()
            .filter_map(|path| self.loaded.get(path).and_then(|slot| slot.as_ref()))
            .collect()
    }

    fn ensure_sources_loaded(&mut self) {
        if self.sources_loaded {
            return;
        }
        self.sources_loaded = true;

        // Enumerate all roots before reading anything so a path two roots
        // both contain can be checked for ambiguity.
        let mut planned: Vec<(usize, Location)> = Vec::new();
        let mut enumerated: IndexSet<String> = IndexSet::new();
        let mut collisions: IndexSet<String> = IndexSet::new();
        for (root_index, root) in self.source_roots.iter().enumerate() {
            let files = match root.schema_files() {
                Ok(files) => files,
                Err(e) => {
                    let location = Location::get(root.base());
                    self.errors
                        .error(format!("unable to read {}: {e}", root.base()), &location);
                    continue;
                }
            };
            for location in files {
                if enumerated.insert(location.path.clone()) {
                    planned.push((root_index, location));
                } else {
                    collisions.insert(location.path.clone());
                }
            }
        }

        // A path enumerated twice is ambiguous only if the copies are
        // physically distinct files.
        for path in &collisions {
            let candidates = resolve_all(&self.source_roots, path);
            if candidates.len() > 1 {
                let location = Location::get(path.clone());
                self.errors.error(ambiguous_message(path, &candidates), &location);
                self.loaded.insert(path.clone(), None);
            }
        }

        if enumerated.is_empty() {
            self.errors.error("no sources", &Location::default());
            return;
        }

        for (root_index, location) in planned {
            let path = location.path.clone();
            self.source_files.insert(path.clone());
            if self.loaded.contains_key(&path) {
                continue;
            }
            let element = read_and_parse(
                self.parser.as_ref(),
                &mut self.errors,
                &self.source_roots[root_index],
                &location,
            );
            self.loaded.insert(path, element);
        }
        debug!(files = self.source_files.len(), "loaded source path files");
    }

    /// Load one import from the proto-path roots, memoized. Returns `None`
    /// when the import is missing, ambiguous, or failed to parse; the
    /// failure is collected for [`report_loading_errors`](Self::report_loading_errors).
    pub fn load(&mut self, import: &str) -> Option<&ProtoFileElement> {
        self.load_import(import, None);
        self.loaded.get(import).and_then(|slot| slot.as_ref())
    }

    fn load_import(&mut self, import: &str, referenced_by: Option<&Location>) {
        if self.loaded.contains_key(import) {
            return;
        }
        trace!(import, "resolving import");
        let candidates = resolve_all(&self.proto_roots, import);
        match candidates.as_slice() {
            [] => {
                let message = self.missing_message(import, referenced_by);
                let location = referenced_by
                    .cloned()
                    .unwrap_or_else(|| Location::get(import));
                self.errors.error(message, &location);
                self.loaded.insert(import.to_string(), None);
            }
            [(root_index, found)] => {
                let location = found.location.clone();
                let element = read_and_parse(
                    self.parser.as_ref(),
                    &mut self.errors,
                    &self.proto_roots[*root_index],
                    &location,
                );
                self.loaded.insert(import.to_string(), element);
            }
            _ => {
                let location = Location::get(import);
                self.errors
                    .error(ambiguous_message(import, &candidates), &location);
                self.loaded.insert(import.to_string(), None);
            }
        }
    }

    fn missing_message(&self, import: &str, referenced_by: Option<&Location>) -> String {
        let mut message = format!("unable to find {import}");
        message.push_str(&format!(
            "\n  searching {} proto paths:",
            self.proto_roots.len()
        ));
        for root in &self.proto_roots {
            message.push_str("\n    ");
            message.push_str(root.base());
        }
        if let Some(location) = referenced_by {
            message.push_str(&format!("\n  for file {}", location.path));
        }
        message
    }

    /// Raise every collected loading failure as one aggregate, or do nothing
    /// if loading was clean.
    pub fn report_loading_errors(&mut self) -> Result<(), SchemaErrors> {
        std::mem::take(&mut self.errors).into_result()
    }

    /// Run the whole pipeline: eagerly load the source files, pull in their
    /// imports transitively, report any loading failures, then link.
    pub fn load_schema(&mut self) -> Result<Schema, Error> {
        self.ensure_sources_loaded();

        let mut queue: VecDeque<(String, Location)> = VecDeque::new();
        for path in &self.source_files {
            if let Some(Some(element)) = self.loaded.get(path) {
                for import in element.imports.iter().chain(&element.public_imports) {
                    queue.push_back((import.clone(), element.location.clone()));
                }
            }
        }
        while let Some((import, referenced_by)) = queue.pop_front() {
            if self.loaded.contains_key(&import) {
                continue;
            }
            self.load_import(&import, Some(&referenced_by));
            if let Some(Some(element)) = self.loaded.get(&import) {
                for next in element.imports.iter().chain(&element.public_imports) {
                    if !self.loaded.contains_key(next) {
                        queue.push_back((next.clone(), element.location.clone()));
                    }
                }
            }
        }
        debug!(files = self.loaded.len(), "loaded all reachable files");
        self.report_loading_errors()?;

        let source_paths = std::mem::take(&mut self.source_files);
        let mut source_files = Vec::new();
        let mut imported_files = Vec::new();
        for (path, slot) in std::mem::take(&mut self.loaded) {
            let Some(element) = slot else { continue };
            if source_paths.contains(&path) {
                source_files.push(element);
            } else {
                imported_files.push(element);
            }
        }
        Ok(Linker::link(source_files, imported_files)?)
    }
}

/// Resolve `import` in every root, deduplicating candidates that are the same
/// physical file. Each candidate keeps the index of the root that produced it.
fn resolve_all(search: &[Root], import: &str) -> Vec<(usize, ResolvedFile)> {
    let mut candidates: Vec<(usize, ResolvedFile)> = Vec::new();
    for (root_index, root) in search.iter().enumerate() {
        if let Some(found) = root.resolve(import)
            && !candidates.iter().any(|(_, c)| c.identity == found.identity)
        {
            candidates.push((root_index, found));
        }
    }
    candidates
}

fn ambiguous_message(import: &str, candidates: &[(usize, ResolvedFile)]) -> String {
    let mut names: Vec<String> = candidates
        .iter()
        .map(|(_, c)| c.location.to_string())
        .collect();
    names.sort();
    let mut message = format!("{import} is ambiguous:");
    for name in &names {
        message.push_str("\n  ");
        message.push_str(name);
    }
    message
}

fn read_and_parse(
    parser: &dyn Parser,
    errors: &mut ErrorCollector,
    root: &Root,
    location: &Location,
) -> Option<ProtoFileElement> {
    let bytes = match root.read(location) {
        Ok(bytes) => bytes,
        Err(e) => {
            errors.error(format!("unable to read {location}: {e}"), location);
            return None;
        }
    };
    let source = match decode(&bytes) {
        Ok(source) => source,
        Err(reason) => {
            errors.error(format!("unable to decode {location}: {reason}"), location);
            return None;
        }
    };
    match parser.parse(location, &source) {
        Ok(element) => Some(element),
        Err(e) => {
            errors.error(e.to_string(), location);
            None
        }
    }
}

/// Decode schema source text, honoring a leading byte-order mark. Without one
/// the bytes are read as UTF-8. The UTF-32 little-endian mark starts with the
/// UTF-16 little-endian mark, so the longer marks are tested first.
fn decode(bytes: &[u8]) -> Result<String, &'static str> {
    if let Some(rest) = strip_bom(bytes, &[0xFF, 0xFE, 0x00, 0x00]) {
        return decode_utf32(rest, u32::from_le_bytes).ok_or("invalid UTF-32LE");
    }
    if let Some(rest) = strip_bom(bytes, &[0x00, 0x00, 0xFE, 0xFF]) {
        return decode_utf32(rest, u32::from_be_bytes).ok_or("invalid UTF-32BE");
    }
    if let Some(rest) = strip_bom(bytes, &[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes).ok_or("invalid UTF-16LE");
    }
    if let Some(rest) = strip_bom(bytes, &[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes).ok_or("invalid UTF-16BE");
    }
    let rest = strip_bom(bytes, &[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    String::from_utf8(rest.to_vec()).map_err(|_| "invalid UTF-8")
}

fn strip_bom<'a>(bytes: &'a [u8], bom: &[u8]) -> Option<&'a [u8]> {
    bytes.strip_prefix(bom)
}

fn decode_utf16(bytes: &[u8], read: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| read([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

fn decode_utf32(bytes: &[u8], read: fn([u8; 4]) -> u32) -> Option<String> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    bytes
        .chunks_exact(4)
        .map(|quad| char::from_u32(read([quad[0], quad[1], quad[2], quad[3]])))
        .collect()
}

/// Candidate locations for a companion file named `name` that could apply to
/// the given schema files: for each file, its own directory and every
/// ancestor directory, per distinct root, closest first.
pub fn locations_to_check(name: &str, locations: &[Location]) -> IndexSet<Location> {
    let mut queue: VecDeque<Location> = locations.iter().cloned().collect();
    let mut result = IndexSet::new();
    while let Some(location) = queue.pop_front() {
        let (parent, last_slash) = match location.path.rfind('/') {
            Some(slash) => (&location.path[..slash + 1], Some(slash)),
            None => ("", None),
        };
        let candidate = location.with_path(format!("{parent}{name}.profile"));
        if !result.insert(candidate) {
            continue;
        }
        if let Some(slash) = last_slash {
            queue.push_back(location.with_path(&location.path[..slash]));
        }
    }
    result
}
