// ==============================================================================
// Shared Test Helpers
// ==============================================================================
//
// A `Parser` implementation plus fixture plumbing for the integration tests.
// The crate leaves text parsing to its callers, so the suite brings its own:
// a small recursive-descent parser covering the protobuf surface these tests
// exercise (packages, imports, options, messages, enums, extensions, and
// services, with both comment forms). Positions are tracked byte by byte so
// tests can assert complete diagnostic output, locations included.
//
// Each test file that imports this module compiles its own copy, so not every
// function is used in every binary. Suppress the resulting dead_code warnings.
#![allow(dead_code)]
// Import this module in each test file with:
//
//     mod common;
//     use common::{link, parse, ProtoParser};

use std::fs;
use std::io::Write;
use std::path::Path;

use protolink::{
    EnumConstantElement, EnumElement, ExtendElement, FieldElement, Label, Linker, Location,
    MessageElement, OptionElement, Parser, ProtoFileElement, RpcElement, Schema, SchemaErrors,
    ServiceElement, Syntax, TypeElement,
};
use serde_json::Value;

/// Parses `.proto` source text into the element tree the loader and linker
/// consume. Strict about the grammar it covers and loud about anything else,
/// which is the right trade for fixtures.
pub struct ProtoParser;

impl Parser for ProtoParser {
    fn parse(&self, location: &Location, source: &str) -> miette::Result<ProtoFileElement> {
        Reader::new(location, source).file()
    }
}

struct Reader<'a> {
    location: &'a Location,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Reader<'a> {
    fn new(location: &'a Location, source: &'a str) -> Reader<'a> {
        Reader {
            location,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    // --------------------------------------------------------------------------
    // Characters and tokens
    // --------------------------------------------------------------------------

    /// The current position as a full location, for element construction and
    /// error reporting.
    fn here(&self) -> Location {
        self.location.at(self.line, self.column)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn try_eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat(&mut self, expected: u8) -> miette::Result<()> {
        if self.try_eat(expected) {
            Ok(())
        } else {
            miette::bail!("expected {:?} at {}", expected as char, self.here())
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    self.bump();
                    self.bump();
                    while let Some(c) = self.bump() {
                        if c == b'*' && self.try_eat(b'/') {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// A name, keyword, or dotted reference: one run of identifier characters
    /// and dots, so `.squareup.Circle` comes back as a single token.
    fn word(&mut self) -> miette::Result<String> {
        let start = self.here();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' {
                self.bump();
                text.push(c as char);
            } else {
                break;
            }
        }
        if text.is_empty() {
            miette::bail!("expected a name at {start}");
        }
        Ok(text)
    }

    fn quoted(&mut self) -> miette::Result<String> {
        self.eat(b'"')?;
        let mut text = String::new();
        loop {
            match self.bump() {
                Some(b'"') => return Ok(text),
                Some(c) => text.push(c as char),
                None => miette::bail!("unterminated string at {}", self.here()),
            }
        }
    }

    fn integer(&mut self) -> miette::Result<i32> {
        let start = self.here();
        let mut text = String::new();
        if self.peek() == Some(b'-') {
            self.bump();
            text.push('-');
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
                text.push(c as char);
            } else {
                break;
            }
        }
        text.parse()
            .map_err(|_| miette::miette!("expected an integer at {start}"))
    }

    /// A type reference: a plain word, or `map<key, value>` rewritten to the
    /// canonical spaced form.
    fn type_reference(&mut self) -> miette::Result<String> {
        let word = self.word()?;
        self.map_arguments(word)
    }

    fn map_arguments(&mut self, word: String) -> miette::Result<String> {
        if word != "map" || self.peek() != Some(b'<') {
            return Ok(word);
        }
        self.eat(b'<')?;
        self.skip_trivia();
        let key = self.type_reference()?;
        self.skip_trivia();
        self.eat(b',')?;
        self.skip_trivia();
        let value = self.type_reference()?;
        self.skip_trivia();
        self.eat(b'>')?;
        Ok(format!("map<{key}, {value}>"))
    }

    /// An option value: a quoted string, an integer, a boolean, or a bare
    /// word (enum constants), as JSON.
    fn value(&mut self) -> miette::Result<Value> {
        match self.peek() {
            Some(b'"') => Ok(Value::String(self.quoted()?)),
            Some(c) if c == b'-' || c.is_ascii_digit() => {
                Ok(Value::Number(self.integer()?.into()))
            }
            _ => {
                let word = self.word()?;
                match word.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Ok(Value::String(word)),
                }
            }
        }
    }

    /// An option name, either plain (`deprecated`) or starting with a
    /// parenthesized extension reference (`(squareup.units).unit`). The
    /// trailing path must sit tight against the closing parenthesis.
    fn option_name(&mut self) -> miette::Result<String> {
        if !self.try_eat(b'(') {
            return self.word();
        }
        let reference = self.word()?;
        self.eat(b')')?;
        let mut name = format!("({reference})");
        if self.peek() == Some(b'.') {
            name.push_str(&self.word()?);
        }
        Ok(name)
    }

    // --------------------------------------------------------------------------
    // Declarations
    // --------------------------------------------------------------------------

    fn file(&mut self) -> miette::Result<ProtoFileElement> {
        let mut file = ProtoFileElement::empty(self.location.clone());
        loop {
            self.skip_trivia();
            if self.at_end() {
                break;
            }
            let here = self.here();
            let keyword = self.word()?;
            match keyword.as_str() {
                "syntax" => {
                    self.skip_trivia();
                    self.eat(b'=')?;
                    self.skip_trivia();
                    let level = self.quoted()?;
                    self.skip_trivia();
                    self.eat(b';')?;
                    file.syntax = Some(match level.as_str() {
                        "proto2" => Syntax::Proto2,
                        "proto3" => Syntax::Proto3,
                        other => miette::bail!("unknown syntax {other:?} at {here}"),
                    });
                }
                "package" => {
                    self.skip_trivia();
                    file.package_name = Some(self.word()?);
                    self.skip_trivia();
                    self.eat(b';')?;
                }
                "import" => {
                    self.skip_trivia();
                    if self.peek() == Some(b'"') {
                        file.imports.push(self.quoted()?);
                    } else {
                        let modifier = self.word()?;
                        if modifier != "public" {
                            miette::bail!("unknown import modifier {modifier:?} at {here}");
                        }
                        self.skip_trivia();
                        file.public_imports.push(self.quoted()?);
                    }
                    self.skip_trivia();
                    self.eat(b';')?;
                }
                "option" => file.options.push(self.option(here)?),
                "message" => file.types.push(TypeElement::Message(self.message(here)?)),
                "enum" => file.types.push(TypeElement::Enum(self.enumeration(here)?)),
                "extend" => file.extends.push(self.extend(here)?),
                "service" => file.services.push(self.service(here)?),
                other => miette::bail!("expected a declaration, found {other:?} at {here}"),
            }
        }
        Ok(file)
    }

    fn option(&mut self, location: Location) -> miette::Result<OptionElement> {
        self.skip_trivia();
        let name = self.option_name()?;
        self.skip_trivia();
        self.eat(b'=')?;
        self.skip_trivia();
        let value = self.value()?;
        self.skip_trivia();
        self.eat(b';')?;
        Ok(OptionElement::new(location, name, value))
    }

    fn message(&mut self, location: Location) -> miette::Result<MessageElement> {
        self.skip_trivia();
        let name = self.word()?;
        self.skip_trivia();
        self.eat(b'{')?;
        let mut message = MessageElement {
            location,
            name,
            ..MessageElement::default()
        };
        loop {
            self.skip_trivia();
            if self.try_eat(b'}') {
                break;
            }
            let here = self.here();
            let word = self.word()?;
            match word.as_str() {
                "option" => message.options.push(self.option(here)?),
                "message" => message
                    .nested_types
                    .push(TypeElement::Message(self.message(here)?)),
                "enum" => message
                    .nested_types
                    .push(TypeElement::Enum(self.enumeration(here)?)),
                _ => message.fields.push(self.field(word, here)?),
            }
        }
        Ok(message)
    }

    /// A field whose first token (the label or the type) is already consumed.
    fn field(&mut self, first: String, location: Location) -> miette::Result<FieldElement> {
        let label = match first.as_str() {
            "required" => Some(Label::Required),
            "optional" => Some(Label::Optional),
            "repeated" => Some(Label::Repeated),
            _ => None,
        };
        let type_name = if label.is_some() {
            self.skip_trivia();
            self.type_reference()?
        } else {
            self.map_arguments(first)?
        };
        self.skip_trivia();
        let name = self.word()?;
        self.skip_trivia();
        self.eat(b'=')?;
        self.skip_trivia();
        let tag = self.integer()?;
        self.skip_trivia();
        let options = if self.peek() == Some(b'[') {
            self.bracket_options()?
        } else {
            Vec::new()
        };
        self.skip_trivia();
        self.eat(b';')?;
        Ok(FieldElement {
            location,
            label,
            type_name,
            name,
            tag,
            options,
            ..FieldElement::default()
        })
    }

    /// `[name = value, name = value]` after a field or constant.
    fn bracket_options(&mut self) -> miette::Result<Vec<OptionElement>> {
        self.eat(b'[')?;
        let mut options = Vec::new();
        loop {
            self.skip_trivia();
            let here = self.here();
            let name = self.option_name()?;
            self.skip_trivia();
            self.eat(b'=')?;
            self.skip_trivia();
            let value = self.value()?;
            options.push(OptionElement::new(here, name, value));
            self.skip_trivia();
            if !self.try_eat(b',') {
                break;
            }
        }
        self.eat(b']')?;
        Ok(options)
    }

    fn enumeration(&mut self, location: Location) -> miette::Result<EnumElement> {
        self.skip_trivia();
        let name = self.word()?;
        self.skip_trivia();
        self.eat(b'{')?;
        let mut enumeration = EnumElement {
            location,
            name,
            ..EnumElement::default()
        };
        loop {
            self.skip_trivia();
            if self.try_eat(b'}') {
                break;
            }
            let here = self.here();
            let word = self.word()?;
            if word == "option" {
                enumeration.options.push(self.option(here)?);
                continue;
            }
            self.skip_trivia();
            self.eat(b'=')?;
            self.skip_trivia();
            let tag = self.integer()?;
            self.skip_trivia();
            let options = if self.peek() == Some(b'[') {
                self.bracket_options()?
            } else {
                Vec::new()
            };
            self.skip_trivia();
            self.eat(b';')?;
            enumeration.constants.push(EnumConstantElement {
                location: here,
                name: word,
                tag,
                options,
                ..EnumConstantElement::default()
            });
        }
        Ok(enumeration)
    }

    fn extend(&mut self, location: Location) -> miette::Result<ExtendElement> {
        self.skip_trivia();
        let name = self.word()?;
        self.skip_trivia();
        self.eat(b'{')?;
        let mut extend = ExtendElement {
            location,
            name,
            ..ExtendElement::default()
        };
        loop {
            self.skip_trivia();
            if self.try_eat(b'}') {
                break;
            }
            let here = self.here();
            let word = self.word()?;
            extend.fields.push(self.field(word, here)?);
        }
        Ok(extend)
    }

    fn service(&mut self, location: Location) -> miette::Result<ServiceElement> {
        self.skip_trivia();
        let name = self.word()?;
        self.skip_trivia();
        self.eat(b'{')?;
        let mut service = ServiceElement {
            location,
            name,
            ..ServiceElement::default()
        };
        loop {
            self.skip_trivia();
            if self.try_eat(b'}') {
                break;
            }
            let here = self.here();
            let word = self.word()?;
            match word.as_str() {
                "option" => service.options.push(self.option(here)?),
                "rpc" => service.rpcs.push(self.rpc(here)?),
                other => miette::bail!("expected an rpc or option, found {other:?} at {here}"),
            }
        }
        Ok(service)
    }

    fn rpc(&mut self, location: Location) -> miette::Result<RpcElement> {
        self.skip_trivia();
        let name = self.word()?;
        self.skip_trivia();
        self.eat(b'(')?;
        self.skip_trivia();
        let request_type = self.type_reference()?;
        self.skip_trivia();
        self.eat(b')')?;
        self.skip_trivia();
        let keyword = self.word()?;
        if keyword != "returns" {
            miette::bail!("expected \"returns\", found {keyword:?} at {location}");
        }
        self.skip_trivia();
        self.eat(b'(')?;
        self.skip_trivia();
        let response_type = self.type_reference()?;
        self.skip_trivia();
        self.eat(b')')?;
        self.skip_trivia();
        let mut rpc = RpcElement {
            location,
            name,
            request_type,
            response_type,
            ..RpcElement::default()
        };
        if self.try_eat(b'{') {
            loop {
                self.skip_trivia();
                if self.try_eat(b'}') {
                    break;
                }
                let here = self.here();
                let keyword = self.word()?;
                if keyword != "option" {
                    miette::bail!("expected an option, found {keyword:?} at {here}");
                }
                rpc.options.push(self.option(here)?);
            }
        } else {
            self.eat(b';')?;
        }
        Ok(rpc)
    }
}

// ==============================================================================
// Fixture plumbing
// ==============================================================================

/// Parse `source` as the file `base/path`, panicking on malformed fixtures.
pub fn parse(base: &str, path: &str, source: &str) -> ProtoFileElement {
    let location = Location::new(base, path);
    ProtoParser
        .parse(&location, source)
        .unwrap_or_else(|e| panic!("failed to parse {path}: {e}"))
}

/// Parse and link `sources` against `imports`, both given as
/// `(path, source text)` pairs. Everything is parsed under the base
/// `source`, so locations in diagnostics come out deterministic.
pub fn link(sources: &[(&str, &str)], imports: &[(&str, &str)]) -> Result<Schema, SchemaErrors> {
    let sources = sources
        .iter()
        .map(|(path, text)| parse("source", path, text))
        .collect();
    let imports = imports
        .iter()
        .map(|(path, text)| parse("source", path, text))
        .collect();
    Linker::link(sources, imports)
}

/// Write `contents` at `relative` below `dir`, creating parent directories
/// as needed.
pub fn write_file(dir: &Path, relative: &str, contents: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .unwrap_or_else(|e| panic!("failed to create {}: {e}", parent.display()));
    }
    fs::write(&path, contents)
        .unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
}

/// Write a zip archive at `path` holding the given `(entry name, contents)`
/// pairs.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = fs::File::create(path)
        .unwrap_or_else(|e| panic!("failed to create {}: {e}", path.display()));
    let mut writer = zip::ZipWriter::new(file);
    for (name, contents) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap_or_else(|e| panic!("failed to start entry {name}: {e}"));
        writer
            .write_all(contents.as_bytes())
            .unwrap_or_else(|e| panic!("failed to write entry {name}: {e}"));
    }
    writer
        .finish()
        .unwrap_or_else(|e| panic!("failed to finish the archive: {e}"));
}
