//! Structured-format parsers.
//!
//! Every supported document format is parsed into the generic [`Value`]
//! tree.  JSON, YAML and TOML go through their serde crates, CSV through
//! `csv` and XML through `quick-xml`; INI and ENV are small line-oriented
//! readers.
//!
//! | Format | Names            | Extensions      | Result                       |
//! |--------|------------------|-----------------|------------------------------|
//! | JSON   | `json`           | `.json`         | any                          |
//! | YAML   | `yaml`, `yml`    | `.yaml`, `.yml` | any                          |
//! | TOML   | `toml`           | `.toml`         | map                          |
//! | INI    | `ini`, `cfg`     | `.ini`, `.cfg`  | map of sections              |
//! | ENV    | `env`            | `.env`          | flat map of strings          |
//! | CSV    | `csv`            | `.csv`          | array of row maps            |
//! | XML    | `xml`            | `.xml`          | root element's map           |

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::{Error, Result};
use crate::script::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    Json,
    #[default]
    Yaml,
    Toml,
    Ini,
    Env,
    Csv,
    Xml,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Toml => "toml",
            Format::Ini => "ini",
            Format::Env => "env",
            Format::Csv => "csv",
            Format::Xml => "xml",
        })
    }
}

impl Format {
    /// Look a format up by name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name.trim().to_ascii_lowercase().as_str() {
            "json" => Format::Json,
            "yaml" | "yml" => Format::Yaml,
            "toml" => Format::Toml,
            "ini" | "cfg" => Format::Ini,
            "env" => Format::Env,
            "csv" => Format::Csv,
            "xml" => Format::Xml,
            _ => return Err(Error::UnsupportedFormat(name.to_owned())),
        })
    }

    /// Pick a format from a file's extension.  `.env` files are commonly
    /// named just `.env`, which has no extension in [`Path`] terms.
    pub fn from_path(path: &Path) -> Result<Self> {
        if path.file_name().is_some_and(|n| n == ".env") {
            return Ok(Format::Env);
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
        Self::from_name(ext)
    }

    pub fn parse_str(self, text: &str) -> Result<Value> {
        match self {
            Format::Json => {
                let v: serde_json::Value = serde_json::from_str(text)
                    .map_err(|e| Error::Parse { format: "json", message: e.to_string() })?;
                Ok(from_json(v))
            }
            Format::Yaml => {
                // An empty YAML document is a null, not an error.
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                let v: serde_yaml::Value = serde_yaml::from_str(text)
                    .map_err(|e| Error::Parse { format: "yaml", message: e.to_string() })?;
                from_yaml(v)
            }
            Format::Toml => {
                let table: toml::Table = text
                    .parse()
                    .map_err(|e: toml::de::Error| Error::Parse { format: "toml", message: e.to_string() })?;
                Ok(from_toml(toml::Value::Table(table)))
            }
            Format::Ini => Ok(parse_ini(text)),
            Format::Env => parse_env(text),
            Format::Csv => parse_csv(text),
            Format::Xml => parse_xml(text),
        }
    }
}

/// Read `path` and parse it in the format its extension names.
pub fn parse_file(path: &Path) -> Result<Value> {
    let format = Format::from_path(path)?;
    debug!(path = %path.display(), %format, "parsing structured file");
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    format.parse_str(&text)
}

// ── serde conversions ─────────────────────────────────────────────────────────

fn from_json(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Str(s),
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            Value::Map(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

fn from_yaml(v: serde_yaml::Value) -> Result<Value> {
    Ok(match v {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_yaml::Value::String(s) => Value::Str(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(from_yaml).collect::<Result<_>>()?)
        }
        serde_yaml::Value::Mapping(map) => {
            let mut out = BTreeMap::new();
            for (k, v) in map {
                let key = match from_yaml(k)? {
                    key if key.is_scalar() => key.to_string(),
                    other => {
                        return Err(Error::Parse {
                            format: "yaml",
                            message: format!("map keys must be scalars, found {}", other.type_name()),
                        })
                    }
                };
                out.insert(key, from_yaml(v)?);
            }
            Value::Map(out)
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value)?,
    })
}

fn from_toml(v: toml::Value) -> Value {
    match v {
        toml::Value::String(s) => Value::Str(s),
        toml::Value::Integer(i) => Value::Int(i),
        toml::Value::Float(x) => Value::Float(x),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::Str(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(from_toml).collect()),
        toml::Value::Table(t) => Value::Map(t.into_iter().map(|(k, v)| (k, from_toml(v))).collect()),
    }
}

// ── Line-oriented formats ─────────────────────────────────────────────────────

fn parse_ini(text: &str) -> Value {
    let mut root = BTreeMap::new();
    let mut section: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_owned();
            root.insert(name.clone(), Value::Map(BTreeMap::new()));
            section = Some(name);
            continue;
        }
        // Lines without '=' carry nothing.
        let Some((key, value)) = line.split_once('=') else { continue };
        let (key, value) = (key.trim().to_owned(), Value::Str(value.trim().to_owned()));
        match &section {
            Some(name) => {
                if let Some(Value::Map(m)) = root.get_mut(name) {
                    m.insert(key, value);
                }
            }
            None => {
                root.insert(key, value);
            }
        }
    }
    Value::Map(root)
}

fn parse_env(text: &str) -> Result<Value> {
    let mut map = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| Error::Parse {
            format: "env",
            message: format!("invalid line (no '='): {line}"),
        })?;
        map.insert(key.trim().to_owned(), Value::Str(value.trim().to_owned()));
    }
    Ok(Value::Map(map))
}

fn parse_csv(text: &str) -> Result<Value> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = reader.headers().map_err(csv_error)?.clone();
    if headers.iter().all(str::is_empty) {
        return Err(Error::Parse { format: "csv", message: "no header line".into() });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let row: BTreeMap<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, cell)| (h.to_owned(), csv_cell(cell)))
            .collect();
        rows.push(Value::Map(row));
    }
    Ok(Value::Array(rows))
}

fn csv_error(e: csv::Error) -> Error {
    Error::Parse { format: "csv", message: e.to_string() }
}

fn csv_cell(cell: &str) -> Value {
    match cell {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if cell.contains('.') {
        if let Ok(x) = cell.parse::<f64>() {
            return Value::Float(x);
        }
    } else if let Ok(n) = cell.parse::<i64>() {
        return Value::Int(n);
    }
    Value::Str(cell.to_owned())
}

// ── XML ───────────────────────────────────────────────────────────────────────

/// An element being built while its children are read.
struct XmlNode {
    name: String,
    map: BTreeMap<String, Value>,
    text: String,
}

impl XmlNode {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut map = BTreeMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(xml_error)?.into_owned();
            map.insert(format!("@{key}"), Value::Str(value));
        }
        Ok(XmlNode { name, map, text: String::new() })
    }

    /// A bare text element collapses to its text; anything else is a map
    /// with the text under `_text`.
    fn close(self) -> (String, Value) {
        let XmlNode { name, mut map, text } = self;
        if map.is_empty() {
            return (name, Value::Str(text));
        }
        if !text.is_empty() {
            map.insert("_text".into(), Value::Str(text));
        }
        (name, Value::Map(map))
    }

    /// Repeated child names become arrays.
    fn attach(&mut self, name: String, value: Value) {
        match self.map.remove(&name) {
            None => {
                self.map.insert(name, value);
            }
            Some(Value::Array(mut items)) => {
                items.push(value);
                self.map.insert(name, Value::Array(items));
            }
            Some(existing) => {
                self.map.insert(name, Value::Array(vec![existing, value]));
            }
        }
    }
}

/// The document element's contents: attributes as `@name`, child elements
/// by name, text as `_text`.
fn parse_xml(text: &str) -> Result<Value> {
    let mut reader = quick_xml::Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => stack.push(XmlNode::open(&start)?),
            Event::Empty(start) => {
                let (name, value) = XmlNode::open(&start)?.close();
                match stack.last_mut() {
                    Some(parent) => parent.attach(name, value),
                    None => root = Some(value),
                }
            }
            Event::End(_) => {
                let Some(node) = stack.pop() else {
                    return Err(xml_error("unexpected closing tag"));
                };
                let (name, value) = node.close();
                match stack.last_mut() {
                    Some(parent) => parent.attach(name, value),
                    None => root = Some(value),
                }
            }
            Event::Text(t) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&t.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(c) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(xml_error("unexpected end of document"));
    }
    root.ok_or_else(|| xml_error("no root element"))
}

fn xml_error(e: impl fmt::Display) -> Error {
    Error::Parse { format: "xml", message: e.to_string() }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
