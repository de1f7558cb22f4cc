//! Defines the [`Frontmatter`] and [`Value`] types and the codec that
//! converts between on-disk documents and `(Frontmatter, body)` pairs. A
//! document looks like this:
//!
//! ```md
//! ---
//! title: "Hello, world!"
//! date: "2021-04-16"
//! draft: false
//! tags:
//!   - "greet"
//! weight: 0
//! ---
//! # Hello
//!
//! World
//! ```
//!
//! Only a small subset of YAML is understood: quoted and bare scalars,
//! booleans, whole numbers, block lists of strings, and inline lists of
//! strings (which are always written back as block lists). Parsing never
//! fails; input without the fence structure comes back as
//! [`Parsed::NoFrontmatter`] with the whole input as the body.

use serde::{Deserialize, Serialize};
use std::iter::FromIterator;

/// The delimiter line which opens and closes the frontmatter block.
pub const FENCE: &str = "---";

/// Fields which are written first, in this order. Any other fields follow in
/// their mapping order.
pub const PREFERRED_ORDER: &[&str] = &[
    "title",
    "description",
    "author",
    "date",
    "lastmod",
    "draft",
    "image",
    "keywords",
    "tags",
    "related",
    "translationKey",
    "weight",
];

/// A frontmatter field value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Written as an unquoted `true` or `false`.
    Bool(bool),

    /// Written unquoted. Only bare whole numbers are read back as integers.
    Integer(i64),

    /// Written double-quoted with escapes.
    Text(String),

    /// Written as a block list of double-quoted items.
    List(Vec<String>),
}

impl Value {
    /// Returns `true` for the values which an update treats as "unset": the
    /// empty string and the empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Text(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Bool(_) | Value::Integer(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Reads a boolean, accepting the text forms `"true"` and `"false"` as
    /// well since hand-edited files quote them from time to time.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Text(s) if s == "true" => Some(true),
            Value::Text(s) if s == "false" => Some(false),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Renders the value the way a person would type it into a form field.
    /// Lists are comma-joined.
    pub fn to_display(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Text(s) => s.clone(),
            Value::List(items) => items.join(", "),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Integer(i)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Value {
        Value::List(items)
    }
}

impl From<Vec<&str>> for Value {
    fn from(items: Vec<&str>) -> Value {
        Value::List(items.into_iter().map(str::to_owned).collect())
    }
}

/// An ordered mapping from field names to [`Value`]s. A key appears at most
/// once; inserting an existing key replaces its value in place. Equality
/// ignores key order.
#[derive(Clone, Debug, Default)]
pub struct Frontmatter {
    entries: Vec<(String, Value)>,
}

impl Frontmatter {
    pub fn new() -> Frontmatter {
        Frontmatter::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets `key` to `value`, returning the previous value. A new key is
    /// appended; an existing key keeps its position.
    pub fn insert<K: Into<String>, V: Into<Value>>(
        &mut self,
        key: K,
        value: V,
    ) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let i = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(i).1)
    }

    pub fn retain<F: FnMut(&str, &Value) -> bool>(&mut self, mut f: F) {
        self.entries.retain(|(k, v)| f(k, v));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Returns the text of a [`Value::Text`] field.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns the items of a [`Value::List`] field.
    pub fn list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(Value::as_list)
    }

    pub fn list_mut(&mut self, key: &str) -> Option<&mut Vec<String>> {
        match self.get_mut(key) {
            Some(Value::List(items)) => Some(items),
            _ => None,
        }
    }

    /// A document is a draft when `draft` is `true` (bare or quoted).
    pub fn is_draft(&self) -> bool {
        self.get("draft").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Overwrites fields with those of `patch`. Keys absent from `patch` are
    /// left alone.
    pub fn merge(&mut self, patch: Frontmatter) {
        for (key, value) in patch.entries {
            self.insert(key, value);
        }
    }
}

impl PartialEq for Frontmatter {
    fn eq(&self, other: &Frontmatter) -> bool {
        self.len() == other.len()
            && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for Frontmatter {}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Frontmatter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Frontmatter {
        let mut frontmatter = Frontmatter::new();
        for (k, v) in iter {
            frontmatter.insert(k, v);
        }
        frontmatter
    }
}

impl Serialize for Frontmatter {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Returns whether `key` can be written as a frontmatter field name and read
/// back again: an ASCII letter or underscore followed by ASCII letters,
/// digits, underscores, or hyphens.
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// The result of parsing a document.
#[derive(Clone, Debug, PartialEq)]
pub enum Parsed {
    /// The document had a fenced frontmatter block.
    Document { frontmatter: Frontmatter, body: String },

    /// The fence structure was absent; the whole input is the body.
    NoFrontmatter { body: String },
}

impl Parsed {
    pub fn has_frontmatter(&self) -> bool {
        matches!(self, Parsed::Document { .. })
    }

    pub fn body(&self) -> &str {
        match self {
            Parsed::Document { body, .. } => body,
            Parsed::NoFrontmatter { body } => body,
        }
    }

    /// Collapses the variants into a pair, using an empty [`Frontmatter`] for
    /// [`Parsed::NoFrontmatter`].
    pub fn into_parts(self) -> (Frontmatter, String) {
        match self {
            Parsed::Document { frontmatter, body } => (frontmatter, body),
            Parsed::NoFrontmatter { body } => (Frontmatter::new(), body),
        }
    }
}

/// Parses a document. See the module documentation for the format.
pub fn parse(input: &str) -> Parsed {
    match frontmatter_indices(input) {
        Some((header_start, header_stop, body_start)) => Parsed::Document {
            frontmatter: parse_header(&input[header_start..header_stop]),
            body: input[body_start..].to_owned(),
        },
        None => Parsed::NoFrontmatter {
            body: input.to_owned(),
        },
    }
}

/// Writes `frontmatter` and `body` as a document. Fields in
/// [`PREFERRED_ORDER`] come first; the body is written verbatim.
pub fn serialize(frontmatter: &Frontmatter, body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 64 * frontmatter.len());
    out.push_str(FENCE);
    out.push('\n');
    for key in PREFERRED_ORDER {
        if let Some(value) = frontmatter.get(key) {
            write_field(&mut out, key, value);
        }
    }
    for (key, value) in frontmatter.iter() {
        if !PREFERRED_ORDER.contains(&key) {
            write_field(&mut out, key, value);
        }
    }
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(body);
    out
}

fn write_field(out: &mut String, key: &str, value: &Value) {
    out.push_str(key);
    match value {
        Value::List(items) => {
            out.push_str(":\n");
            for item in items {
                out.push_str("  - ");
                push_quoted(out, item);
                out.push('\n');
            }
        }
        Value::Bool(b) => {
            out.push_str(": ");
            out.push_str(if *b { "true" } else { "false" });
            out.push('\n');
        }
        Value::Integer(i) => {
            out.push_str(": ");
            out.push_str(&i.to_string());
            out.push('\n');
        }
        Value::Text(s) => {
            out.push_str(": ");
            push_quoted(out, s);
            out.push('\n');
        }
    }
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

// Returns `(header_start, header_stop, body_start)` when `input` opens with a
// fence line and a closing fence line follows.
fn frontmatter_indices(input: &str) -> Option<(usize, usize, usize)> {
    fn is_fence(line: &str) -> bool {
        line.trim_end() == FENCE
    }

    let first_end = input.find('\n')?;
    if !is_fence(&input[..first_end]) {
        return None;
    }

    let header_start = first_end + 1;
    let mut line_start = header_start;
    loop {
        let line_end = input[line_start..].find('\n').map(|i| line_start + i);
        let line = &input[line_start..line_end.unwrap_or_else(|| input.len())];
        if is_fence(line) {
            let body_start = match line_end {
                Some(end) => end + 1,
                None => input.len(),
            };
            return Some((header_start, line_start, body_start));
        }
        line_start = line_end? + 1;
    }
}

fn parse_header(header: &str) -> Frontmatter {
    let mut frontmatter = Frontmatter::new();
    let mut list_key: Option<String> = None;

    for line in header.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some((key, raw)) = split_key(line) {
            let raw = raw.trim();
            if raw.is_empty() {
                frontmatter.insert(key, Value::List(Vec::new()));
                list_key = Some(key.to_owned());
            } else {
                frontmatter.insert(key, parse_scalar(raw));
                list_key = None;
            }
            continue;
        }

        if let Some(item) = list_item(line) {
            if let (Some(key), false) = (&list_key, item.is_empty()) {
                if let Some(items) = frontmatter.list_mut(key) {
                    items.push(unquote(item).unwrap_or_else(|| item.to_owned()));
                }
            }
        }

        // Anything else (comments, nested mappings, stray text) is skipped.
    }

    frontmatter
}

fn split_key(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let key = &line[..colon];
    if is_valid_key(key) {
        Some((key, &line[colon + 1..]))
    } else {
        None
    }
}

// `- value` or a lone `-`; `-value` isn't an item.
fn list_item(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix('-')?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn parse_scalar(raw: &str) -> Value {
    if let Some(text) = unquote(raw) {
        return Value::Text(text);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ if is_integer(raw) => match raw.parse() {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Text(raw.to_owned()),
        },
        _ if raw.len() >= 2 && raw.starts_with('[') && raw.ends_with(']') => {
            Value::List(parse_flow_list(&raw[1..raw.len() - 1]))
        }
        _ => Value::Text(raw.to_owned()),
    }
}

// Whole numbers without leading zeros, so values like `007` or zip codes stay
// text and keep their spelling.
fn is_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && ((digits == "0" && digits.len() == raw.len())
            || !digits.starts_with('0'))
}

fn parse_flow_list(inner: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in inner.chars() {
        current.push(c);
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == ',' => {
                current.pop();
                push_flow_item(&mut items, &current);
                current.clear();
            }
            None => {}
        }
    }
    push_flow_item(&mut items, &current);
    items
}

fn push_flow_item(items: &mut Vec<String>, raw: &str) {
    let raw = raw.trim();
    if !raw.is_empty() {
        items.push(unquote(raw).unwrap_or_else(|| raw.to_owned()));
    }
}

// Returns the unescaped contents of a single- or double-quoted value, or
// `None` when `raw` isn't quoted.
fn unquote(raw: &str) -> Option<String> {
    if raw.len() < 2 {
        return None;
    }
    if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(unescape_double(inner))
    } else if let Some(inner) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        Some(inner.replace("''", "'"))
    } else {
        None
    }
}

fn unescape_double(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
