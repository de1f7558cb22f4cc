//! Content types: data-driven descriptions of the frontmatter fields a
//! section's documents carry. A [`ContentType`] names the sections it serves
//! and lists its fields, each tagged with a [`FieldKind`]. Validation,
//! default values, and the coercion of form or command-line text into typed
//! [`Value`]s all interpret the same field list.

use crate::frontmatter::{Frontmatter, Value};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of field kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Textarea,
    Date,
    Number,
    Checkbox,
    Select,
    Tags,
    List,
    Image,
    Url,
    Rating,
}

impl Default for FieldKind {
    fn default() -> FieldKind {
        FieldKind::Text
    }
}

impl FieldKind {
    /// Converts raw text (as typed into a form or passed on the command line)
    /// into a [`Value`] of the right type. Lists are comma-separated.
    pub fn coerce(self, raw: &str) -> Result<Value, String> {
        let trimmed = raw.trim();
        match self {
            FieldKind::Number | FieldKind::Rating => {
                if trimmed.is_empty() {
                    return Ok(Value::Text(String::new()));
                }
                trimmed
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|_| format!("expected a whole number, found '{}'", raw))
            }
            FieldKind::Checkbox => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "off" | "no" | "" => Ok(Value::Bool(false)),
                _ => Err(format!("expected true or false, found '{}'", raw)),
            },
            FieldKind::Tags | FieldKind::List => Ok(Value::List(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_owned)
                    .collect(),
            )),
            _ => Ok(Value::Text(raw.to_owned())),
        }
    }
}

/// One field of a [`ContentType`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,

    #[serde(default, rename = "type")]
    pub kind: FieldKind,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub default: Option<Value>,

    #[serde(default)]
    pub min_length: Option<usize>,

    #[serde(default)]
    pub max_length: Option<usize>,

    #[serde(default)]
    pub min: Option<i64>,

    #[serde(default)]
    pub max: Option<i64>,

    /// The allowed values of a [`FieldKind::Select`] field.
    #[serde(default)]
    pub options: Vec<String>,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> FieldSpec {
        FieldSpec {
            name: name.to_owned(),
            kind,
            required: false,
            label: None,
            default: None,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            options: Vec::new(),
        }
    }

    fn required(mut self) -> FieldSpec {
        self.required = true;
        self
    }

    fn labelled(mut self, label: &str) -> FieldSpec {
        self.label = Some(label.to_owned());
        self
    }

    /// The label, falling back to the capitalized field name.
    pub fn label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => capitalize(&self.name),
        }
    }

    fn check(&self, value: Option<&Value>, issues: &mut Vec<Issue>) {
        let value = match value {
            Some(value) if !value.is_empty() => value,
            _ => {
                if self.required {
                    issues.push(self.issue("is required".to_owned()));
                }
                return;
            }
        };

        match self.kind {
            FieldKind::Number | FieldKind::Rating => match value.as_i64() {
                Some(n) => {
                    if let Some(min) = self.min {
                        if n < min {
                            issues.push(self.issue(format!("must be at least {}", min)));
                        }
                    }
                    if let Some(max) = self.max {
                        if n > max {
                            issues.push(self.issue(format!("must be at most {}", max)));
                        }
                    }
                }
                None => issues.push(self.issue("must be a whole number".to_owned())),
            },
            FieldKind::Checkbox => {
                if value.as_bool().is_none() {
                    issues.push(self.issue("must be true or false".to_owned()));
                }
            }
            FieldKind::Date => {
                if !is_date(&value.to_display()) {
                    issues.push(self.issue("must be a date (YYYY-MM-DD)".to_owned()));
                }
            }
            FieldKind::Select => {
                let chosen = value.to_display();
                if !self.options.is_empty() && !self.options.contains(&chosen) {
                    issues.push(self.issue(format!(
                        "must be one of: {}",
                        self.options.join(", ")
                    )));
                }
            }
            FieldKind::Tags | FieldKind::List => {
                if value.as_list().is_none() {
                    issues.push(self.issue("must be a list".to_owned()));
                }
            }
            _ => {}
        }

        if let Value::Text(text) = value {
            let length = text.chars().count();
            if let Some(min) = self.min_length {
                if length < min {
                    issues.push(self.issue(format!("must be at least {} characters", min)));
                }
            }
            if let Some(max) = self.max_length {
                if length > max {
                    issues.push(self.issue(format!("must be at most {} characters", max)));
                }
            }
        }
    }

    fn issue(&self, message: String) -> Issue {
        Issue {
            field: self.name.clone(),
            message: format!("{} {}", self.label(), message),
        }
    }
}

/// A named set of fields used by one or more sections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentType {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// The sections served by this type. Empty, or containing `*`, marks the
    /// default type.
    #[serde(default)]
    pub sections: Vec<String>,

    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl ContentType {
    /// The built-in type used when no types are configured: a standard
    /// article with title, description, and body.
    pub fn article() -> ContentType {
        let mut description = FieldSpec::new("description", FieldKind::Textarea)
            .required()
            .labelled("Description");
        description.max_length = Some(160);

        ContentType {
            name: "article".to_owned(),
            description: "Standard article with title, description, and content"
                .to_owned(),
            sections: Vec::new(),
            fields: vec![
                FieldSpec::new("title", FieldKind::Text)
                    .required()
                    .labelled("Title"),
                description,
                FieldSpec::new("date", FieldKind::Date)
                    .required()
                    .labelled("Publish Date"),
                FieldSpec::new("author", FieldKind::Text).labelled("Author"),
                FieldSpec::new("image", FieldKind::Image).labelled("Featured Image"),
                FieldSpec::new("tags", FieldKind::Tags).labelled("Tags"),
                FieldSpec::new("draft", FieldKind::Checkbox).labelled("Draft"),
                FieldSpec::new("weight", FieldKind::Number).labelled("Weight"),
            ],
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_default(&self) -> bool {
        self.sections.is_empty() || self.sections.iter().any(|s| s == "*")
    }

    /// The declared default values, plus `date` set to `today` unless a
    /// default for it is declared.
    pub fn defaults(&self, today: &str) -> Frontmatter {
        let mut defaults: Frontmatter = self
            .fields
            .iter()
            .filter_map(|f| f.default.clone().map(|v| (f.name.clone(), v)))
            .collect();
        if !defaults.contains_key("date") {
            defaults.insert("date", today);
        }
        defaults
    }

    /// Checks `frontmatter` against the declared fields. Undeclared fields
    /// are not checked.
    pub fn validate(&self, frontmatter: &Frontmatter) -> Vec<Issue> {
        let mut issues = Vec::new();
        for field in &self.fields {
            field.check(frontmatter.get(&field.name), &mut issues);
        }
        issues
    }

    /// Coerces raw text for `field` using its declared kind. Undeclared
    /// fields are coerced by [`infer_kind`].
    pub fn coerce(&self, field: &str, raw: &str) -> Result<Value, String> {
        let kind = match self.field(field) {
            Some(declared) => declared.kind,
            None => infer_kind(field),
        };
        kind.coerce(raw)
    }
}

/// The kind of a well-known field that a content type doesn't declare.
pub fn infer_kind(field: &str) -> FieldKind {
    match field {
        "tags" => FieldKind::Tags,
        "keywords" | "related" | "aliases" => FieldKind::List,
        "draft" => FieldKind::Checkbox,
        "weight" => FieldKind::Number,
        "date" | "lastmod" | "publishDate" | "expiryDate" => FieldKind::Date,
        _ => FieldKind::Text,
    }
}

/// The registry of configured content types.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentTypes {
    types: Vec<ContentType>,
}

impl Default for ContentTypes {
    fn default() -> ContentTypes {
        ContentTypes::new(Vec::new())
    }
}

impl ContentTypes {
    /// Builds a registry. With no types configured, the built-in
    /// [`ContentType::article`] is used.
    pub fn new(types: Vec<ContentType>) -> ContentTypes {
        if types.is_empty() {
            ContentTypes {
                types: vec![ContentType::article()],
            }
        } else {
            ContentTypes { types }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ContentType> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentType> {
        self.types.iter()
    }

    /// The type serving `section`: the type listing it explicitly, else the
    /// default type, else the first type.
    pub fn for_section(&self, section: &str) -> &ContentType {
        self.types
            .iter()
            .find(|t| t.sections.iter().any(|s| s == section))
            .or_else(|| self.types.iter().find(|t| t.is_default()))
            .unwrap_or(&self.types[0])
    }
}

/// A validation finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub field: String,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(s).is_ok()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
