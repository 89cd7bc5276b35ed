//! Schema contracts: structural types with field-level bounds.
//!
//! Each domain pipeline declares its output contract with the builder API
//! below. The Coercion Engine consumes the contract read-only: validation
//! produces typed [`ValidationIssue`]s and repair dispatches on
//! [`IssueCode`], never on message text.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Markers that LLMs append after the real content of a string field
/// (sign-offs, word counts, self-references). Everything from the first
/// marker to the end of the string is boilerplate.
pub const BOILERPLATE_MARKERS: &[&str] = &[
    "\n\n---",
    "\n\nNote:",
    "\n\nWord count:",
    "[Generated by",
    "(Generated by",
    "Prompt version:",
    "As an AI language model",
];

/// One step of a traversal path into a JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

// Paths are rendered as string segments on the wire, indices included.
impl Serialize for PathSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => ValueKind::String,
            Value::Number(_) => ValueKind::Number,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::Null => ValueKind::Null,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
            ValueKind::Null => "null",
        };
        f.write_str(name)
    }
}

/// Typed validation failure. `origin` says what the bound applies to:
/// string length, array length or numeric value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum IssueCode {
    TooBig { origin: ValueKind, maximum: f64 },
    TooSmall { origin: ValueKind, minimum: f64 },
    InvalidType { expected: ValueKind, received: ValueKind },
    InvalidEnumValue { options: Vec<String> },
    Required,
    Boilerplate { marker: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub message: String,
    pub path: Vec<PathSegment>,
    #[serde(flatten)]
    pub code: IssueCode,
}

impl ValidationIssue {
    /// The numeric bound violated, for `too_big` / `too_small` issues.
    pub fn bound(&self) -> Option<f64> {
        match self.code {
            IssueCode::TooBig { maximum, .. } => Some(maximum),
            IssueCode::TooSmall { minimum, .. } => Some(minimum),
            _ => None,
        }
    }

    pub fn path_strings(&self) -> Vec<String> {
        self.path.iter().map(ToString::to_string).collect()
    }

    pub fn path_display(&self) -> String {
        if self.path.is_empty() {
            "<root>".to_string()
        } else {
            self.path_strings().join(".")
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path_display(), self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
}

/// A structural contract with bounds.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    String {
        min_len: Option<usize>,
        max_len: Option<usize>,
        /// Repair policy: trailing boilerplate may be cut off this field.
        strip_boilerplate: bool,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    Boolean,
    Enum {
        values: Vec<String>,
    },
    Array {
        items: Box<Schema>,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },
    Object {
        fields: Vec<Field>,
    },
}

impl Schema {
    pub fn string() -> Self {
        Schema::String {
            min_len: None,
            max_len: None,
            strip_boilerplate: false,
        }
    }

    pub fn number() -> Self {
        Schema::Number {
            min: None,
            max: None,
        }
    }

    pub fn boolean() -> Self {
        Schema::Boolean
    }

    pub fn enumeration(values: &[&str]) -> Self {
        Schema::Enum {
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    pub fn object() -> Self {
        Schema::Object { fields: Vec::new() }
    }

    /// Minimum length: characters for strings, elements for arrays.
    pub fn min_len(mut self, n: usize) -> Self {
        match &mut self {
            Schema::String { min_len, .. } => *min_len = Some(n),
            Schema::Array { min_items, .. } => *min_items = Some(n),
            other => debug_assert!(false, "min_len on {other:?}"),
        }
        self
    }

    /// Maximum length: characters for strings, elements for arrays.
    pub fn max_len(mut self, n: usize) -> Self {
        match &mut self {
            Schema::String { max_len, .. } => *max_len = Some(n),
            Schema::Array { max_items, .. } => *max_items = Some(n),
            other => debug_assert!(false, "max_len on {other:?}"),
        }
        self
    }

    pub fn min(mut self, n: f64) -> Self {
        match &mut self {
            Schema::Number { min, .. } => *min = Some(n),
            other => debug_assert!(false, "min on {other:?}"),
        }
        self
    }

    pub fn max(mut self, n: f64) -> Self {
        match &mut self {
            Schema::Number { max, .. } => *max = Some(n),
            other => debug_assert!(false, "max on {other:?}"),
        }
        self
    }

    pub fn range(self, min: f64, max: f64) -> Self {
        self.min(min).max(max)
    }

    pub fn strip_boilerplate(mut self) -> Self {
        match &mut self {
            Schema::String {
                strip_boilerplate, ..
            } => *strip_boilerplate = true,
            other => debug_assert!(false, "strip_boilerplate on {other:?}"),
        }
        self
    }

    /// Adds a required field to an object schema.
    pub fn field(self, name: &str, schema: Schema) -> Self {
        self.push_field(name, schema, true)
    }

    /// Adds a field that may be absent or null.
    pub fn optional(self, name: &str, schema: Schema) -> Self {
        self.push_field(name, schema, false)
    }

    fn push_field(mut self, name: &str, schema: Schema, required: bool) -> Self {
        match &mut self {
            Schema::Object { fields } => fields.push(Field {
                name: name.to_string(),
                schema,
                required,
            }),
            other => debug_assert!(false, "field on {other:?}"),
        }
        self
    }

    /// The JSON kind a value must have to satisfy this schema.
    pub fn kind(&self) -> ValueKind {
        match self {
            Schema::String { .. } | Schema::Enum { .. } => ValueKind::String,
            Schema::Number { .. } => ValueKind::Number,
            Schema::Boolean => ValueKind::Boolean,
            Schema::Array { .. } => ValueKind::Array,
            Schema::Object { .. } => ValueKind::Object,
        }
    }

    /// Validates `value`, returning every issue found (empty when valid).
    pub fn validate(&self, value: &Value) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut path = Vec::new();
        self.validate_at(value, &mut path, &mut issues);
        issues
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.validate(value).is_empty()
    }

    fn validate_at(
        &self,
        value: &Value,
        path: &mut Vec<PathSegment>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let mut report = |message: String, code: IssueCode| {
            issues.push(ValidationIssue {
                message,
                path: path.clone(),
                code,
            })
        };

        if ValueKind::of(value) != self.kind() {
            let received = ValueKind::of(value);
            report(
                format!("Expected {}, received {received}", self.kind()),
                IssueCode::InvalidType {
                    expected: self.kind(),
                    received,
                },
            );
            return;
        }

        match (self, value) {
            (
                Schema::String {
                    min_len,
                    max_len,
                    strip_boilerplate,
                },
                Value::String(text),
            ) => {
                let len = text.chars().count();
                if let Some(min) = *min_len {
                    if len < min {
                        report(
                            format!("String must contain at least {min} character(s)"),
                            IssueCode::TooSmall {
                                origin: ValueKind::String,
                                minimum: min as f64,
                            },
                        );
                    }
                }
                if let Some(max) = *max_len {
                    if len > max {
                        report(
                            format!("String must contain at most {max} character(s)"),
                            IssueCode::TooBig {
                                origin: ValueKind::String,
                                maximum: max as f64,
                            },
                        );
                    }
                }
                if *strip_boilerplate {
                    if let Some((_, marker)) = find_boilerplate(text) {
                        report(
                            format!("String contains boilerplate marker {marker:?}"),
                            IssueCode::Boilerplate {
                                marker: marker.to_string(),
                            },
                        );
                    }
                }
            }
            (Schema::Number { min, max }, Value::Number(number)) => {
                let n = number.as_f64().unwrap_or(f64::NAN);
                if let Some(min) = *min {
                    if n < min {
                        report(
                            format!("Number must be greater than or equal to {min}"),
                            IssueCode::TooSmall {
                                origin: ValueKind::Number,
                                minimum: min,
                            },
                        );
                    }
                }
                if let Some(max) = *max {
                    if n > max {
                        report(
                            format!("Number must be less than or equal to {max}"),
                            IssueCode::TooBig {
                                origin: ValueKind::Number,
                                maximum: max,
                            },
                        );
                    }
                }
            }
            (Schema::Enum { values }, Value::String(text)) => {
                if !values.iter().any(|v| v == text) {
                    report(
                        format!("Invalid enum value {text:?}, expected one of {values:?}"),
                        IssueCode::InvalidEnumValue {
                            options: values.clone(),
                        },
                    );
                }
            }
            (
                Schema::Array {
                    items,
                    min_items,
                    max_items,
                },
                Value::Array(elements),
            ) => {
                if let Some(min) = *min_items {
                    if elements.len() < min {
                        report(
                            format!("Array must contain at least {min} element(s)"),
                            IssueCode::TooSmall {
                                origin: ValueKind::Array,
                                minimum: min as f64,
                            },
                        );
                    }
                }
                if let Some(max) = *max_items {
                    if elements.len() > max {
                        report(
                            format!("Array must contain at most {max} element(s)"),
                            IssueCode::TooBig {
                                origin: ValueKind::Array,
                                maximum: max as f64,
                            },
                        );
                    }
                }
                for (index, element) in elements.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    items.validate_at(element, path, issues);
                    path.pop();
                }
            }
            (Schema::Object { fields }, Value::Object(map)) => {
                for field in fields {
                    path.push(PathSegment::Key(field.name.clone()));
                    match map.get(&field.name) {
                        None if field.required => issues.push(ValidationIssue {
                            message: "Required".to_string(),
                            path: path.clone(),
                            code: IssueCode::Required,
                        }),
                        None | Some(Value::Null) if !field.required => {}
                        Some(child) => field.schema.validate_at(child, path, issues),
                        None => {}
                    }
                    path.pop();
                }
            }
            _ => {}
        }
    }

    /// Renders the contract as JSON Schema for inclusion in prompts.
    pub fn to_json_schema(&self) -> Value {
        match self {
            Schema::String {
                min_len, max_len, ..
            } => {
                let mut out = json!({ "type": "string" });
                if let Some(n) = min_len {
                    out["minLength"] = json!(n);
                }
                if let Some(n) = max_len {
                    out["maxLength"] = json!(n);
                }
                out
            }
            Schema::Number { min, max } => {
                let mut out = json!({ "type": "number" });
                if let Some(n) = min {
                    out["minimum"] = json!(n);
                }
                if let Some(n) = max {
                    out["maximum"] = json!(n);
                }
                out
            }
            Schema::Boolean => json!({ "type": "boolean" }),
            Schema::Enum { values } => json!({ "type": "string", "enum": values }),
            Schema::Array {
                items,
                min_items,
                max_items,
            } => {
                let mut out = json!({ "type": "array", "items": items.to_json_schema() });
                if let Some(n) = min_items {
                    out["minItems"] = json!(n);
                }
                if let Some(n) = max_items {
                    out["maxItems"] = json!(n);
                }
                out
            }
            Schema::Object { fields } => {
                let mut properties = Map::new();
                let mut required = Vec::new();
                for field in fields {
                    properties.insert(field.name.clone(), field.schema.to_json_schema());
                    if field.required {
                        required.push(json!(field.name));
                    }
                }
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                })
            }
        }
    }
}

/// Earliest boilerplate marker in `text`, with its byte offset.
pub fn find_boilerplate(text: &str) -> Option<(usize, &'static str)> {
    BOILERPLATE_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker).map(|idx| (idx, *marker)))
        .min_by_key(|(idx, _)| *idx)
}
