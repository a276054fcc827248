//! `uses:` scalar shorthand codec
//!
//! A step's `uses:` value packs up to three logical sub-values into one
//! scalar: `name@ref # annotation`. The split point is the *last* `@` so
//! that container references (`docker://host@sha`) and paths containing `@`
//! resolve correctly. The annotation is the trailing line comment, which the
//! YAML layer discards; document-level parse/encode recover it with a
//! best-effort line scan over the raw text.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_yaml::Value;

use crate::error::{node_kind, GhaError};

/// A step `uses:` value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uses {
    /// Name of the Action that is used. Typically `<owner>/<repository>`, a
    /// local path starting with `.`, or a `docker://` URI.
    pub name: String,

    /// Git reference used for the Action. Typically a tag ref, branch ref,
    /// or commit SHA. Empty for unpinned local and container references.
    pub r#ref: String,

    /// Comment after the `uses:` value, if any. Carried as metadata, never
    /// executed.
    pub annotation: String,
}

impl Uses {
    /// Split a `uses:` scalar at its last `@`.
    ///
    /// An `@` at the first or last position (empty name or empty ref) is an
    /// error; a value with no `@` at all is a valid unpinned reference.
    pub fn parse(value: &str) -> Result<Self, GhaError> {
        if value.is_empty() {
            return Ok(Self::default());
        }

        match value.rfind('@') {
            Some(i) if i == 0 || i == value.len() - 1 => {
                Err(GhaError::InvalidUses(value.to_string()))
            }
            Some(i) => Ok(Uses {
                name: value[..i].to_string(),
                r#ref: value[i + 1..].to_string(),
                annotation: String::new(),
            }),
            None => Ok(Uses {
                name: value.to_string(),
                ..Self::default()
            }),
        }
    }

    /// Inverse of [`Uses::parse`]: the scalar form without the annotation.
    ///
    /// A ref without a name has no meaningful scalar form and is an error;
    /// the fully-unset value collapses to the empty string.
    pub fn to_scalar(&self) -> Result<String, GhaError> {
        if self.name.is_empty() && self.r#ref.is_empty() {
            return Ok(String::new());
        }
        if self.name.is_empty() {
            return Err(GhaError::UsesRefWithoutName);
        }

        if self.r#ref.is_empty() {
            Ok(self.name.clone())
        } else {
            Ok(format!("{}@{}", self.name, self.r#ref))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.r#ref.is_empty()
    }
}

impl fmt::Display for Uses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.r#ref.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.r#ref)
        }
    }
}

impl<'de> Deserialize<'de> for Uses {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(Self::default()),
            Value::String(scalar) => Uses::parse(&scalar).map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "cannot decode {} into a `uses` value",
                node_kind(&other)
            ))),
        }
    }
}

impl Serialize for Uses {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let scalar = self.to_scalar().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&scalar)
    }
}

// ─────────────────────────────────────────────────────────────
// Annotation line scan
// ─────────────────────────────────────────────────────────────

static ANNOTATED_USES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*(?:-[ \t]+)?uses:[ \t]+([^#\r\n]+?)[ \t]*#[ \t]*([^\r\n]*)$")
        .expect("annotated `uses:` pattern")
});

static PLAIN_USES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*(?:-[ \t]+)?uses:[ \t]+([^#\r\n]+?)[ \t]*$").expect("plain `uses:` pattern")
});

// `key: |`, `key: >-`, `- |` open a block scalar whose body lines must not
// be mistaken for `uses:` lines.
static BLOCK_SCALAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[:-][ \t]+[|>][0-9]*[+-]?[ \t]*$").expect("block scalar pattern"));

// String-map sections whose entries may themselves be named `uses`.
static STRING_MAP_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*(?:-[ \t]+)?(?:with|env|secrets|outputs):[ \t]*$")
        .expect("string map key pattern")
});

fn line_indent(line: &str) -> usize {
    line.bytes()
        .take_while(|b| *b == b' ' || *b == b'\t')
        .count()
}

/// Pending `uses:` annotations, keyed by the scalar they follow.
///
/// Every `uses:` occurrence is recorded, comment-free ones as an empty
/// entry, so consuming entries first-in-first-out pairs each occurrence
/// with its own line even when the same scalar appears both with and
/// without a comment.
#[derive(Debug, Default)]
pub(crate) struct Annotations {
    by_value: HashMap<String, VecDeque<String>>,
}

/// Skip state for lines that look like `uses:` but belong to a block
/// scalar body or a string-map section. A line deeper than the opening
/// indent is body; the first line back at or below it closes the region.
struct OpaqueRegion {
    indent: Option<usize>,
}

impl OpaqueRegion {
    fn new() -> Self {
        Self { indent: None }
    }

    fn covers(&mut self, line: &str) -> bool {
        if let Some(indent) = self.indent {
            if line.trim().is_empty() || line_indent(line) > indent {
                return true;
            }
            self.indent = None;
        }

        if BLOCK_SCALAR.is_match(line) || STRING_MAP_KEY.is_match(line) {
            self.indent = Some(line_indent(line));
            return true;
        }

        false
    }
}

impl Annotations {
    /// Collect `uses:` occurrences and their trailing comments from raw
    /// document text.
    pub(crate) fn scan(source: &str) -> Self {
        let mut by_value: HashMap<String, VecDeque<String>> = HashMap::new();
        let mut opaque = OpaqueRegion::new();
        for line in source.lines() {
            if opaque.covers(line) {
                continue;
            }

            let (value, comment) = if let Some(caps) = ANNOTATED_USES.captures(line) {
                let comment = caps
                    .get(2)
                    .map_or("", |m| m.as_str())
                    .trim_start_matches(|c| c == '#' || c == ' ')
                    .trim_end();
                (caps.get(1).map_or("", |m| m.as_str()), comment)
            } else if let Some(caps) = PLAIN_USES.captures(line) {
                (caps.get(1).map_or("", |m| m.as_str()), "")
            } else {
                continue;
            };

            by_value
                .entry(dequote(value.trim()).to_string())
                .or_default()
                .push_back(comment.to_string());
        }

        Self { by_value }
    }

    /// Collect annotations from model values, for re-emission after encode.
    pub(crate) fn collect(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut by_value: HashMap<String, VecDeque<String>> = HashMap::new();
        for (value, annotation) in pairs {
            by_value.entry(value).or_default().push_back(annotation);
        }

        Self { by_value }
    }

    pub(crate) fn take(&mut self, value: &str) -> Option<String> {
        self.by_value.get_mut(value).and_then(VecDeque::pop_front)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_value.values().all(VecDeque::is_empty)
    }

    /// Append pending annotations as trailing comments on the matching
    /// `uses:` lines of encoded output. Non-printable characters are
    /// stripped so a stray control character cannot corrupt the line.
    pub(crate) fn apply_to_output(&mut self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut opaque = OpaqueRegion::new();
        for line in text.lines() {
            if opaque.covers(line) {
                out.push_str(line);
                out.push('\n');
                continue;
            }

            if let Some(caps) = PLAIN_USES.captures(line) {
                let value = dequote(caps.get(1).map_or("", |m| m.as_str()).trim());
                if let Some(annotation) = self.take(value) {
                    let printable: String =
                        annotation.chars().filter(|c| !c.is_control()).collect();
                    out.push_str(line);
                    if !printable.is_empty() {
                        out.push_str(" # ");
                        out.push_str(&printable);
                    }
                    out.push('\n');
                    continue;
                }
            }

            out.push_str(line);
            out.push('\n');
        }

        out
    }
}

fn dequote(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}
