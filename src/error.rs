//! Error types with fix suggestions

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Errors produced by document decoding and encoding.
///
/// Any field-local decode failure (unrecognized node shape, invalid scalar
/// shorthand) aborts the whole parse and surfaces as one of the parse
/// variants; no partial model is ever returned.
#[derive(Error, Debug)]
pub enum GhaError {
    #[error("could not parse workflow: {0}")]
    ParseWorkflow(#[source] serde_yaml::Error),

    #[error("could not parse manifest: {0}")]
    ParseManifest(#[source] serde_yaml::Error),

    #[error("could not encode workflow: {0}")]
    EncodeWorkflow(#[source] serde_yaml::Error),

    #[error("could not encode manifest: {0}")]
    EncodeManifest(#[source] serde_yaml::Error),

    #[error("invalid `uses` value ({0:?})")]
    InvalidUses(String),

    #[error("missing `name` in `uses` value")]
    UsesRefWithoutName,
}

/// Human-readable YAML node kind, for format-error messages.
pub(crate) fn node_kind(value: &serde_yaml::Value) -> &'static str {
    use serde_yaml::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

impl FixSuggestion for GhaError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            GhaError::ParseWorkflow(_) => {
                Some("Check YAML syntax and field shapes against the workflow schema")
            }
            GhaError::ParseManifest(_) => {
                Some("Check YAML syntax and field shapes against the action manifest schema")
            }
            GhaError::EncodeWorkflow(_) | GhaError::EncodeManifest(_) => {
                Some("Check the model for values the YAML layer cannot represent")
            }
            GhaError::InvalidUses(_) => {
                Some("Use the form <name>@<ref>, with a non-empty name and ref")
            }
            GhaError::UsesRefWithoutName => {
                Some("Set `name` on the Uses value or clear its `ref`")
            }
        }
    }
}
