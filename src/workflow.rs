//! Workflow document model
//!
//! Typed records for a pipeline workflow file, plus the per-field codecs for
//! the scalar-or-mapping shorthands (`concurrency:`, `environment:`,
//! `needs:`). Decoding normalizes every shorthand into one struct shape;
//! encoding picks the compact form whenever it is lossless, so a
//! decode→encode→decode cycle always yields an equal model even when the
//! text differs.

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::error::{node_kind, GhaError};
use crate::matrix::Matrix;
use crate::permissions::Permissions;
use crate::uses::{Annotations, Uses};

// ─────────────────────────────────────────────────────────────
// Document tree
// ─────────────────────────────────────────────────────────────

/// A whole workflow document. `jobs` is the only required section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workflow {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(rename = "run-name", skip_serializing_if = "String::is_empty")]
    pub run_name: String,

    #[serde(skip_serializing_if = "Permissions::is_empty")]
    pub permissions: Permissions,

    #[serde(skip_serializing_if = "Concurrency::is_empty")]
    pub concurrency: Concurrency,

    #[serde(skip_serializing_if = "Defaults::is_empty")]
    pub defaults: Defaults,

    #[serde(deserialize_with = "string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    /// Job name to definition, in document order.
    pub jobs: IndexMap<String, Job>,
}

/// One entry under `jobs:`. Holds both the step-based fields (`steps`) and
/// the call-based fields (`uses`, `with`, `secrets`); which variant applies
/// is not enforced here, mirroring upstream leniency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(rename = "if", skip_serializing_if = "String::is_empty")]
    pub r#if: String,

    #[serde(skip_serializing_if = "Needs::is_empty")]
    pub needs: Needs,

    #[serde(skip_serializing_if = "Environment::is_empty")]
    pub environment: Environment,

    #[serde(skip_serializing_if = "Concurrency::is_empty")]
    pub concurrency: Concurrency,

    #[serde(skip_serializing_if = "Defaults::is_empty")]
    pub defaults: Defaults,

    #[serde(skip_serializing_if = "Permissions::is_empty")]
    pub permissions: Permissions,

    #[serde(deserialize_with = "string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    #[serde(rename = "continue-on-error", skip_serializing_if = "is_false")]
    pub continue_on_error: bool,

    #[serde(rename = "timeout-minutes", skip_serializing_if = "is_zero")]
    pub timeout_minutes: u64,

    #[serde(skip_serializing_if = "Strategy::is_empty")]
    pub strategy: Strategy,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub services: IndexMap<String, Service>,

    #[serde(deserialize_with = "string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,

    /// Reusable-workflow reference of a call-based job. A plain document
    /// path, not a `name@ref` scalar, so it stays a string.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uses: String,

    #[serde(deserialize_with = "string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub with: IndexMap<String, String>,

    #[serde(deserialize_with = "string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub secrets: IndexMap<String, String>,
}

/// One entry under a job's `steps:`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Step {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(rename = "if", skip_serializing_if = "String::is_empty")]
    pub r#if: String,

    #[serde(rename = "continue-on-error", skip_serializing_if = "is_false")]
    pub continue_on_error: bool,

    #[serde(rename = "timeout-minutes", skip_serializing_if = "is_zero")]
    pub timeout_minutes: u64,

    #[serde(rename = "working-directory", skip_serializing_if = "String::is_empty")]
    pub working_directory: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub shell: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub run: String,

    #[serde(skip_serializing_if = "Uses::is_empty")]
    pub uses: Uses,

    #[serde(deserialize_with = "string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub with: IndexMap<String, String>,

    #[serde(deserialize_with = "string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    #[serde(skip_serializing_if = "DefaultsRun::is_empty")]
    pub run: DefaultsRun,
}

impl Defaults {
    pub fn is_empty(&self) -> bool {
        self.run.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsRun {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub shell: String,

    #[serde(rename = "working-directory", skip_serializing_if = "String::is_empty")]
    pub working_directory: String,
}

impl DefaultsRun {
    pub fn is_empty(&self) -> bool {
        self.shell.is_empty() && self.working_directory.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Strategy {
    #[serde(skip_serializing_if = "Matrix::is_empty")]
    pub matrix: Matrix,

    #[serde(rename = "fail-fast", skip_serializing_if = "Option::is_none")]
    pub fail_fast: Option<bool>,

    #[serde(rename = "max-parallel", skip_serializing_if = "is_zero")]
    pub max_parallel: u64,
}

impl Strategy {
    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty() && self.fail_fast.is_none() && self.max_parallel == 0
    }
}

/// A container service attached to a job. `image` is the one field that is
/// always emitted, even when empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub image: String,

    #[serde(skip_serializing_if = "ServiceCredentials::is_empty")]
    pub credentials: ServiceCredentials,

    #[serde(deserialize_with = "string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    #[serde(skip_serializing_if = "Ports::is_empty")]
    pub ports: Ports,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub options: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceCredentials {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl ServiceCredentials {
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────
// Shorthand codecs
// ─────────────────────────────────────────────────────────────

/// `concurrency:` value. The bare-scalar form is shorthand for the group
/// name. `cancel-in-progress` is stored as a string because the source
/// format allows a context expression there as well as a boolean; plain
/// `"true"`/`"false"` are re-emitted as YAML booleans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Concurrency {
    pub cancel_in_progress: String,
    pub group: String,
}

impl Concurrency {
    pub fn is_empty(&self) -> bool {
        self.cancel_in_progress.is_empty() && self.group.is_empty()
    }
}

impl<'de> Deserialize<'de> for Concurrency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(Self::default()),
            Value::String(group) => Ok(Concurrency {
                group,
                ..Self::default()
            }),
            Value::Number(scalar) => Ok(Concurrency {
                group: scalar.to_string(),
                ..Self::default()
            }),
            Value::Bool(scalar) => Ok(Concurrency {
                group: scalar.to_string(),
                ..Self::default()
            }),
            Value::Mapping(mapping) => {
                let mut concurrency = Concurrency::default();
                for (key, value) in &mapping {
                    match key.as_str() {
                        Some("group") => {
                            let Some(group) = value.as_str() else {
                                return Err(de::Error::custom(format!(
                                    "invalid concurrency.group value ({})",
                                    node_kind(value)
                                )));
                            };
                            concurrency.group = group.to_string();
                        }
                        Some("cancel-in-progress") => {
                            concurrency.cancel_in_progress = match value {
                                Value::Bool(flag) => flag.to_string(),
                                Value::String(expression) => expression.clone(),
                                other => {
                                    return Err(de::Error::custom(format!(
                                        "invalid concurrency.cancel-in-progress value ({})",
                                        node_kind(other)
                                    )))
                                }
                            };
                        }
                        _ => {}
                    }
                }

                Ok(concurrency)
            }
            other => Err(de::Error::custom(format!(
                "invalid concurrency ({})",
                node_kind(&other)
            ))),
        }
    }
}

impl Serialize for Concurrency {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.cancel_in_progress.is_empty() {
            return serializer.serialize_str(&self.group);
        }

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("group", &self.group)?;
        match self.cancel_in_progress.as_str() {
            "true" => map.serialize_entry("cancel-in-progress", &true)?,
            "false" => map.serialize_entry("cancel-in-progress", &false)?,
            expression => map.serialize_entry("cancel-in-progress", expression)?,
        }
        map.end()
    }
}

/// `environment:` value of a job. The bare-scalar form is shorthand for the
/// environment name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub url: String,
}

impl Environment {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.url.is_empty()
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(Self::default()),
            Value::String(name) => Ok(Environment {
                name,
                ..Self::default()
            }),
            Value::Mapping(mapping) => {
                let mut environment = Environment::default();
                for (key, value) in &mapping {
                    let field = match key.as_str() {
                        Some("name") => &mut environment.name,
                        Some("url") => &mut environment.url,
                        _ => continue,
                    };
                    let Some(scalar) = value.as_str() else {
                        return Err(de::Error::custom(format!(
                            "invalid environment value ({})",
                            node_kind(value)
                        )));
                    };
                    *field = scalar.to_string();
                }

                Ok(environment)
            }
            other => Err(de::Error::custom(format!(
                "invalid environment ({})",
                node_kind(&other)
            ))),
        }
    }
}

impl Serialize for Environment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.url.is_empty() {
            return serializer.serialize_str(&self.name);
        }

        let mut map = serializer.serialize_map(None)?;
        if !self.name.is_empty() {
            map.serialize_entry("name", &self.name)?;
        }
        map.serialize_entry("url", &self.url)?;
        map.end()
    }
}

/// `needs:` value of a job. A bare scalar decodes as a one-element list;
/// encoding always emits the list form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Needs(pub Vec<String>);

impl Needs {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Needs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(Self::default()),
            Value::String(job) => Ok(Needs(vec![job])),
            Value::Sequence(entries) => entries
                .into_iter()
                .map(|entry| match entry {
                    Value::String(job) => Ok(job),
                    other => Err(de::Error::custom(format!(
                        "invalid needs entry ({})",
                        node_kind(&other)
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Needs),
            other => Err(de::Error::custom(format!(
                "invalid needs ({})",
                node_kind(&other)
            ))),
        }
    }
}

/// `ports:` list of a service. Numeric-looking entries (`- 6379`) are
/// accepted and stringified so port mappings and bare ports share one type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ports(pub Vec<String>);

impl Ports {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Ports {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(Self::default()),
            Value::Sequence(entries) => entries
                .into_iter()
                .map(|entry| scalar_string(&entry, "ports entry"))
                .collect::<Result<Vec<_>, _>>()
                .map(Ports),
            other => Err(de::Error::custom(format!(
                "invalid ports ({})",
                node_kind(&other)
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────
// Decode helpers
// ─────────────────────────────────────────────────────────────

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

fn scalar_string<E>(value: &Value, what: &str) -> Result<String, E>
where
    E: de::Error,
{
    match value {
        Value::String(scalar) => Ok(scalar.clone()),
        Value::Number(scalar) => Ok(scalar.to_string()),
        Value::Bool(scalar) => Ok(scalar.to_string()),
        other => Err(E::custom(format!(
            "invalid {what} ({})",
            node_kind(other)
        ))),
    }
}

/// Ordered string-to-string map that tolerates numeric and boolean scalar
/// values (`fetch-depth: 0`) by stringifying them.
pub(crate) fn string_map<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(IndexMap::new()),
        Value::Mapping(mapping) => {
            let mut entries = IndexMap::with_capacity(mapping.len());
            for (key, value) in &mapping {
                let Some(key) = key.as_str() else {
                    return Err(de::Error::custom(format!(
                        "invalid map key ({})",
                        node_kind(key)
                    )));
                };
                entries.insert(key.to_string(), scalar_string(value, "map value")?);
            }
            Ok(entries)
        }
        other => Err(de::Error::custom(format!(
            "cannot decode {} into a string map",
            node_kind(&other)
        ))),
    }
}

// ─────────────────────────────────────────────────────────────
// Entry points
// ─────────────────────────────────────────────────────────────

/// Decode a workflow document.
///
/// The first field-level decode failure aborts the whole parse. `uses:`
/// trailing comments, which the YAML layer discards, are recovered with a
/// best-effort line scan over the raw text and attached to the matching
/// steps as annotations.
pub fn parse_workflow(data: &[u8]) -> Result<Workflow, GhaError> {
    debug!(bytes = data.len(), "parsing workflow document");
    let mut workflow: Workflow = serde_yaml::from_slice(data).map_err(GhaError::ParseWorkflow)?;

    if let Ok(source) = std::str::from_utf8(data) {
        let mut annotations = Annotations::scan(source);
        if !annotations.is_empty() {
            for job in workflow.jobs.values_mut() {
                for step in &mut job.steps {
                    if step.uses.is_empty() {
                        continue;
                    }
                    if let Some(annotation) = annotations.take(&step.uses.to_string()) {
                        step.uses.annotation = annotation;
                    }
                }
            }
        }
    }

    Ok(workflow)
}

/// Encode a workflow back to canonical YAML, re-emitting step annotations
/// as trailing comments.
pub fn encode_workflow(workflow: &Workflow) -> Result<String, GhaError> {
    let text = serde_yaml::to_string(workflow).map_err(GhaError::EncodeWorkflow)?;

    let mut annotations = Annotations::collect(
        workflow
            .jobs
            .values()
            .flat_map(|job| &job.steps)
            .filter(|step| !step.uses.annotation.is_empty())
            .map(|step| (step.uses.to_string(), step.uses.annotation.clone())),
    );
    if annotations.is_empty() {
        return Ok(text);
    }

    Ok(annotations.apply_to_output(&text))
}
