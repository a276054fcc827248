//! Action manifest document model
//!
//! Typed records for a reusable action's `action.yml`. The `runs:` section
//! is a union over the three execution flavors (composite, container, node);
//! `using` is carried as an open string and the flavor-specific fields are
//! emitted only when set, so unknown future flavors decode without loss.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GhaError;
use crate::uses::{Annotations, Uses};
use crate::workflow::string_map;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub author: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(skip_serializing_if = "Branding::is_empty")]
    pub branding: Branding,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub inputs: IndexMap<String, Input>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, Output>,

    pub runs: Runs,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branding {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub color: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub icon: String,
}

impl Branding {
    pub fn is_empty(&self) -> bool {
        self.color.is_empty() && self.icon.is_empty()
    }
}

/// One declared input. `required: false` is the format default, so only an
/// explicit `true` is re-emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Input {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default: String,

    #[serde(rename = "deprecationMessage", skip_serializing_if = "String::is_empty")]
    pub deprecation_message: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub value: String,
}

/// The `runs:` section. Which fields are meaningful depends on `using`
/// (`composite`, `docker`, `node20`, …) but nothing is enforced here; the
/// set fields drive what gets emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Runs {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub using: String,

    // composite
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<ManifestStep>,

    // container
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(deserialize_with = "string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    #[serde(rename = "pre-entrypoint", skip_serializing_if = "String::is_empty")]
    pub pre_entrypoint: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub entrypoint: String,

    #[serde(rename = "post-entrypoint", skip_serializing_if = "String::is_empty")]
    pub post_entrypoint: String,

    // node
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pre: String,

    #[serde(rename = "pre-if", skip_serializing_if = "String::is_empty")]
    pub pre_if: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub main: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub post: String,

    #[serde(rename = "post-if", skip_serializing_if = "String::is_empty")]
    pub post_if: String,
}

/// One step of a composite action. A narrower record than a workflow
/// [`crate::workflow::Step`]: only the shared execution core applies here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestStep {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

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

fn is_false(value: &bool) -> bool {
    !*value
}

/// Decode an action manifest.
///
/// Same contract as [`crate::workflow::parse_workflow`]: the first
/// field-level failure aborts the parse, and `uses:` trailing comments in
/// composite steps are recovered from the raw text.
pub fn parse_manifest(data: &[u8]) -> Result<Manifest, GhaError> {
    debug!(bytes = data.len(), "parsing action manifest");
    let mut manifest: Manifest = serde_yaml::from_slice(data).map_err(GhaError::ParseManifest)?;

    if let Ok(source) = std::str::from_utf8(data) {
        let mut annotations = Annotations::scan(source);
        if !annotations.is_empty() {
            for step in &mut manifest.runs.steps {
                if step.uses.is_empty() {
                    continue;
                }
                if let Some(annotation) = annotations.take(&step.uses.to_string()) {
                    step.uses.annotation = annotation;
                }
            }
        }
    }

    Ok(manifest)
}

/// Encode a manifest back to canonical YAML, re-emitting step annotations
/// as trailing comments.
pub fn encode_manifest(manifest: &Manifest) -> Result<String, GhaError> {
    let text = serde_yaml::to_string(manifest).map_err(GhaError::EncodeManifest)?;

    let mut annotations = Annotations::collect(
        manifest
            .runs
            .steps
            .iter()
            .filter(|step| !step.uses.annotation.is_empty())
            .map(|step| (step.uses.to_string(), step.uses.annotation.clone())),
    );
    if annotations.is_empty() {
        return Ok(text);
    }

    Ok(annotations.apply_to_output(&text))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_composite_manifest() {
        let manifest = parse_manifest(
            b"name: Hello\ndescription: Greet someone\nruns:\n  using: composite\n  steps:\n    - run: echo hello\n      shell: bash\n",
        )
        .unwrap();
        assert_eq!(manifest.name, "Hello");
        assert_eq!(manifest.runs.using, "composite");
        assert_eq!(manifest.runs.steps[0].run, "echo hello");
        assert_eq!(manifest.runs.steps[0].shell, "bash");
    }

    #[test]
    fn test_parse_docker_manifest() {
        let manifest = parse_manifest(
            b"runs:\n  using: docker\n  image: Dockerfile\n  args:\n    - ${{ inputs.who }}\n  entrypoint: /entry.sh\n  post-entrypoint: /cleanup.sh\n",
        )
        .unwrap();
        assert_eq!(manifest.runs.using, "docker");
        assert_eq!(manifest.runs.image, "Dockerfile");
        assert_eq!(manifest.runs.args, ["${{ inputs.who }}"]);
        assert_eq!(manifest.runs.post_entrypoint, "/cleanup.sh");
    }

    #[test]
    fn test_parse_node_manifest() {
        let manifest = parse_manifest(
            b"runs:\n  using: node20\n  main: dist/index.js\n  pre: dist/setup.js\n  pre-if: runner.os == 'Linux'\n  post: dist/cleanup.js\n",
        )
        .unwrap();
        assert_eq!(manifest.runs.using, "node20");
        assert_eq!(manifest.runs.main, "dist/index.js");
        assert_eq!(manifest.runs.pre_if, "runner.os == 'Linux'");
    }

    #[test]
    fn test_unknown_using_is_carried_verbatim() {
        let manifest = parse_manifest(b"runs:\n  using: node99\n  main: index.js\n").unwrap();
        assert_eq!(manifest.runs.using, "node99");
    }

    #[test]
    fn test_inputs_and_outputs_keep_order() {
        let manifest = parse_manifest(
            b"inputs:\n  who:\n    description: Target\n    required: true\n  greeting:\n    default: hello\n    deprecationMessage: use who\noutputs:\n  time:\n    description: Timestamp\n    value: ${{ steps.main.outputs.time }}\nruns:\n  using: node20\n  main: index.js\n",
        )
        .unwrap();

        let inputs: Vec<&String> = manifest.inputs.keys().collect();
        assert_eq!(inputs, ["who", "greeting"]);
        assert!(manifest.inputs["who"].required);
        assert_eq!(manifest.inputs["greeting"].deprecation_message, "use who");
        assert_eq!(
            manifest.outputs["time"].value,
            "${{ steps.main.outputs.time }}"
        );
    }

    #[test]
    fn test_parse_manifest_error_names_document_kind() {
        let err = parse_manifest(b"runs: 3.14").unwrap_err();
        assert!(err.to_string().starts_with("could not parse manifest:"));
    }

    #[test]
    fn test_encode_skips_unset_union_fields() {
        let manifest = parse_manifest(b"runs:\n  using: node20\n  main: index.js\n").unwrap();
        let out = encode_manifest(&manifest).unwrap();
        assert_eq!(out, "runs:\n  using: node20\n  main: index.js\n");
    }

    #[test]
    fn test_composite_step_annotation_round_trip() {
        let source =
            b"runs:\n  using: composite\n  steps:\n  - uses: actions/cache@v4 # restore deps\n";
        let manifest = parse_manifest(source).unwrap();
        assert_eq!(manifest.runs.steps[0].uses.annotation, "restore deps");

        let out = encode_manifest(&manifest).unwrap();
        assert!(out.contains("uses: actions/cache@v4 # restore deps"));
        assert_eq!(parse_manifest(out.as_bytes()).unwrap(), manifest);
    }

    #[test]
    fn test_annotation_stays_on_its_own_occurrence() {
        let manifest = parse_manifest(
            b"runs:\n  using: composite\n  steps:\n  - uses: actions/cache@v4\n  - uses: actions/cache@v4 # warm cache\n",
        )
        .unwrap();
        assert_eq!(manifest.runs.steps[0].uses.annotation, "");
        assert_eq!(manifest.runs.steps[1].uses.annotation, "warm cache");
    }

    #[test]
    fn test_deprecation_message_casing() {
        let manifest =
            parse_manifest(b"inputs:\n  old:\n    deprecationMessage: gone soon\nruns:\n  using: node20\n  main: index.js\n")
                .unwrap();
        let out = encode_manifest(&manifest).unwrap();
        assert!(out.contains("deprecationMessage: gone soon"));
    }
}
