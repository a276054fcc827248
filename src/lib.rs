//! gha-models - typed models for GitHub Actions YAML documents
//!
//! Decodes workflow files and action manifests into plain value structs and
//! encodes them back to canonical YAML. The YAML layer is `serde_yaml`; all
//! scalar-or-mapping polymorphism is handled by per-field codecs so callers
//! only ever see the normalized model.

pub mod error;
pub mod manifest;
pub mod matrix;
pub mod permissions;
pub mod uses;
pub mod workflow;

pub use error::{FixSuggestion, GhaError};
pub use manifest::{
    encode_manifest, parse_manifest, Branding, Input, Manifest, ManifestStep, Output, Runs,
};
pub use matrix::Matrix;
pub use permissions::Permissions;
pub use uses::Uses;
pub use workflow::{
    encode_workflow, parse_workflow, Concurrency, Defaults, DefaultsRun, Environment, Job, Needs,
    Ports, Service, ServiceCredentials, Step, Strategy, Workflow,
};
