//! `permissions:` field codec
//!
//! The source format allows either the `read-all`/`write-all` scalar
//! shorthand or a per-scope mapping. Decoding normalizes both to one struct
//! with all 14 scopes populated (unlisted scopes default to `none`);
//! encoding collapses back to the scalar when every scope agrees and
//! otherwise emits only the scopes that grant something.

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_yaml::Value;

use crate::error::node_kind;

/// Access scopes of a `permissions:` block.
///
/// The default value (every scope empty) means the field was absent from
/// the document; after a successful decode every scope holds `read`,
/// `write`, or `none`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    pub actions: String,
    pub attestations: String,
    pub checks: String,
    pub contents: String,
    pub deployments: String,
    pub discussions: String,
    pub id_token: String,
    pub issues: String,
    pub models: String,
    pub packages: String,
    pub pages: String,
    pub pull_requests: String,
    pub security_events: String,
    pub statuses: String,
}

impl Permissions {
    /// Every scope set to the same access level.
    pub fn all(access: &str) -> Self {
        Permissions {
            actions: access.to_string(),
            attestations: access.to_string(),
            checks: access.to_string(),
            contents: access.to_string(),
            deployments: access.to_string(),
            discussions: access.to_string(),
            id_token: access.to_string(),
            issues: access.to_string(),
            models: access.to_string(),
            packages: access.to_string(),
            pages: access.to_string(),
            pull_requests: access.to_string(),
            security_events: access.to_string(),
            statuses: access.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scopes().into_iter().all(|(_, access)| access.is_empty())
    }

    /// Scopes in document key order.
    fn scopes(&self) -> [(&'static str, &str); 14] {
        [
            ("actions", self.actions.as_str()),
            ("attestations", self.attestations.as_str()),
            ("checks", self.checks.as_str()),
            ("contents", self.contents.as_str()),
            ("deployments", self.deployments.as_str()),
            ("discussions", self.discussions.as_str()),
            ("id-token", self.id_token.as_str()),
            ("issues", self.issues.as_str()),
            ("models", self.models.as_str()),
            ("packages", self.packages.as_str()),
            ("pages", self.pages.as_str()),
            ("pull-requests", self.pull_requests.as_str()),
            ("security-events", self.security_events.as_str()),
            ("statuses", self.statuses.as_str()),
        ]
    }

    fn scope_mut(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "actions" => Some(&mut self.actions),
            "attestations" => Some(&mut self.attestations),
            "checks" => Some(&mut self.checks),
            "contents" => Some(&mut self.contents),
            "deployments" => Some(&mut self.deployments),
            "discussions" => Some(&mut self.discussions),
            "id-token" => Some(&mut self.id_token),
            "issues" => Some(&mut self.issues),
            "models" => Some(&mut self.models),
            "packages" => Some(&mut self.packages),
            "pages" => Some(&mut self.pages),
            "pull-requests" => Some(&mut self.pull_requests),
            "security-events" => Some(&mut self.security_events),
            "statuses" => Some(&mut self.statuses),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(scalar) => match scalar.as_str() {
                "read-all" => Ok(Permissions::all("read")),
                "write-all" => Ok(Permissions::all("write")),
                _ => Err(de::Error::custom(format!(
                    "invalid permissions value {scalar:?}"
                ))),
            },
            Value::Mapping(mapping) => {
                let mut permissions = Permissions::all("none");
                for (key, value) in &mapping {
                    let Some(key) = key.as_str() else {
                        return Err(de::Error::custom(format!(
                            "invalid permissions key ({})",
                            node_kind(key)
                        )));
                    };
                    let Some(access) = value.as_str() else {
                        return Err(de::Error::custom(format!(
                            "invalid permissions.{key} value ({})",
                            node_kind(value)
                        )));
                    };

                    // Unknown scopes are ignored, mirroring upstream leniency.
                    if let Some(scope) = permissions.scope_mut(key) {
                        *scope = access.to_string();
                    }
                }

                Ok(permissions)
            }
            other => Err(de::Error::custom(format!(
                "invalid permissions ({})",
                node_kind(&other)
            ))),
        }
    }
}

impl Serialize for Permissions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let scopes = self.scopes();
        if scopes.iter().all(|(_, access)| *access == "read") {
            return serializer.serialize_str("read-all");
        }
        if scopes.iter().all(|(_, access)| *access == "write") {
            return serializer.serialize_str("write-all");
        }

        let granted: Vec<(&str, &str)> = scopes
            .into_iter()
            .filter(|(_, access)| !access.is_empty() && *access != "none")
            .collect();
        let mut map = serializer.serialize_map(Some(granted.len()))?;
        for (scope, access) in granted {
            map.serialize_entry(scope, access)?;
        }
        map.end()
    }
}
