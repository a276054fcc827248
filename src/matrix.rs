//! `strategy.matrix:` model and expansion
//!
//! The matrix is stored in its unexpanded source-of-truth form: per-axis
//! value lists plus the `include`/`exclude` override lists. Expansion into
//! concrete job variants is a derived, on-demand computation
//! ([`Matrix::expand`]), never stored state. Axis values are opaque YAML
//! payload (scalars or nested mappings); expansion only carries them through
//! and compares them structurally.

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_yaml::{Mapping, Value};

use crate::error::node_kind;

/// An unexpanded build matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matrix {
    /// Axis name to ordered value list, in declaration order. A bare-scalar
    /// axis payload decodes as a single-element list.
    pub axes: IndexMap<String, Vec<Value>>,

    /// Override entries, applied in order after the cartesian product.
    pub include: Vec<Mapping>,

    /// Filter entries, applied in order after `include`.
    pub exclude: Vec<Mapping>,

    /// Whole-matrix context expression (`matrix: ${{ … }}`), carried
    /// verbatim. Only resolvable at workflow-execution time, so expansion
    /// yields no rows.
    pub expression: Option<String>,
}

impl Matrix {
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
            && self.include.is_empty()
            && self.exclude.is_empty()
            && self.expression.is_none()
    }

    /// Compute the resolved job variants.
    ///
    /// Left-fold cartesian product over the axes in declaration order (value
    /// order preserved, existing rows in the outer loop), then `include`
    /// entries in order: the first row whose shared keys all match is merged
    /// in place (include keys win), a miss appends the entry as a new row.
    /// Finally `exclude` entries in order remove every row whose values
    /// match all of the entry's keys, keeping survivor order intact.
    pub fn expand(&self) -> Vec<Mapping> {
        if self.expression.is_some() {
            return Vec::new();
        }

        let mut rows: Vec<Mapping> = Vec::new();
        if !self.axes.is_empty() || !self.include.is_empty() {
            rows.push(Mapping::new());
        }

        for (axis, values) in &self.axes {
            let key = Value::String(axis.clone());
            let mut next = Vec::with_capacity(rows.len() * values.len());
            for row in &rows {
                for value in values {
                    let mut merged = row.clone();
                    merged.insert(key.clone(), value.clone());
                    next.push(merged);
                }
            }

            rows = next;
        }

        for entry in &self.include {
            match rows.iter().position(|row| overlap_matches(row, entry)) {
                Some(index) => {
                    for (key, value) in entry {
                        rows[index].insert(key.clone(), value.clone());
                    }
                }
                None => rows.push(entry.clone()),
            }
        }

        for entry in &self.exclude {
            rows.retain(|row| !exclude_matches(row, entry));
        }

        rows
    }
}

/// Every key present in both mappings must hold equal values; keys present
/// in only one side are ignored.
fn overlap_matches(row: &Mapping, patch: &Mapping) -> bool {
    patch.iter().all(|(key, want)| match row.get(key) {
        Some(got) => got == want,
        None => true,
    })
}

/// Every key of the filter must be present in the row with an equal value.
fn exclude_matches(row: &Mapping, filter: &Mapping) -> bool {
    filter.iter().all(|(key, want)| row.get(key) == Some(want))
}

impl<'de> Deserialize<'de> for Matrix {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(expression) => Ok(Matrix {
                expression: Some(expression),
                ..Matrix::default()
            }),
            Value::Mapping(mapping) => {
                let mut matrix = Matrix::default();
                for (key, value) in mapping {
                    let Value::String(key) = key else {
                        return Err(de::Error::custom(format!(
                            "invalid matrix key ({})",
                            node_kind(&key)
                        )));
                    };

                    match key.as_str() {
                        "include" => matrix.include = override_list(value, "include")?,
                        "exclude" => matrix.exclude = override_list(value, "exclude")?,
                        _ => {
                            let values = match value {
                                Value::Sequence(values) => values,
                                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                                    vec![value]
                                }
                                other => {
                                    return Err(de::Error::custom(format!(
                                        "invalid matrix entry {key:?} ({})",
                                        node_kind(&other)
                                    )))
                                }
                            };
                            matrix.axes.insert(key, values);
                        }
                    }
                }

                Ok(matrix)
            }
            other => Err(de::Error::custom(format!(
                "invalid matrix ({})",
                node_kind(&other)
            ))),
        }
    }
}

fn override_list<E>(value: Value, field: &str) -> Result<Vec<Mapping>, E>
where
    E: de::Error,
{
    let Value::Sequence(entries) = value else {
        return Err(E::custom(format!(
            "invalid matrix.{field} value ({})",
            node_kind(&value)
        )));
    };

    entries
        .into_iter()
        .map(|entry| match entry {
            Value::Mapping(entry) => Ok(entry),
            other => Err(E::custom(format!(
                "invalid matrix.{field} entry ({})",
                node_kind(&other)
            ))),
        })
        .collect()
}

impl Serialize for Matrix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if let Some(expression) = &self.expression {
            return serializer.serialize_str(expression);
        }

        let extras =
            usize::from(!self.include.is_empty()) + usize::from(!self.exclude.is_empty());
        let mut map = serializer.serialize_map(Some(self.axes.len() + extras))?;
        for (axis, values) in &self.axes {
            map.serialize_entry(axis, values)?;
        }
        if !self.include.is_empty() {
            map.serialize_entry("include", &self.include)?;
        }
        if !self.exclude.is_empty() {
            map.serialize_entry("exclude", &self.exclude)?;
        }
        map.end()
    }
}
