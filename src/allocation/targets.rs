use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{AllocationError, Target};

#[derive(Debug, Deserialize)]
#[serde(default)]
struct TargetsFile {
    complexity_per_item: u32,
    target: Vec<toml::Table>,
}

impl Default for TargetsFile {
    fn default() -> Self {
        Self {
            complexity_per_item: 1,
            target: Vec::new(),
        }
    }
}

/// Contents of a targets file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSet {
    /// Complexity charged per target; defaults to 1.
    pub complexity_per_item: u32,
    pub targets: Vec<Target>,
}

/// Load a TOML file of `[[target]]` tables.
///
/// ```toml
/// complexity_per_item = 3
///
/// [[target]]
/// id = "US-E01-010"
/// epic = "E01"
/// ```
pub fn load_target_set(path: &Path) -> Result<TargetSet, AllocationError> {
    let content = fs::read_to_string(path)
        .map_err(|e| AllocationError::TargetsFile(format!("{}: {}", path.display(), e)))?;
    parse_target_set(&content)
}

pub fn load_targets(path: &Path) -> Result<Vec<Target>, AllocationError> {
    load_target_set(path).map(|set| set.targets)
}

pub fn parse_targets(content: &str) -> Result<Vec<Target>, AllocationError> {
    parse_target_set(content).map(|set| set.targets)
}

/// Every key other than `id` becomes a string attribute. Nested tables and
/// arrays are rejected.
pub fn parse_target_set(content: &str) -> Result<TargetSet, AllocationError> {
    let file: TargetsFile =
        toml::from_str(content).map_err(|e| AllocationError::TargetsFile(e.to_string()))?;

    let mut targets = Vec::with_capacity(file.target.len());
    for (position, table) in file.target.into_iter().enumerate() {
        let id = match table.get("id") {
            Some(toml::Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
            _ => {
                return Err(AllocationError::TargetsFile(format!(
                    "target #{} has no string 'id'",
                    position + 1
                )))
            }
        };

        let mut attributes = BTreeMap::new();
        for (key, value) in table {
            if key == "id" {
                continue;
            }
            let text = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Datetime(d) => d.to_string(),
                toml::Value::Array(_) | toml::Value::Table(_) => {
                    return Err(AllocationError::TargetsFile(format!(
                        "target '{}': attribute '{}' must be a scalar",
                        id, key
                    )))
                }
            };
            attributes.insert(key, text);
        }

        targets.push(Target { id, attributes });
    }
    Ok(TargetSet {
        complexity_per_item: file.complexity_per_item,
        targets,
    })
}
