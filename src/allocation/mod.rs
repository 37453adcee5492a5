//! Work allocation.
//!
//! Partitions a list of targets into groups, one group per worker instance,
//! under a role's capacity limits. Everything here is pure: no I/O except
//! loading the targets file.

mod strategy;
mod targets;

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use crate::config::Role;
use crate::error::ErrorKind;

pub use strategy::Strategy;
pub use targets::{load_target_set, load_targets, parse_target_set, parse_targets, TargetSet};

/// An opaque unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub id: String,
    pub attributes: BTreeMap<String, String>,
}

impl Target {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }
}

/// Targets assigned to one worker instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationGroup {
    /// Zero-based worker instance.
    pub index: usize,
    /// Field value shared by the group (by-field strategy only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub targets: Vec<Target>,
}

impl AllocationGroup {
    pub fn target_ids(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.id.as_str()).collect()
    }
}

/// Result of one allocation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub role_id: String,
    pub strategy: Strategy,
    pub groups: Vec<AllocationGroup>,
}

impl Allocation {
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn target_count(&self) -> usize {
        self.groups.iter().map(|g| g.targets.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group contents as id lists, in order.
    pub fn id_groups(&self) -> Vec<Vec<&str>> {
        self.groups.iter().map(|g| g.target_ids()).collect()
    }

    /// Largest group complexity at `complexity_per_item`.
    pub fn max_group_complexity(&self, complexity_per_item: u32) -> u64 {
        self.groups
            .iter()
            .map(|g| g.targets.len() as u64 * complexity_per_item as u64)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("target '{target}' has no attribute '{field}'")]
    MissingField { target: String, field: String },
    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),
    #[error("duplicate target id '{0}'")]
    DuplicateTarget(String),
    #[error("unknown allocation strategy '{0}' (expected single, round_robin or by_<field>)")]
    UnknownStrategy(String),
    #[error("targets file: {0}")]
    TargetsFile(String),
}

impl AllocationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. } => ErrorKind::MissingField,
            Self::InvalidCapacity(_) => ErrorKind::InvalidCapacity,
            Self::DuplicateTarget(_) => ErrorKind::DuplicateTarget,
            Self::UnknownStrategy(_) => ErrorKind::InvalidArgument,
            Self::TargetsFile(_) => ErrorKind::Config,
        }
    }
}

/// Partition `targets` for `role`.
///
/// The per-agent cap is the smaller of `max_per_agent` and the role's
/// `max_items`. Input order is preserved within and across groups.
///
/// # Examples
/// ```
/// use convoy::allocation::{allocate, Strategy, Target};
/// use convoy::config::Role;
///
/// let targets: Vec<Target> = (1..=5).map(|i| Target::new(&format!("US-{}", i))).collect();
/// let role = Role::new("product_analyst", 1000, 4);
/// let allocation = allocate(&targets, &role, &Strategy::RoundRobin, None, 2).unwrap();
/// assert_eq!(
///     allocation.id_groups(),
///     vec![vec!["US-1", "US-2"], vec!["US-3", "US-4"], vec!["US-5"]]
/// );
/// ```
pub fn allocate(
    targets: &[Target],
    role: &Role,
    strategy: &Strategy,
    max_per_agent: Option<usize>,
    complexity_per_item: u32,
) -> Result<Allocation, AllocationError> {
    if role.complexity_threshold == 0 {
        return Err(AllocationError::InvalidCapacity(format!(
            "role '{}' has complexity_threshold 0",
            role.role_id
        )));
    }
    if max_per_agent == Some(0) {
        return Err(AllocationError::InvalidCapacity(
            "max_per_agent must be at least 1".to_string(),
        ));
    }
    if role.max_items == Some(0) {
        return Err(AllocationError::InvalidCapacity(format!(
            "role '{}' has max_items 0",
            role.role_id
        )));
    }

    let mut seen = HashSet::new();
    for target in targets {
        if !seen.insert(target.id.as_str()) {
            return Err(AllocationError::DuplicateTarget(target.id.clone()));
        }
    }

    let cap = match (max_per_agent, role.max_items) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    let groups = if targets.is_empty() {
        Vec::new()
    } else {
        match strategy {
            Strategy::Single => vec![AllocationGroup {
                index: 0,
                key: None,
                targets: targets.to_vec(),
            }],
            Strategy::RoundRobin => {
                let agents = agent_count(
                    targets.len(),
                    role.complexity_threshold,
                    complexity_per_item,
                    cap,
                );
                chunk_groups(targets, agents)
            }
            Strategy::ByField(field) => field_groups(targets, field)?,
        }
    };

    Ok(Allocation {
        role_id: role.role_id.clone(),
        strategy: strategy.clone(),
        groups,
    })
}

/// Worker count for round robin over `n > 0` targets.
///
/// Starts from total complexity over the threshold, clamped to `[1, n]`,
/// then raised until no chunk exceeds the threshold (unless a single
/// target already does) or the per-agent cap.
fn agent_count(n: usize, threshold: u32, complexity: u32, cap: Option<usize>) -> usize {
    let total = n as u64 * complexity as u64;
    let mut agents = (total.div_ceil(threshold as u64) as usize).clamp(1, n);

    if complexity > 0 {
        let per_agent = ((threshold / complexity) as usize).max(1);
        agents = agents.max(n.div_ceil(per_agent));
    }
    if let Some(cap) = cap {
        agents = agents.max(n.div_ceil(cap));
    }
    agents.min(n)
}

fn chunk_groups(targets: &[Target], agents: usize) -> Vec<AllocationGroup> {
    let chunk = targets.len().div_ceil(agents);
    targets
        .chunks(chunk)
        .enumerate()
        .map(|(index, chunk)| AllocationGroup {
            index,
            key: None,
            targets: chunk.to_vec(),
        })
        .collect()
}

fn field_groups(targets: &[Target], field: &str) -> Result<Vec<AllocationGroup>, AllocationError> {
    let mut groups: Vec<AllocationGroup> = Vec::new();
    for target in targets {
        let value = target
            .attr(field)
            .ok_or_else(|| AllocationError::MissingField {
                target: target.id.clone(),
                field: field.to_string(),
            })?;
        match groups.iter_mut().find(|g| g.key.as_deref() == Some(value)) {
            Some(group) => group.targets.push(target.clone()),
            None => groups.push(AllocationGroup {
                index: groups.len(),
                key: Some(value.to_string()),
                targets: vec![target.clone()],
            }),
        }
    }
    Ok(groups)
}
