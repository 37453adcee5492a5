use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::AllocationError;

/// How targets are split across worker instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Everything to one worker, regardless of capacity.
    Single,
    /// Contiguous chunks sized by the role's complexity threshold.
    RoundRobin,
    /// One group per distinct value of the named attribute.
    ByField(String),
}

impl FromStr for Strategy {
    type Err = AllocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "round_robin" | "round-robin" => Ok(Self::RoundRobin),
            lower if lower.starts_with("by_") && trimmed.len() > 3 => {
                // Field names keep their case.
                Ok(Self::ByField(trimmed[3..].to_string()))
            }
            _ => Err(AllocationError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::RoundRobin => f.write_str("round_robin"),
            Self::ByField(field) => write!(f, "by_{}", field),
        }
    }
}

impl Serialize for Strategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
