// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Swarm identity types shared between the agent runtime and the swarm engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SwarmId(pub Uuid);

impl SwarmId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SwarmId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SwarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Swarm lifecycle status. Serialized as its integer code in checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SwarmStatus {
    Created = 0,
    Running = 1,
    Stopped = 2,
    Error = 3,
    Completed = 4,
}

impl SwarmStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, SwarmStatus::Stopped | SwarmStatus::Error | SwarmStatus::Completed)
    }
}

impl From<SwarmStatus> for u8 {
    fn from(status: SwarmStatus) -> u8 {
        status as u8
    }
}

impl TryFrom<u8> for SwarmStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(SwarmStatus::Created),
            1 => Ok(SwarmStatus::Running),
            2 => Ok(SwarmStatus::Stopped),
            3 => Ok(SwarmStatus::Error),
            4 => Ok(SwarmStatus::Completed),
            other => Err(format!("invalid swarm status code {}", other)),
        }
    }
}

impl fmt::Display for SwarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwarmStatus::Created => "created",
            SwarmStatus::Running => "running",
            SwarmStatus::Stopped => "stopped",
            SwarmStatus::Error => "error",
            SwarmStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&SwarmStatus::Completed).unwrap(), "4");
        let status: SwarmStatus = serde_json::from_str("1").unwrap();
        assert_eq!(status, SwarmStatus::Running);
        assert!(serde_json::from_str::<SwarmStatus>("9").is_err());
    }
}
