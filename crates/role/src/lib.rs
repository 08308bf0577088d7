//! Node Role Resolution
//!
//! A node runs either the car logic or the ground logic. The role lives in
//! a one-line file:
//! - production: `/boot/pi_role` holding `car` or `ground`, written by root
//! - development: a local file holding `dev:car` or `dev:ground`
//!
//! The role is read once at startup and handed to the launcher as a value.

mod error;
mod store;

pub use error::RoleError;
pub use store::{is_privileged, resolve, set_dev, set_production, RoleConfig};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logic a node runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Car,
    Ground,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Car => "car",
            Role::Ground => "ground",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(Role::Car),
            "ground" => Ok(Role::Ground),
            other => Err(RoleError::UnknownRole(other.to_string())),
        }
    }
}

/// Persisted role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleState {
    Unset,
    Car,
    Ground,
    DevCar,
    DevGround,
}

impl RoleState {
    /// Parse a production file token (`car`, `ground`)
    pub fn from_production(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "car" => Some(RoleState::Car),
            "ground" => Some(RoleState::Ground),
            _ => None,
        }
    }

    /// Parse a development file token (`dev:car`, `dev:ground`)
    pub fn from_dev(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "dev:car" => Some(RoleState::DevCar),
            "dev:ground" => Some(RoleState::DevGround),
            _ => None,
        }
    }

    /// The logic to run, `None` when unset
    pub fn role(&self) -> Option<Role> {
        match self {
            RoleState::Unset => None,
            RoleState::Car | RoleState::DevCar => Some(Role::Car),
            RoleState::Ground | RoleState::DevGround => Some(Role::Ground),
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, RoleState::DevCar | RoleState::DevGround)
    }

    /// The role, or the fatal configuration error when unset
    pub fn require(&self) -> Result<Role, RoleError> {
        self.role().ok_or(RoleError::Unset)
    }

    /// File token for this state
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleState::Unset => "unset",
            RoleState::Car => "car",
            RoleState::Ground => "ground",
            RoleState::DevCar => "dev:car",
            RoleState::DevGround => "dev:ground",
        }
    }
}

impl fmt::Display for RoleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
