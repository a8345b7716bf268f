use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised if a project ID cannot be parsed from a string.
#[derive(Debug, Error, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParseProjectIdError {
    /// Raised if the value is not an integer in the supported range.
    #[error("invalid value for project id")]
    InvalidValue,
    /// Raised if an empty value is parsed.
    #[error("empty or missing project id")]
    EmptyValue,
}

/// Represents a project ID.
///
/// Project ids are numeric on the wire but kept as their original string so
/// that a DSN always formats back to exactly what was parsed.
#[derive(Clone, Debug, PartialEq, Eq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(into = "u64", from = "u64")]
pub struct ProjectId(String);

impl ProjectId {
    /// Creates a new project ID from its numeric value.
    #[inline]
    pub fn new(id: u64) -> Self {
        Self(id.to_string())
    }

    /// Returns the numeric value of this project id, if it is one.
    #[inline]
    pub fn value(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// Returns the project id as it appears in the DSN path.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ProjectId {
    fn from(val: u64) -> Self {
        Self::new(val)
    }
}

impl From<u32> for ProjectId {
    fn from(val: u32) -> Self {
        Self::new(val.into())
    }
}

impl From<ProjectId> for u64 {
    fn from(pid: ProjectId) -> Self {
        pid.value().unwrap_or(u64::MAX)
    }
}

impl FromStr for ProjectId {
    type Err = ParseProjectIdError;

    fn from_str(s: &str) -> Result<ProjectId, ParseProjectIdError> {
        if s.is_empty() {
            return Err(ParseProjectIdError::EmptyValue);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseProjectIdError::InvalidValue);
        }
        Ok(ProjectId(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_api() {
        let id: ProjectId = "42".parse().unwrap();
        assert_eq!(id, ProjectId::new(42));
        assert_eq!(id.value(), Some(42));
        assert_eq!(
            "42xxx".parse::<ProjectId>(),
            Err(ParseProjectIdError::InvalidValue)
        );
        assert_eq!(
            "-1".parse::<ProjectId>(),
            Err(ParseProjectIdError::InvalidValue)
        );
        assert_eq!(
            "".parse::<ProjectId>(),
            Err(ParseProjectIdError::EmptyValue)
        );

        assert_eq!(serde_json::to_string(&ProjectId::new(42)).unwrap(), "42");
        assert_eq!(
            serde_json::from_str::<ProjectId>("42").unwrap(),
            ProjectId::new(42)
        );
    }
}
