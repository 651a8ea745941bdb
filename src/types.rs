use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the repository metrics are collected for.
///
/// Only used to namespace metrics and to build upstream URLs; never mutated
/// after construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryIdentity {
    pub owner: String,
    pub name: String,
}

impl RepositoryIdentity {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parses an `owner/name` identifier.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let parts: Vec<&str> = s.trim().split('/').map(str::trim).collect();
        match parts.as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Self::new(*owner, *name)),
            _ => bail!("bad repo format {s} (expected owner/name)"),
        }
    }

    /// The dotted metric namespace, e.g. `docker.docker`.
    pub fn nwo(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let id = RepositoryIdentity::parse("docker/docker").unwrap();
        assert_eq!(id.owner, "docker");
        assert_eq!(id.name, "docker");
        assert_eq!(id.to_string(), "docker/docker");
        assert_eq!(id.nwo(), "docker.docker");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let id = RepositoryIdentity::parse(" rust-lang / rust ").unwrap();
        assert_eq!(id, RepositoryIdentity::new("rust-lang", "rust"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["docker", "docker/docker/extra", "/docker", "docker/", ""] {
            let err = RepositoryIdentity::parse(bad).unwrap_err();
            assert!(err.to_string().contains("bad repo format"), "{bad}: {err}");
        }
    }
}
