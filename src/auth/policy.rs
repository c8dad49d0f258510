//! Static method-to-role access table.
//!
//! Methods are matched by exact, fully-qualified path
//! (`/package.Service/Method`). Methods without an entry are public.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access<'a> {
    /// No entry; any caller is admitted, with or without a token.
    Public,
    /// Roles allowed to call the method. May be empty, which admits nobody.
    Restricted(&'a HashSet<String>),
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("cannot read access policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid access policy: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read-only after construction; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    routes: HashMap<String, HashSet<String>>,
}

impl AccessPolicy {
    pub fn new<M, R, I>(routes: I) -> Self
    where
        M: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
        I: IntoIterator<Item = (M, R)>,
    {
        Self {
            routes: routes
                .into_iter()
                .map(|(method, roles)| (method.into(), roles.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    /// Parses `{"/pkg.Service/Method": ["role", ...], ...}`.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let routes: HashMap<String, Vec<String>> = serde_json::from_str(json)?;
        Ok(Self::new(routes))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn roles_for(&self, method: &str) -> Access<'_> {
        match self.routes.get(method) {
            Some(roles) => Access::Restricted(roles),
            None => Access::Public,
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATE: &str = "/pcbook.v1.LaptopService/CreateLaptop";
    const RATE: &str = "/pcbook.v1.LaptopService/RateLaptop";

    fn policy() -> AccessPolicy {
        AccessPolicy::new([(CREATE, vec!["admin"]), (RATE, vec!["admin", "user"])])
    }

    #[test]
    fn test_listed_method_is_restricted() {
        let policy = policy();
        match policy.roles_for(CREATE) {
            Access::Restricted(roles) => {
                assert!(roles.contains("admin"));
                assert!(!roles.contains("user"));
            }
            Access::Public => panic!("expected restricted"),
        }
    }

    #[test]
    fn test_unlisted_method_is_public() {
        assert_eq!(
            policy().roles_for("/pcbook.v1.LaptopService/SearchLaptop"),
            Access::Public
        );
    }

    #[test]
    fn test_matching_is_exact() {
        let policy = policy();
        assert_eq!(policy.roles_for("/pcbook.v1.LaptopService/"), Access::Public);
        assert_eq!(
            policy.roles_for("/pcbook.v1.LaptopService/createlaptop"),
            Access::Public
        );
        assert_eq!(
            policy.roles_for("pcbook.v1.LaptopService/CreateLaptop"),
            Access::Public
        );
    }

    #[test]
    fn test_from_json() {
        let policy = AccessPolicy::from_json(
            r#"{"/pcbook.v1.LaptopService/UploadImage": ["admin"], "/x.Y/Z": []}"#,
        )
        .unwrap();

        assert_eq!(policy.len(), 2);
        assert!(matches!(
            policy.roles_for("/pcbook.v1.LaptopService/UploadImage"),
            Access::Restricted(roles) if roles.contains("admin")
        ));
        assert!(matches!(
            policy.roles_for("/x.Y/Z"),
            Access::Restricted(roles) if roles.is_empty()
        ));
    }

    #[test]
    fn test_from_json_rejects_wrong_shape() {
        assert!(matches!(
            AccessPolicy::from_json(r#"{"/x.Y/Z": "admin"}"#),
            Err(PolicyError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            AccessPolicy::from_file("/definitely/not/here.json"),
            Err(PolicyError::Io(_))
        ));
    }
}
