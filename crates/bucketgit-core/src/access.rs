//! Access policy: who may do what on which repository.
//!
//! The policy is a plain table. It does not know about HTTP, passwords or
//! storage; the server verifies credentials against [`AccessPolicy::password_hash`]
//! and then asks [`AccessPolicy::authorize`] about an [`Endpoint`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A grantable capability. The wire names double as policy document values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// Fetch and clone.
    #[serde(rename = "git-upload-pack")]
    Fetch,
    /// Push.
    #[serde(rename = "git-receive-pack")]
    Push,
    /// Read-only browsing of trees, blobs and commits.
    #[serde(rename = "web")]
    Browse,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 3] = [Capability::Fetch, Capability::Push, Capability::Browse];

    /// Returns the policy/wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "git-upload-pack",
            Self::Push => "git-receive-pack",
            Self::Browse => "web",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::malformed("capability", format!("unknown capability '{s}'")))
    }
}

/// The authenticated request target, built once per request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub user: String,
    pub repo_path: String,
    pub capability: Capability,
}

impl Endpoint {
    pub fn new(user: impl Into<String>, repo_path: impl Into<String>, capability: Capability) -> Self {
        Self {
            user: user.into(),
            repo_path: repo_path.into(),
            capability,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.repo_path, self.capability)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    /// bcrypt hash of the user's password.
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    #[serde(default)]
    pub users: BTreeMap<String, Grant>,
}

/// The access table and user table, as stored in the policy document.
///
/// # Example
///
/// ```
/// use bucketgit_core::{AccessPolicy, Capability, Endpoint};
///
/// let policy = AccessPolicy::from_json(r#"{
///     "users": { "alice": { "passwordHash": "$2b$12$..." } },
///     "repos": { "team/app": { "users": {
///         "alice":  { "capabilities": ["git-upload-pack", "git-receive-pack"] },
///         "nobody": { "capabilities": ["web"] }
///     } } }
/// }"#).unwrap();
///
/// assert!(policy.authorize(&Endpoint::new("alice", "team/app", Capability::Push)));
/// assert!(!policy.authorize(&Endpoint::new("nobody", "team/app", Capability::Fetch)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    #[serde(default)]
    users: BTreeMap<String, UserEntry>,
    #[serde(default)]
    repos: BTreeMap<String, RepoEntry>,
}

impl AccessPolicy {
    /// Creates an empty policy that denies everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// The policy in force before any policy document exists: one
    /// administrative user holding every capability on the administrative repository.
    pub fn bootstrap(admin_repo: &str, admin_user: &str, password_hash: impl Into<String>) -> Self {
        let mut policy = Self::new();
        policy.add_user(admin_user, password_hash);
        policy.grant(admin_repo, admin_user, Capability::ALL);
        policy
    }

    /// Decodes a policy document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::malformed("policy document", e.to_string()))
    }

    /// Encodes the policy document.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::malformed("policy document", e.to_string()))
    }

    pub fn add_user(&mut self, name: &str, password_hash: impl Into<String>) {
        self.users.insert(
            name.to_string(),
            UserEntry {
                password_hash: password_hash.into(),
            },
        );
    }

    /// Adds capabilities for a user on a repository.
    pub fn grant(&mut self, repo: &str, user: &str, capabilities: impl IntoIterator<Item = Capability>) {
        self.repos
            .entry(repo.to_string())
            .or_default()
            .users
            .entry(user.to_string())
            .or_default()
            .capabilities
            .extend(capabilities);
    }

    /// Returns the stored password hash of a user.
    pub fn password_hash(&self, user: &str) -> Option<&str> {
        self.users.get(user).map(|u| u.password_hash.as_str())
    }

    /// Allow iff the repository lists the user and the user's set contains the capability.
    pub fn authorize(&self, endpoint: &Endpoint) -> bool {
        self.capabilities(&endpoint.repo_path, &endpoint.user)
            .is_some_and(|caps| caps.contains(&endpoint.capability))
    }

    /// Returns the capabilities granted to `user` on `repo`, if listed.
    pub fn capabilities(&self, repo: &str, user: &str) -> Option<&BTreeSet<Capability>> {
        self.repos
            .get(repo)?
            .users
            .get(user)
            .map(|grant| &grant.capabilities)
    }

    /// Repositories on which `user` holds `capability`, sorted by path.
    pub fn repos_granting(&self, user: &str, capability: Capability) -> Vec<&str> {
        self.repos
            .iter()
            .filter(|(_, entry)| {
                entry
                    .users
                    .get(user)
                    .is_some_and(|g| g.capabilities.contains(&capability))
            })
            .map(|(path, _)| path.as_str())
            .collect()
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    pub fn repos(&self) -> impl Iterator<Item = &str> {
        self.repos.keys().map(String::as_str)
    }
}
