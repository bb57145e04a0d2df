//! Request path classification.
//!
//! Repository paths may contain slashes, so routes are matched on a single
//! wildcard and split here.

use bucketgit_core::Capability;
use bucketgit_protocol::Service;

use crate::error::AppError;

const INFO_REFS: &str = "info/refs";
const BLOB: &str = "blob";
const COMMIT: &str = "commit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseView {
    /// Tree listing or raw blob at a path of the HEAD commit; empty is the root.
    Tree(String),
    /// Summary of the HEAD commit.
    Commit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoRoute {
    /// `GET /{repo}/info/refs?service=...`
    Advertise { repo: String, service: Service },
    /// `POST /{repo}/{service}`
    Rpc { repo: String, service: Service },
    /// `GET /{repo}`, `GET /{repo}/blob/{path}`, `GET /{repo}/commit/{any}`
    Browse { repo: String, view: BrowseView },
}

impl RepoRoute {
    pub fn for_get(path: &str, service: Option<&str>) -> Result<Self, AppError> {
        let path = path.trim_matches('/');

        if path == INFO_REFS || path.ends_with(&format!("/{INFO_REFS}")) {
            let repo = &path[..path.len() - INFO_REFS.len()];
            let service = service
                .ok_or_else(|| AppError::BadRequest("dumb HTTP protocol is not supported".to_string()))?
                .parse::<Service>()?;
            return Ok(Self::Advertise {
                repo: repo_path(repo)?,
                service,
            });
        }

        let segments: Vec<&str> = path.split('/').collect();
        let marker = segments
            .iter()
            .skip(1)
            .position(|s| *s == BLOB || *s == COMMIT)
            .map(|i| i + 1);

        let (repo, view) = match marker {
            Some(i) if segments[i] == BLOB => {
                (segments[..i].join("/"), BrowseView::Tree(segments[i + 1..].join("/")))
            },
            Some(i) => (segments[..i].join("/"), BrowseView::Commit),
            None => (path.to_string(), BrowseView::Tree(String::new())),
        };
        Ok(Self::Browse {
            repo: repo_path(&repo)?,
            view,
        })
    }

    pub fn for_post(path: &str) -> Result<Self, AppError> {
        let path = path.trim_matches('/');
        let (repo, last) = path
            .rsplit_once('/')
            .ok_or_else(|| AppError::NotFound(format!("no such endpoint: /{path}")))?;
        let service = last
            .parse::<Service>()
            .map_err(|_| AppError::NotFound(format!("no such endpoint: /{path}")))?;
        Ok(Self::Rpc {
            repo: repo_path(repo)?,
            service,
        })
    }

    pub fn repo(&self) -> &str {
        match self {
            Self::Advertise { repo, .. } | Self::Rpc { repo, .. } | Self::Browse { repo, .. } => repo,
        }
    }

    /// The capability the request needs.
    pub fn capability(&self) -> Capability {
        match self {
            Self::Advertise { service, .. } | Self::Rpc { service, .. } => service.capability(),
            Self::Browse { .. } => Capability::Browse,
        }
    }
}

fn repo_path(raw: &str) -> Result<String, AppError> {
    let repo = raw.trim_matches('/');
    if repo.is_empty() {
        return Err(AppError::BadRequest("repository path cannot be empty".to_string()));
    }
    Ok(repo.to_string())
}
