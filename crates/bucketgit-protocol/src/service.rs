//! The two smart-HTTP services.

use std::fmt;
use std::str::FromStr;

use bucketgit_core::{Capability, Error};

/// Identifies this server to clients in the `agent=` capability.
pub fn agent() -> String {
    format!("agent=bucketgit/{}", crate::version())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    UploadPack,
    ReceivePack,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UploadPack => "git-upload-pack",
            Self::ReceivePack => "git-receive-pack",
        }
    }

    /// The access capability a caller needs to use this service.
    pub fn capability(&self) -> Capability {
        match self {
            Self::UploadPack => Capability::Fetch,
            Self::ReceivePack => Capability::Push,
        }
    }

    pub fn advertisement_content_type(&self) -> String {
        format!("application/x-{}-advertisement", self.name())
    }

    pub fn result_content_type(&self) -> String {
        format!("application/x-{}-result", self.name())
    }

    /// Server capabilities, without `symref`.
    pub fn capabilities(&self) -> Vec<String> {
        let fixed: &[&str] = match self {
            Self::UploadPack => &["side-band-64k", "side-band", "no-progress"],
            Self::ReceivePack => &["report-status", "delete-refs", "side-band-64k", "quiet", "ofs-delta"],
        };
        fixed
            .iter()
            .map(|c| c.to_string())
            .chain(std::iter::once(agent()))
            .collect()
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Service {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git-upload-pack" => Ok(Self::UploadPack),
            "git-receive-pack" => Ok(Self::ReceivePack),
            other => Err(Error::malformed("service", format!("unknown service '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_capabilities() {
        assert_eq!("git-upload-pack".parse::<Service>().unwrap(), Service::UploadPack);
        assert_eq!(Service::ReceivePack.capability(), Capability::Push);
        assert_eq!(Service::UploadPack.capability().as_str(), Service::UploadPack.name());
        assert_eq!(
            Service::ReceivePack.result_content_type(),
            "application/x-git-receive-pack-result"
        );
        assert!("git-archive".parse::<Service>().unwrap_err().is_malformed());
    }

    #[test]
    fn test_capability_lists() {
        let caps = Service::ReceivePack.capabilities();
        assert!(caps.iter().any(|c| c == "report-status"));
        assert!(caps.last().unwrap().starts_with("agent=bucketgit/"));
        assert!(!Service::UploadPack.capabilities().iter().any(|c| c == "report-status"));
    }
}
