//! Request extractors.

pub mod auth;
pub mod path;
pub mod query;

pub use auth::MaybeCredentials;
pub use path::{BrowseView, RepoRoute};
pub use query::ServiceQuery;
