pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod github;
pub mod models;
pub mod pipeline;
pub mod scheduler;

pub use config::{Profile, RawConfig};
pub use error::{Error, Result};
pub use github::{FeatureSource, GitHubClient};
pub use pipeline::Pipeline;
