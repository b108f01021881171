//! Configuration module

mod site;

pub use site::{ContentSourceKind, SiteConfig};
pub use site::{ENV_BASE_URL, ENV_PORT};
