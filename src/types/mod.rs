mod context;
mod models;
mod query;

pub use context::*;
pub use models::*;
pub use query::*;

pub use crate::registry::{DEFAULT_TAG, Locator, ProjectKey};
