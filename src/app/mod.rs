pub mod context;
pub mod error;

pub use context::{AppContext, ItemListing};
pub use error::{CatalogError, Result};
