pub mod metadata;
pub mod models;
pub mod status;

pub use metadata::*;
pub use models::*;
pub use status::*;
