pub mod endpoint;
pub mod engine;
pub mod error;
pub mod response;

pub use endpoint::*;
pub use engine::{DumpCategory, dump, load};
pub use error::{Error, Result};
pub use response::*;
