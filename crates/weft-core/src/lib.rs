pub mod error;
pub mod traits;
pub mod types;

pub use error::{Result, WeftError};
pub use traits::{Memory, Tool};
pub use types::*;
