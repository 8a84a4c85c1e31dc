pub mod error;
pub mod stats;
pub mod store;
pub mod traits;
pub mod types;

pub use error::*;
pub use store::*;
pub use traits::*;
pub use types::*;
