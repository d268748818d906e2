pub mod http;
pub mod list_store;
pub mod memory;
pub mod traits;

pub use http::*;
pub use list_store::*;
pub use memory::*;
pub use traits::*;
