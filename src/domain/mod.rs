pub mod entities;
pub mod errors;
pub mod store;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use store::*;
pub use value_objects::*;
