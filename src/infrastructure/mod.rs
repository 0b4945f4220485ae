pub mod protocol;
pub mod persistence;
pub mod server;

pub use protocol::*;
pub use persistence::*;
pub use server::*;
