pub mod consumer;
pub mod errors;
pub mod producer;
pub mod resolver;

pub use consumer::*;
pub use errors::*;
pub use producer::*;
pub use resolver::*;
