pub mod contracts;
pub mod registry;
pub mod snapshot;
pub mod source;

pub use source::ChainSource;
