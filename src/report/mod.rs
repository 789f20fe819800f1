//! Report generation: query payload derivation and the report backend call.

pub mod generator;
pub mod payload;

pub use generator::*;
pub use payload::*;
