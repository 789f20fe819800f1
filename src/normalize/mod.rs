//! Response normalization: raw backend payloads in, typed records out.
//!
//! Data flows strictly forward: envelope unwrapping, then classification and
//! URL resolution, then success inference. Every stage is a pure function.

pub mod envelope;
pub mod fields;
pub mod normalizer;
pub mod types;
pub mod urls;

pub use envelope::*;
pub use fields::extract_classifications;
pub use normalizer::*;
pub use types::*;
pub use urls::{to_relative, UrlResolver};
