//! # d20 State
//!
//! The data half of the d20 object runtime: everything that can be named,
//! serialized or configured without knowing how dispatch works.
//! This crate holds no behavior and never calls back into the runtime.

pub mod bundle;
pub mod config;
pub mod dice;
pub mod error;
pub mod ids;
pub mod stateful;
pub mod value;

pub use bundle::*;
pub use config::*;
pub use dice::*;
pub use error::*;
pub use ids::*;
pub use stateful::*;
pub use value::Value;
