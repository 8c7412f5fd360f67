//! Standard listener implementations.

pub mod function;

pub use function::{FnListener, FnListenerBuilder};
