//! Standard interceptor implementations.

#[cfg(feature = "tracing")]
pub mod logging;
#[cfg(feature = "timeout")]
pub mod timeout;

#[cfg(feature = "tracing")]
pub use logging::{LoggingInterceptor, TracingInterceptor};
#[cfg(feature = "timeout")]
pub use timeout::{TimeoutError, TimeoutInterceptor};
