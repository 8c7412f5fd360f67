//! Priority constants shared by listeners, filters and interceptors.
//!
//! Lower values run first. Equal priorities keep registration order.

/// Named priority levels.
pub struct Priority;

impl Priority {
    /// Runs before everything else.
    pub const HIGHEST: i32 = i32::MIN;
    /// Runs early.
    pub const HIGH: i32 = -1000;
    /// Default for filters and interceptors.
    pub const NORMAL: i32 = 0;
    /// Runs late.
    pub const LOW: i32 = 1000;
    /// Runs after everything else; the default listener priority.
    pub const LOWEST: i32 = i32::MAX;
}
