//! Device synchronization module
//!
//! - `reconciler`: applies readings to the device registry
//! - `scheduler`: background poll loop and its lifecycle

pub mod reconciler;
pub mod scheduler;

pub use reconciler::DeviceReconciler;
pub use scheduler::{CycleKind, PollScheduler};
