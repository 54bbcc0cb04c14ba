//! Notification descriptors, the platform boundary and the scheduler.

mod descriptor;
mod memory;
mod platform;
mod scheduler;

pub use descriptor::*;
pub use memory::*;
pub use platform::*;
pub use scheduler::*;
