//! Domain models for the medkit system.

mod medicine;
mod reminder;

pub use medicine::*;
pub use reminder::*;
