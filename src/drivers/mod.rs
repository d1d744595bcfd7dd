//! Platform helpers shared by the binary.

pub mod task_pin;
