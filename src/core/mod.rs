pub mod collections;
pub mod task;
pub mod timestamp;
