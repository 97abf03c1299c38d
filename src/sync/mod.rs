pub mod client;
pub mod debounce;
pub mod synchronizer;

pub use client::{HttpTaskClient, Mutation, TaskRemote};
pub use debounce::ParseDebouncer;
pub use synchronizer::{Notice, Synchronizer};
