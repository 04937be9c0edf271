//! Small shared helpers.

pub mod periodic;
pub mod random_key;

pub use periodic::PeriodicTask;
pub use random_key::random_key;
