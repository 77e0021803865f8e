pub mod memory;

pub use memory::{ContextStore, UserLease};
