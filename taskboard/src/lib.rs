// Task-board daemon library
// Shared by the daemon binary, the `tb` client and the integration tests

pub mod automation;
pub mod daemon;
pub mod domain;
pub mod external;
pub mod sessions;
pub mod store;
pub mod time_tracking;
pub mod usecase;
pub mod worker;

#[cfg(test)]
pub mod test_utils;
