// Shared by the integration test binaries; each uses a subset
#![allow(dead_code)]

pub mod daemon_guard;
pub mod polling;
