// Daemon: socket protocol, live board subscriptions, request routing and lifecycle

pub mod client;
pub mod config;
pub mod connection;
pub mod pid_lock;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;

pub use client::DaemonClient;
pub use config::{Config, Settings};
pub use registry::SubscriberRegistry;
pub use router::Router;
pub use server::{Collaborators, DaemonServer};
