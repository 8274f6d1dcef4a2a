//! Kubernetes client for kubelog
//!
//! This crate bootstraps a cluster client, resolves the namespace the
//! gateway serves, and answers the single-shot queries: the container
//! directory and bounded (non-following) log tails.

mod client;

pub use client::{ClusterLogs, KubeClient, resolve_namespace};

// Re-export types that are used in our public API
pub use kubelog_types::{ContainerInfo, ContainerRef};
