//! Read-only Neo4j lookups for tenant organizations and workspaces.

pub mod client;
pub mod organizations;
pub mod workspaces;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use organizations::OrganizationReader;
pub use workspaces::WorkspaceReader;
