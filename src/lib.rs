//! Multi-tenant service registry.
//!
//! Each namespace owns a catalog of service instances held under TTL
//! leases. Catalogs on different members are kept eventually consistent by
//! streaming mutations to every peer over server-sent events, with a full
//! state sync when a member starts and read-repair when a renew reaches a
//! member that never saw the instance.
mod cluster;
mod config;
mod errors;
mod metrics;
mod namespace;
mod replication;
mod store;
pub(crate) mod utils;

pub use cluster::*;
pub use config::*;
pub use errors::*;
pub use metrics::*;
pub use namespace::*;
pub use replication::*;
pub use store::*;
