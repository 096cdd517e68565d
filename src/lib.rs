//! IP address allocation engine.
//!
//! Tracks subnets, the allocation state of individual addresses inside them
//! and the hosts that own those addresses.
//!
//! - [`registry`] - subnet definitions, containment and capacity
//! - [`allocator`] - next free address, assign, release
//! - [`hosts`] - host records; deleting one releases its addresses
//! - [`ranges`] - purpose-tagged ranges inside subnets
//! - [`audit`] - append-only audit trail
//! - [`history`] - per-address assignment history
//! - [`conflicts`] - consistency checks over stored records
//! - [`store`] - the JSON backed store every operation runs against
//!
//! ```no_run
//! use ipam_engine::{AddressAllocator, AssignRequest, Database, HostRegistry, NewHost};
//! use ipam_engine::{SubnetMetadata, SubnetRegistry};
//!
//! let db = Database::open("ipam.json")?;
//! let subnet = SubnetRegistry::default()
//!     .create(&db, "10.0.0.0", 24, SubnetMetadata::default())?
//!     .value;
//! let host = HostRegistry::default().create(&db, NewHost::named("web-01"))?.value;
//! let allocator = AddressAllocator::default();
//! if let Some(ip) = allocator.next_available(&db, &subnet)? {
//!     allocator.assign(&db, AssignRequest::new(&ip.to_string(), &host))?;
//! }
//! # Ok::<(), ipam_engine::Error>(())
//! ```

pub mod allocator;
pub mod audit;
pub mod cli;
pub mod config;
pub mod conflicts;
pub mod error;
pub mod history;
pub mod hosts;
pub mod models;
pub mod output;
pub mod ranges;
pub mod registry;
pub mod response;
pub mod store;

pub use allocator::{AddressAllocator, AssignRequest};
pub use audit::{AuditRecorder, AuditSink, AuditStatus, Recorded, StoreSink};
pub use config::Config;
pub use conflicts::{Conflict, ConflictDetector, ConflictKind, Severity};
pub use error::{Error, Result};
pub use history::IpHistory;
pub use hosts::{HostFilter, HostRegistry, HostSort, HostView};
pub use models::{
    Address, AddressStats, AddressStatus, AddressUpdate, AuditAction, AuditEntry, CapacityPolicy,
    Cidr, EntityType, Host, HostUpdate, IpRange, NewHost, NewRange, RangeUpdate, Subnet,
    SubnetMetadata, SubnetUpdate,
};
pub use ranges::{RangeRegistry, RangeUsage};
pub use registry::{SubnetRegistry, SubnetUsage};
pub use response::MutationResponse;
pub use store::Database;
