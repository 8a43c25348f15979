//! Services layer for the identity proxy.
//!
//! Entity storage, role resolution, claims signing and the session table.

pub mod claims;
pub mod error;
pub mod jwt;
pub mod metrics;
pub mod resolver;
pub mod seed;
pub mod service_index;
pub mod sessions;
pub mod store;

pub use claims::{ClaimDocument, ClaimsService};
pub use error::ServiceError;
pub use jwt::{JwtService, Signed};
pub use service_index::ServiceIndexClient;
pub use sessions::{Session, SessionStore};
pub use store::{Store, Tables};
