pub mod identity;

pub use identity::{identify, identity_middleware, Identity, IdentitySource};
