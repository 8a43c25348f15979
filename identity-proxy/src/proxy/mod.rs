pub mod rewrite;
pub mod transport;

pub use rewrite::ResponseRewriter;
pub use transport::{UpstreamClient, UpstreamResponse, ASSERTION_HEADER};
