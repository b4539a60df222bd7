//! Adapters to external academic databases: rate-limited, cached, retrying
//! connectors that normalize upstream records into [`forge_core::Paper`].

mod bucket;
mod connector;
mod http;
mod mock;

pub use bucket::SourceRateLimiter;
pub use connector::{with_retry, HealthStatus, SearchFilters, SourceConnector};
pub use http::HttpSourceConnector;
pub use mock::MockSourceConnector;
