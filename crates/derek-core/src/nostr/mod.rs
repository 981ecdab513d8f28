pub mod connection;
pub mod error;
pub mod pool;
pub mod router;
pub mod signal;

pub use connection::{Connector, NostrConnector, RelayConnection};
pub use error::PoolError;
pub use pool::{PoolChange, PublishFailure, PublishReport, QueryOptions, RelayPool};
pub use router::{RelayRouter, RoutingParams};
pub use signal::{AbortController, AbortSignal};
