//! Client side of the Healzy API: session handling, persisted storage and
//! device-local study data.

pub mod api;
pub mod guard;
pub mod local;
pub mod session;
pub mod store;

pub use api::{ApiClient, ClientError};
pub use guard::{redirect_for, RouteGroup};
pub use local::LocalData;
pub use session::{Session, SessionManager, SessionState};
pub use store::{FileStore, KeyValueStore, MemoryStore};
