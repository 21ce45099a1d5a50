pub mod broadcast;
pub mod model;
pub mod persistence;
pub mod portal;
pub mod projection;
pub mod store;

pub use broadcast::{Change, ChangeFeed, ChangeHub, Subscription};
pub use model::{Record, TableName, Tables};
pub use persistence::{Backend, FileBackend, MemoryBackend, PersistError, PersistenceAdapter};
pub use portal::{Portal, PortalError};
pub use store::Store;
