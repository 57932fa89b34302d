pub mod actor;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod store;

pub use actor::{Mailbox, RoomActor, RoomEvent};
pub use broadcast::Fabric;
pub use config::Args;
pub use registry::Registry;
pub use store::Store;
