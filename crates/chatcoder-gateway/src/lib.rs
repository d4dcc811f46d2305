pub mod connection;
pub mod dispatcher;
pub mod presence;

pub use dispatcher::{Broadcast, DispatchError, Dispatcher};
pub use presence::Presence;
