//! Home Assistant collaborators: REST API client, websocket event
//! stream and notification dispatch.

pub mod api;
pub mod events;
pub mod notify;

pub use api::{EntityState, HaClient};
pub use events::StateChange;
pub use notify::{Dispatcher, NotifySink};
