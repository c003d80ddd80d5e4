pub mod close;
pub mod connection;
pub mod data_channel;
pub mod events;
pub mod state;
pub mod types;

pub use close::CloseSignal;
pub use data_channel::Opening;
pub use events::{EventBus, EventHandler};
pub use types::{DataPayload, Epoch, PeerId};
