//! Domain layer: value objects, entities, the room registry and the interfaces
//! (repository, message pusher) implemented by the infrastructure layer.

pub mod entity;
pub mod error;
pub mod pusher;
pub mod registry;
pub mod repository;
pub mod snapshot;
pub mod value_object;

pub use entity::{ChatMessage, Identity};
pub use error::{MessagePushError, RegistryError, RepositoryError, ValueObjectError};
pub use pusher::{BroadcastReport, MessagePusher, OutboundFrame, PusherChannel};
pub use registry::{CleanupClaim, Reservation, RoomRegistry};
pub use repository::ChatRepository;
pub use snapshot::{RoomOccupancy, ServerSnapshot};
pub use value_object::{ConnectionId, RoomName, Timestamp, Username};
