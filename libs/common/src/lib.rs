pub mod id;
pub mod protocol;
pub mod room;
pub mod snowflake;

pub use id::ConnectionId;
pub use protocol::{ClientMessage, DecodeError, EventName, ServerEvent};
pub use room::{Location, RoomKey};
pub use snowflake::SnowflakeGenerator;
