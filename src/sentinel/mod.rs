pub mod connection;
pub mod info;
pub mod resolver;
pub mod resp;
pub mod types;

pub use connection::{SentinelConnection, SentinelDialer};
pub use info::parse_info;
pub use resolver::{ConnectionResolver, Dialer, RedisUrl};
pub use types::{Master, SentinelInfo};
