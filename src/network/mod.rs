pub use crate::network::client::{Debounce, SendOutcome, TransportError, UdpClient};
pub use crate::network::codec::{decode, encode, Datagram, DecodeError};
pub use crate::network::server::UdpServer;

pub mod client;
pub mod codec;
pub mod server;
