//! Protocol module containing message types and the line codec.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_client, decode_server, encode_client, encode_server, parse_move, parse_square,
    ProtocolError,
};
pub use messages::*;
