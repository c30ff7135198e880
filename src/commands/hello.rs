use bytes::Bytes;

use crate::commands::executable::{Context, Executable, Outcome};
use crate::commands::{CommandParser, ProtocolError};
use crate::frame::Frame;
use crate::Error;

const SERVER: &str = "redis";
const VERSION: &str = "3.0.0";
const PROTO: &str = "3";

/// Handshake. Replies with a map describing the server. Arguments, such as the protocol version
/// most clients send, are accepted and ignored.
#[derive(Debug, PartialEq)]
pub struct Hello {}

impl Executable for Hello {
    fn exec(self, _ctx: Context<'_>) -> Result<Outcome, Error> {
        let entries = [("server", SERVER), ("version", VERSION), ("proto", PROTO)]
            .into_iter()
            .map(|(key, value)| {
                (
                    Frame::Bulk(Bytes::from_static(key.as_bytes())),
                    Frame::Bulk(Bytes::from_static(value.as_bytes())),
                )
            })
            .collect();

        Ok(Outcome::Reply(Frame::Map(entries)))
    }
}

impl TryFrom<&mut CommandParser> for Hello {
    type Error = ProtocolError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        while parser.remaining() > 0 {
            parser.next_bytes()?;
        }
        Ok(Self {})
    }
}
