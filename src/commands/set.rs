use bytes::Bytes;

use crate::commands::executable::{Context, Executable, Outcome};
use crate::commands::{CommandParser, ProtocolError};
use crate::frame::Frame;
use crate::Error;

/// Set `key` to hold `value`, overwriting whatever was stored before.
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: String,
    pub value: Bytes,
}

impl Executable for Set {
    fn exec(self, ctx: Context<'_>) -> Result<Outcome, Error> {
        ctx.store.set(self.key, self.value);

        Ok(Outcome::Reply(Frame::Simple("OK".to_string())))
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = ProtocolError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let value = parser.next_bytes()?;
        parser.finish()?;

        Ok(Self { key, value })
    }
}
