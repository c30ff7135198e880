use bytes::Bytes;
use itertools::Itertools;

use crate::commands::executable::{Context, Executable, Outcome};
use crate::commands::{CommandParser, ProtocolError};
use crate::frame::Frame;
use crate::Error;

/// Returns every key in the store joined by commas, in no particular order.
#[derive(Debug, PartialEq)]
pub struct Keys {}

impl Executable for Keys {
    fn exec(self, ctx: Context<'_>) -> Result<Outcome, Error> {
        let keys = ctx.store.keys().iter().join(",");

        Ok(Outcome::Reply(Frame::Bulk(Bytes::from(keys))))
    }
}

impl TryFrom<&mut CommandParser> for Keys {
    type Error = ProtocolError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.finish()?;
        Ok(Self {})
    }
}
