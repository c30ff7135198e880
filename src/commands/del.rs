use tracing::debug;

use crate::commands::executable::{Context, Executable, Outcome};
use crate::commands::{CommandParser, ProtocolError};
use crate::frame::Frame;
use crate::Error;

/// Removes the specified keys. A key is ignored if it does not exist.
#[derive(Debug, PartialEq)]
pub struct Del {
    pub keys: Vec<String>,
}

impl Executable for Del {
    fn exec(self, ctx: Context<'_>) -> Result<Outcome, Error> {
        let removed = ctx.store.del(&self.keys);
        debug!(removed, requested = self.keys.len(), "deleted keys");

        Ok(Outcome::Reply(Frame::Simple("OK".to_string())))
    }
}

impl TryFrom<&mut CommandParser> for Del {
    type Error = ProtocolError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        // At least one key is required, every remaining argument is a key.
        let mut keys = vec![parser.next_string()?];
        while parser.remaining() > 0 {
            keys.push(parser.next_string()?);
        }

        Ok(Self { keys })
    }
}
