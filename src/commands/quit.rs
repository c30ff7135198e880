use crate::commands::executable::{Context, Executable, Outcome};
use crate::commands::{CommandParser, ProtocolError};
use crate::Error;

/// Ask the server to close the connection. The closing notice sent by the connection is the
/// only reply.
#[derive(Debug, PartialEq)]
pub struct Quit {}

impl Executable for Quit {
    fn exec(self, _ctx: Context<'_>) -> Result<Outcome, Error> {
        Ok(Outcome::Close)
    }
}

impl TryFrom<&mut CommandParser> for Quit {
    type Error = ProtocolError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.finish()?;
        Ok(Self {})
    }
}
