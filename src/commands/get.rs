use crate::commands::executable::{Context, Executable, Outcome};
use crate::commands::{CommandParser, ProtocolError};
use crate::frame::Frame;
use crate::Error;

/// Reply sent when `GET` targets a missing key.
pub const KEY_NOT_FOUND: &str = "key not found";

/// Get the value of `key`. If the key does not exist the literal `key not found` is returned.
#[derive(Debug, PartialEq)]
pub struct Get {
    pub key: String,
}

impl Executable for Get {
    fn exec(self, ctx: Context<'_>) -> Result<Outcome, Error> {
        let res = match ctx.store.get(&self.key) {
            Some(value) => Frame::Bulk(value),
            None => Frame::Simple(KEY_NOT_FOUND.to_string()),
        };

        Ok(Outcome::Reply(res))
    }
}

impl TryFrom<&mut CommandParser> for Get {
    type Error = ProtocolError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        parser.finish()?;

        Ok(Self { key })
    }
}
