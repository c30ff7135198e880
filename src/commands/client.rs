use bytes::Bytes;
use itertools::Itertools;

use crate::commands::executable::{Context, Executable, Outcome};
use crate::commands::{CommandParser, ProtocolError};
use crate::frame::Frame;
use crate::Error;

/// `CLIENT LIST`: names of every registered connection joined by `|`.
#[derive(Debug, PartialEq)]
pub struct ClientList {}

impl Executable for ClientList {
    fn exec(self, ctx: Context<'_>) -> Result<Outcome, Error> {
        let names = ctx.registry.names().join("|");

        Ok(Outcome::Reply(Frame::Bulk(Bytes::from(names))))
    }
}

impl TryFrom<&mut CommandParser> for ClientList {
    type Error = ProtocolError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.finish()?;
        Ok(Self {})
    }
}

/// `CLIENT GETNAME`: the name of the connection sending the command.
#[derive(Debug, PartialEq)]
pub struct ClientGetName {}

impl Executable for ClientGetName {
    fn exec(self, ctx: Context<'_>) -> Result<Outcome, Error> {
        let connection = ctx
            .registry
            .get(&ctx.client_id)
            .ok_or_else(|| format!("client {} is not registered", ctx.client_id))?;

        let name = Bytes::copy_from_slice(connection.name().as_bytes());
        Ok(Outcome::Reply(Frame::Bulk(name)))
    }
}

impl TryFrom<&mut CommandParser> for ClientGetName {
    type Error = ProtocolError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.finish()?;
        Ok(Self {})
    }
}

/// `CLIENT SETNAME name`: renames the connection sending the command.
#[derive(Debug, PartialEq)]
pub struct ClientSetName {
    pub name: String,
}

impl Executable for ClientSetName {
    fn exec(self, ctx: Context<'_>) -> Result<Outcome, Error> {
        let connection = ctx
            .registry
            .get_mut(&ctx.client_id)
            .ok_or_else(|| format!("client {} is not registered", ctx.client_id))?;

        connection.set_name(self.name);
        Ok(Outcome::Reply(Frame::Simple("OK".to_string())))
    }
}

impl TryFrom<&mut CommandParser> for ClientSetName {
    type Error = ProtocolError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let name = parser.next_string()?;
        parser.finish()?;

        Ok(Self { name })
    }
}
