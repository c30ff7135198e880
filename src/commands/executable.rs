use crate::connection::ClientId;
use crate::frame::Frame;
use crate::registry::Registry;
use crate::store::Store;
use crate::Error;

/// Everything a command may touch while it runs inside the dispatch loop.
pub struct Context<'a> {
    /// The connection that sent the command.
    pub client_id: ClientId,
    pub registry: &'a mut Registry,
    pub store: &'a Store,
}

/// What the dispatch loop does once a command ran.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Write the frame back to the sender.
    Reply(Frame),
    /// Unregister the sender and close its connection.
    Close,
}

pub trait Executable {
    fn exec(self, ctx: Context<'_>) -> Result<Outcome, Error>;
}
