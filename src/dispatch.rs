//! The dispatch loop: the single task that owns the connection registry, runs every command and
//! writes every reply.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::commands::executable::{Context, Executable, Outcome};
use crate::commands::{Command, ProtocolError};
use crate::connection::{ClientId, Connection};
use crate::frame::Frame;
use crate::registry::Registry;
use crate::store::Store;
use crate::Error;

/// Room for one in-flight item per channel. Connection tasks wait on a full channel, which is the
/// backpressure keeping a fast client from running ahead of the dispatch loop.
const CHANNEL_CAPACITY: usize = 1;

/// A decoded request, or the reason it could not be decoded, from one connection.
#[derive(Debug)]
pub struct Message {
    pub client_id: ClientId,
    pub command: Result<Command, ProtocolError>,
}

/// A freshly accepted connection asking to be registered. The answer tells the connection task
/// whether it may start reading.
#[derive(Debug)]
pub struct Admission {
    pub connection: Connection,
    pub admitted: oneshot::Sender<bool>,
}

/// The sending side of the dispatch loop channels, cloned into every connection task.
#[derive(Debug, Clone)]
pub struct Handle {
    messages: mpsc::Sender<Message>,
    admissions: mpsc::Sender<Admission>,
    removals: mpsc::Sender<ClientId>,
}

impl Handle {
    pub fn messages(&self) -> mpsc::Sender<Message> {
        self.messages.clone()
    }

    pub fn removals(&self) -> mpsc::Sender<ClientId> {
        self.removals.clone()
    }

    /// Hands the connection over and waits for the admission decision.
    pub async fn admit(&self, connection: Connection) -> Result<bool, Error> {
        let (admitted, decision) = oneshot::channel();

        self.admissions
            .send(Admission {
                connection,
                admitted,
            })
            .await
            .map_err(|_| "dispatch loop is gone")?;

        Ok(decision.await.map_err(|_| "dispatch loop dropped the admission")?)
    }
}

pub struct Dispatcher {
    max_connections: usize,
    registry: Registry,
    store: Store,
    messages: mpsc::Receiver<Message>,
    admissions: mpsc::Receiver<Admission>,
    removals: mpsc::Receiver<ClientId>,
}

impl Dispatcher {
    pub fn new(max_connections: usize, store: Store) -> (Dispatcher, Handle) {
        let (messages_tx, messages) = mpsc::channel(CHANNEL_CAPACITY);
        let (admissions_tx, admissions) = mpsc::channel(CHANNEL_CAPACITY);
        let (removals_tx, removals) = mpsc::channel(CHANNEL_CAPACITY);

        let dispatcher = Dispatcher {
            max_connections,
            registry: Registry::default(),
            store,
            messages,
            admissions,
            removals,
        };
        let handle = Handle {
            messages: messages_tx,
            admissions: admissions_tx,
            removals: removals_tx,
        };

        (dispatcher, handle)
    }

    /// Runs until every [`Handle`] is dropped. The three sources are polled in random order on
    /// each iteration, so none of them starves the others.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(message) = self.messages.recv() => self.process(message).await,
                Some(admission) = self.admissions.recv() => self.admit(admission).await,
                Some(client_id) = self.removals.recv() => self.remove(client_id).await,
                else => break,
            }
        }

        debug!("dispatch loop stopped");
    }

    async fn process(&mut self, message: Message) {
        if let Err(err) = self.handle_message(message).await {
            error!("command process error: {}", err);
        }
    }

    async fn handle_message(&mut self, message: Message) -> Result<(), Error> {
        let Message { client_id, command } = message;

        if !self.registry.contains(&client_id) {
            warn!(%client_id, "dropping command from an unregistered connection");
            return Ok(());
        }

        let outcome = match command {
            Ok(command) => {
                debug!(%client_id, command = command.name(), "processing command");

                let ctx = Context {
                    client_id,
                    registry: &mut self.registry,
                    store: &self.store,
                };
                command
                    .exec(ctx)
                    .unwrap_or_else(|err| Outcome::Reply(Frame::Error(format!("ERR {err}"))))
            }
            Err(err) => {
                debug!(%client_id, "protocol error: {}", err);
                Outcome::Reply(Frame::Error(format!("ERR {err}")))
            }
        };

        match outcome {
            Outcome::Reply(frame) => {
                if let Some(connection) = self.registry.get_mut(&client_id) {
                    connection
                        .write_frame(&frame)
                        .await
                        .map_err(|err| format!("client reply error: {err}"))?;
                }
            }
            Outcome::Close => {
                if let Some(mut connection) = self.registry.remove(&client_id) {
                    connection.close().await;
                    info!(
                        %client_id,
                        client_address = %connection.client_address(),
                        "connection quit"
                    );
                }
            }
        }

        Ok(())
    }

    async fn admit(&mut self, admission: Admission) {
        let Admission {
            mut connection,
            admitted,
        } = admission;

        if self.registry.len() >= self.max_connections {
            info!(
                max_connections = self.max_connections,
                client_address = %connection.client_address(),
                "maximum connections reached, rejecting connection"
            );

            let notice = Frame::Error(format!(
                "ERR maximum connections {} reached; cannot accept new connections",
                self.max_connections
            ));
            if let Err(err) = connection.write_frame(&notice).await {
                debug!("failed to notify rejected connection: {}", err);
            }
            connection.close().await;

            if admitted.send(false).is_err() {
                debug!("rejected connection task is already gone");
            }
            return;
        }

        let client_id = connection.id();
        let client_address = connection.client_address();
        self.registry.insert(connection);

        if admitted.send(true).is_err() {
            // Nobody will ever read from this connection.
            warn!(%client_id, "connection task is gone, dropping connection");
            if let Some(mut connection) = self.registry.remove(&client_id) {
                connection.close().await;
            }
            return;
        }

        info!(%client_id, %client_address, "new connection added");
    }

    async fn remove(&mut self, client_id: ClientId) {
        // The connection queued its last commands before signaling removal, apply them first.
        while let Ok(message) = self.messages.try_recv() {
            self.process(message).await;
        }

        if let Some(mut connection) = self.registry.remove(&client_id) {
            connection.close().await;
            info!(
                %client_id,
                client_address = %connection.client_address(),
                "connection removed"
            );
        }
    }
}
