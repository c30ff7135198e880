use std::net::SocketAddr;
use tokio::net::{lookup_host, TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::codec::FrameCodec;
use crate::config::Config;
use crate::connection;
use crate::dispatch::{Dispatcher, Handle};
use crate::store::Store;
use crate::Error;

/// A bound listener that has not started accepting yet.
pub struct Server {
    config: Config,
    listener: TcpListener,
}

impl Server {
    /// Binds the first resolved address of the configured host that matches the protocol family.
    pub async fn bind(config: Config) -> Result<Server, Error> {
        let protocol = config.protocol;
        let addrs: Vec<SocketAddr> = lookup_host((config.host.as_str(), config.port))
            .await?
            .filter(|addr| protocol.accepts(addr))
            .collect();

        let mut last_err = None;
        for addr in addrs {
            match TcpListener::bind(addr).await {
                Ok(listener) => return Ok(Server { config, listener }),
                Err(err) => {
                    warn!(%addr, "failed to bind: {}", err);
                    last_err = Some(err);
                }
            }
        }

        Err(match last_err {
            Some(err) => err.into(),
            None => format!(
                "no {} address found for host {}",
                protocol, config.host
            )
            .into(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever. Failing to accept one connection does not stop the server.
    pub async fn run(self) -> Result<(), Error> {
        let Server { config, listener } = self;

        let (dispatcher, handle) = Dispatcher::new(config.max_connections, Store::new());
        tokio::spawn(dispatcher.run());

        let codec = FrameCodec::new(config.max_frame_size);

        info!(
            protocol = %config.protocol,
            max_connections = config.max_connections,
            "mockredis listening on {}",
            listener.local_addr()?
        );

        loop {
            let (socket, client_address) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    error!("failed to accept connection: {}", err);
                    continue;
                }
            };
            debug!(%client_address, "accepted connection");

            let handle = handle.clone();
            tokio::spawn(async move {
                if let Err(err) = handle_connection(socket, client_address, codec, handle).await {
                    error!(%client_address, "connection error: {}", err);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    codec: FrameCodec,
    handle: Handle,
) -> Result<(), Error> {
    let (connection, reader) = connection::split(
        stream,
        client_address,
        codec,
        handle.messages(),
        handle.removals(),
    );

    // Reading only starts once the dispatch loop knows the connection.
    if handle.admit(connection).await? {
        reader.read_loop().await;
    }

    Ok(())
}

pub async fn run(config: Config) -> Result<(), Error> {
    Server::bind(config).await?.run().await
}
