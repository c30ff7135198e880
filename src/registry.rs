use std::collections::HashMap;

use crate::connection::{ClientId, Connection};

/// The live, admitted connections. Owned by the dispatch loop, nothing else mutates it.
#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ClientId, Connection>,
}

impl Registry {
    pub fn insert(&mut self, connection: Connection) -> Option<Connection> {
        self.connections.insert(connection.id(), connection)
    }

    pub fn remove(&mut self, id: &ClientId) -> Option<Connection> {
        self.connections.remove(id)
    }

    pub fn get(&self, id: &ClientId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn get_mut(&mut self, id: &ClientId) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.connections.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.connections.len()
    }

    /// Names of every registered connection, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connections.values().map(Connection::name)
    }
}
