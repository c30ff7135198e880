pub mod client;
pub mod del;
pub mod executable;
pub mod get;
pub mod hello;
pub mod keys;
pub mod quit;
pub mod set;

use bytes::Bytes;
use std::{str, vec};
use strum_macros::{AsRefStr, EnumCount};
use thiserror::Error as ThisError;

use crate::commands::executable::{Context, Executable, Outcome};
use crate::frame::{self, Frame};
use crate::Error;

use client::{ClientGetName, ClientList, ClientSetName};
use del::Del;
use get::Get;
use hello::Hello;
use keys::Keys;
use quit::Quit;
use set::Set;

/// Every request understood by the server. The `strum` serialization of each variant is its
/// canonical verb.
#[derive(Debug, PartialEq, AsRefStr, EnumCount)]
pub enum Command {
    #[strum(serialize = "GET")]
    Get(Get),
    #[strum(serialize = "SET")]
    Set(Set),
    #[strum(serialize = "DEL")]
    Del(Del),
    #[strum(serialize = "KEYS")]
    Keys(Keys),
    #[strum(serialize = "QUIT")]
    Quit(Quit),
    #[strum(serialize = "HELLO")]
    Hello(Hello),
    #[strum(serialize = "CLIENT LIST")]
    ClientList(ClientList),
    #[strum(serialize = "CLIENT GETNAME")]
    ClientGetName(ClientGetName),
    #[strum(serialize = "CLIENT SETNAME")]
    ClientSetName(ClientSetName),
}

impl Command {
    /// The canonical verb, e.g. `CLIENT SETNAME`.
    pub fn name(&self) -> &str {
        self.as_ref()
    }
}

impl Executable for Command {
    fn exec(self, ctx: Context<'_>) -> Result<Outcome, Error> {
        match self {
            Command::Get(cmd) => cmd.exec(ctx),
            Command::Set(cmd) => cmd.exec(ctx),
            Command::Del(cmd) => cmd.exec(ctx),
            Command::Keys(cmd) => cmd.exec(ctx),
            Command::Quit(cmd) => cmd.exec(ctx),
            Command::Hello(cmd) => cmd.exec(ctx),
            Command::ClientList(cmd) => cmd.exec(ctx),
            Command::ClientGetName(cmd) => cmd.exec(ctx),
            Command::ClientSetName(cmd) => cmd.exec(ctx),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = ProtocolError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the server as RESP arrays.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(ProtocolError::UnsupportedFrame {
                    actual: frame.type_name(),
                })
            }
        };

        let mut parts = frames.into_iter();
        let verb = match parts.next() {
            Some(frame) => frame_to_string(frame)?,
            None => return Err(ProtocolError::EmptyCommand),
        };

        let parser = &mut CommandParser {
            command: verb.to_ascii_uppercase(),
            parts,
        };

        let command = parser.command.clone();
        match command.as_str() {
            "GET" => return Get::try_from(&mut *parser).map(Command::Get),
            "SET" => return Set::try_from(&mut *parser).map(Command::Set),
            "DEL" => return Del::try_from(&mut *parser).map(Command::Del),
            "KEYS" => return Keys::try_from(&mut *parser).map(Command::Keys),
            "QUIT" => return Quit::try_from(&mut *parser).map(Command::Quit),
            "HELLO" => return Hello::try_from(&mut *parser).map(Command::Hello),
            _ => {}
        }

        // Not a single token verb, retry with the first two tokens, e.g. `CLIENT LIST`.
        let subcommand = match parser.parts.next() {
            Some(frame) => frame_to_string(frame)?,
            None => String::new(),
        };
        let candidate = format!("{verb} {subcommand}").trim().to_string();
        parser.command = candidate.to_ascii_uppercase();

        let command = parser.command.clone();
        match command.as_str() {
            "CLIENT LIST" => ClientList::try_from(&mut *parser).map(Command::ClientList),
            "CLIENT GETNAME" => ClientGetName::try_from(&mut *parser).map(Command::ClientGetName),
            "CLIENT SETNAME" => ClientSetName::try_from(&mut *parser).map(Command::ClientSetName),
            _ => Err(ProtocolError::UnknownCommand {
                command: verb,
                candidate,
            }),
        }
    }
}

/// Cursor over the arguments of a single command. `command` is the canonical verb and is only
/// used for error reporting.
pub struct CommandParser {
    command: String,
    parts: vec::IntoIter<Frame>,
}

impl CommandParser {
    fn next_frame(&mut self) -> Result<Frame, ProtocolError> {
        self.parts.next().ok_or_else(|| ProtocolError::WrongArity {
            command: self.command.clone(),
        })
    }

    fn next_string(&mut self) -> Result<String, ProtocolError> {
        let frame = self.next_frame()?;
        frame_to_string(frame)
    }

    fn next_bytes(&mut self) -> Result<Bytes, ProtocolError> {
        match self.next_frame()? {
            // Both `Simple` and `Bulk` representation may be strings. While errors are stored as
            // strings, they are considered separate types.
            Frame::Simple(s) => Ok(Bytes::from(s)),
            Frame::Bulk(bytes) => Ok(bytes),
            frame => Err(ProtocolError::InvalidFrame {
                expected: "simple or bulk string",
                actual: frame,
            }),
        }
    }

    fn remaining(&self) -> usize {
        self.parts.len()
    }

    /// Fails when arguments are left over.
    fn finish(&mut self) -> Result<(), ProtocolError> {
        if self.remaining() > 0 {
            return Err(ProtocolError::WrongArity {
                command: self.command.clone(),
            });
        }
        Ok(())
    }
}

fn frame_to_string(frame: Frame) -> Result<String, ProtocolError> {
    match frame {
        Frame::Simple(s) => Ok(s),
        Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
            .map(|s| s.to_string())
            .map_err(ProtocolError::InvalidUTF8String),
        frame => Err(ProtocolError::InvalidFrame {
            expected: "simple or bulk string",
            actual: frame,
        }),
    }
}

/// A request that could not be turned into a [`Command`]. These are reported back to the client
/// and never close the connection.
#[derive(Debug, ThisError, PartialEq, Clone)]
pub enum ProtocolError {
    #[error("unsupported data type - {actual} received; only array format is supported")]
    UnsupportedFrame { actual: &'static str },
    #[error("protocol error; invalid frame, expected {expected}, got {actual}")]
    InvalidFrame {
        expected: &'static str,
        actual: Frame,
    },
    #[error("unsupported command '{command}' or '{candidate}' received")]
    UnknownCommand { command: String, candidate: String },
    #[error("wrong number of arguments for '{command}' command")]
    WrongArity { command: String },
    #[error("protocol error; empty command")]
    EmptyCommand,
    #[error("protocol error; invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
    /// The bytes on the wire could not be decoded into a frame at all.
    #[error("{0}")]
    MalformedFrame(String),
}

impl From<frame::Error> for ProtocolError {
    fn from(err: frame::Error) -> Self {
        ProtocolError::MalformedFrame(err.to_string())
    }
}
