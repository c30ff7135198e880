// https://redis.io/docs/reference/protocol-spec

use std::fmt;
use std::io;

use bytes::Buf;
use bytes::Bytes;
use std::io::Cursor;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

/// Deepest array or map nesting accepted, parsing recurses once per level.
const MAX_NESTING_DEPTH: usize = 256;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("protocol error; invalid frame data type: {0:#04x}")]
    InvalidDataType(u8),
    #[error("protocol error; unsupported frame data type '{0}'")]
    UnsupportedDataType(char),
    #[error("protocol error; invalid length or integer {0:?}")]
    InvalidNumber(String),
    #[error("protocol error; invalid frame format")]
    InvalidFormat,
    #[error("protocol error; frame nesting exceeds {0} levels")]
    NestingTooDeep(usize),
    #[error("protocol error; frame of {size} bytes exceeds the {limit} bytes limit")]
    FrameTooLarge { size: usize, limit: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
    Map(Vec<(Frame, Frame)>),
}

// Protocol specification: https://redis.io/docs/reference/protocol-spec/
impl Frame {
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        Self::parse_at(src, 0)
    }

    fn parse_at(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            DataType::SimpleString => {
                let line = get_line(src)?;
                Ok(Frame::Simple(to_string(line)?))
            }
            DataType::SimpleError => {
                let line = get_line(src)?;
                Ok(Frame::Error(to_string(line)?))
            }
            DataType::Integer => {
                let line = get_line(src)?;
                Ok(Frame::Integer(parse_number(line)?))
            }
            // $<length>\r\n<data>\r\n
            DataType::BulkString => match get_length(src)? {
                None => Ok(Frame::Null),
                Some(length) => {
                    let data = get_exact(src, length)?;
                    Ok(Frame::Bulk(Bytes::copy_from_slice(data)))
                }
            },
            // !<length>\r\n<error>\r\n
            DataType::BulkError => match get_length(src)? {
                // NOTE: the protocol does not specify a way to represent a null bulk error
                None => Ok(Frame::Null),
                Some(length) => {
                    let msg = get_exact(src, length)?;
                    Ok(Frame::Error(to_string(msg)?))
                }
            },
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array | DataType::Map if depth >= MAX_NESTING_DEPTH => {
                Err(Error::NestingTooDeep(MAX_NESTING_DEPTH))
            }
            DataType::Array => match get_length(src)? {
                None => Ok(Frame::Null),
                Some(length) => {
                    let mut frames = Vec::with_capacity(length.min(1024));
                    for _ in 0..length {
                        frames.push(Self::parse_at(src, depth + 1)?);
                    }
                    Ok(Frame::Array(frames))
                }
            },
            // %<number-of-entries>\r\n<key-1><value-1>...<key-n><value-n>
            DataType::Map => match get_length(src)? {
                None => Ok(Frame::Null),
                Some(length) => {
                    let mut entries = Vec::with_capacity(length.min(1024));
                    for _ in 0..length {
                        let key = Self::parse_at(src, depth + 1)?;
                        let value = Self::parse_at(src, depth + 1)?;
                        entries.push((key, value));
                    }
                    Ok(Frame::Map(entries))
                }
            },
            DataType::Null => {
                // Advance the cursor to the end of the frame.
                get_line(src)?;
                Ok(Frame::Null)
            }
            data_type => Err(Error::UnsupportedDataType(char::from(u8::from(data_type)))),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes);
        bytes
    }

    fn write_to(&self, bytes: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => {
                bytes.push(u8::from(DataType::SimpleString));
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
            }
            Frame::Error(s) => {
                bytes.push(u8::from(DataType::SimpleError));
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
            }
            Frame::Integer(i) => {
                bytes.push(u8::from(DataType::Integer));
                bytes.extend_from_slice(i.to_string().as_bytes());
                bytes.extend_from_slice(CRLF);
            }
            Frame::Bulk(data) => {
                write_header(bytes, DataType::BulkString, data.len());
                bytes.extend_from_slice(data);
                bytes.extend_from_slice(CRLF);
            }
            Frame::Null => {
                bytes.push(u8::from(DataType::Null));
                bytes.extend_from_slice(CRLF);
            }
            Frame::Array(arr) => {
                write_header(bytes, DataType::Array, arr.len());
                for frame in arr {
                    frame.write_to(bytes);
                }
            }
            Frame::Map(entries) => {
                write_header(bytes, DataType::Map, entries.len());
                for (key, value) in entries {
                    key.write_to(bytes);
                    value.write_to(bytes);
                }
            }
        }
    }

    /// Human readable name of the frame type, used when reporting protocol errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Frame::Simple(_) => "simple string",
            Frame::Error(_) => "error",
            Frame::Integer(_) => "integer",
            Frame::Bulk(_) => "bulk string",
            Frame::Null => "null",
            Frame::Array(_) => "array",
            Frame::Map(_) => "map",
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "_"),
            Frame::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for frame in arr {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
            Frame::Map(entries) => {
                write!(f, "%{}", entries.len())?;
                for (key, value) in entries {
                    write!(f, " {} {}", key, value)?;
                }
                Ok(())
            }
        }
    }
}

fn write_header(bytes: &mut Vec<u8>, data_type: DataType, length: usize) {
    bytes.push(u8::from(data_type));
    bytes.extend_from_slice(length.to_string().as_bytes());
    bytes.extend_from_slice(CRLF);
}

/// Returns the bytes up to the next CRLF and moves the cursor past it.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

/// Returns exactly `length` bytes which must be followed by a CRLF.
fn get_exact<'a>(src: &mut Cursor<&'a [u8]>, length: usize) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();
    let end = start.checked_add(length).ok_or(Error::InvalidFormat)?;

    if buf.len() < end + CRLF.len() {
        return Err(Error::Incomplete);
    }
    if &buf[end..end + CRLF.len()] != CRLF {
        return Err(Error::InvalidFormat);
    }

    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

/// Reads an aggregate or bulk length header. `-1` is the RESP2 null marker.
fn get_length(src: &mut Cursor<&[u8]>) -> Result<Option<usize>, Error> {
    let line = get_line(src)?;
    let length = parse_number(line)?;

    match length {
        -1 => Ok(None),
        n if n < 0 => Err(Error::InvalidNumber(n.to_string())),
        n => usize::try_from(n)
            .map(Some)
            .map_err(|_| Error::InvalidNumber(n.to_string())),
    }
}

fn parse_number(line: &[u8]) -> Result<i64, Error> {
    let string = std::str::from_utf8(line).map_err(|_| Error::InvalidFormat)?;
    string
        .parse::<i64>()
        .map_err(|_| Error::InvalidNumber(string.to_string()))
}

fn to_string(bytes: &[u8]) -> Result<String, Error> {
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidFormat)
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

#[derive(Debug)]
enum DataType {
    SimpleString,   // '+'
    BulkString,     // '$'
    VerbatimString, // '='
    SimpleError,    // '-'
    BulkError,      // '!'
    Boolean,        // '#'
    Integer,        // ':'
    Double,         // ','
    BigNumber,      // '('
    Array,          // '*'
    Map,            // '%'
    Set,            // '~'
    Push,           // '>'
    Null,           // '_'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'!' => Ok(Self::BulkError),
            b'*' => Ok(Self::Array),
            b'_' => Ok(Self::Null),
            b'#' => Ok(Self::Boolean),
            b',' => Ok(Self::Double),
            b'(' => Ok(Self::BigNumber),
            b'=' => Ok(Self::VerbatimString),
            b'%' => Ok(Self::Map),
            b'~' => Ok(Self::Set),
            b'>' => Ok(Self::Push),
            _ => Err(Error::InvalidDataType(byte)),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::BulkError => b'!',
            DataType::Array => b'*',
            DataType::Null => b'_',
            DataType::Boolean => b'#',
            DataType::Double => b',',
            DataType::BigNumber => b'(',
            DataType::VerbatimString => b'=',
            DataType::Map => b'%',
            DataType::Set => b'~',
            DataType::Push => b'>',
        }
    }
}
