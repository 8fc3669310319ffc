//! Wire protocol and data model shared by the monitor and the test responder.
//!
//! The query protocol is a single UDP round trip. A request is eleven bytes:
//! the `SAMP` magic, the target's IPv4 octets, its port (little-endian) and a
//! one-byte opcode. An info reply echoes those eleven bytes and appends a
//! password flag, player counts and length-prefixed 8-bit strings.

pub mod codepage;

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

/// Marker opening every request and reply.
pub const MAGIC: [u8; 4] = *b"SAMP";
/// Server info query: name, player counts, mode and language.
pub const OPCODE_INFO: u8 = b'i';

/// Byte offset of the opcode in both requests and replies.
pub const OPCODE_OFFSET: usize = 10;
/// Request length and the length of the echoed prefix of every reply.
pub const REQUEST_LEN: usize = 11;
/// Fixed part of an info reply, up to and including the max player count.
pub const INFO_FIXED_LEN: usize = 16;
/// Largest datagram we expect back from a server.
pub const MAX_DATAGRAM: usize = 2048;

/// How long a probe waits for the reply, measured from send.
pub const QUERY_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("datagram too short: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
    #[error("bad magic {0:?}")]
    BadMagic([u8; 4]),
    #[error("unexpected opcode {0:#04x}")]
    UnexpectedOpcode(u8),
    #[error("string length {declared} overruns datagram ({available} bytes left)")]
    LengthOverrun { declared: usize, available: usize },
    #[error("framing error: {0}")]
    Framing(#[from] bincode::Error),
}

/// The eleven bytes that open every request and reply.
///
/// bincode's default options are fixed-width little-endian with no length
/// prefix on arrays, which is exactly the wire layout.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct QueryHeader {
    pub magic: [u8; 4],
    pub address: [u8; 4],
    pub port: u16,
    pub opcode: u8,
}

impl QueryHeader {
    /// Header for `opcode` addressed to `address:port`.
    pub fn new(address: Ipv4Addr, port: u16, opcode: u8) -> Self {
        Self {
            magic: MAGIC,
            address: address.octets(),
            port,
            opcode,
        }
    }

    /// Header of an info query.
    pub fn info(address: Ipv4Addr, port: u16) -> Self {
        Self::new(address, port, OPCODE_INFO)
    }

    /// Serializes to the 11 wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(bincode::serialize(self)?)
    }

    /// Reads the first 11 bytes of a datagram. Does not check the magic.
    pub fn decode(datagram: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(datagram, REQUEST_LEN)?;
        Ok(bincode::deserialize(datagram)?)
    }

    /// True when the header starts with `SAMP`.
    pub fn has_magic(&self) -> bool {
        self.magic == MAGIC
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct InfoFixed {
    header: QueryHeader,
    password: u8,
    players: u16,
    max_players: u16,
}

/// Parsed body of an info (`'i'`) reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoReply {
    pub passworded: bool,
    pub players: u16,
    pub max_players: u16,
    pub hostname: String,
    pub gamemode: Option<String>,
    pub language: Option<String>,
}

impl InfoReply {
    pub fn new(hostname: &str, players: u16, max_players: u16) -> Self {
        Self {
            passworded: false,
            players,
            max_players,
            hostname: hostname.to_string(),
            gamemode: None,
            language: None,
        }
    }
}

/// Decodes an info reply.
///
/// Fails on a short header, wrong magic, wrong opcode, or a hostname length
/// running past the datagram. Gamemode and language are optional: when they
/// are missing or cut short the reply is still accepted without them.
pub fn decode_info_reply(datagram: &[u8]) -> Result<InfoReply, ProtocolError> {
    ensure_len(datagram, REQUEST_LEN)?;
    let header: QueryHeader = bincode::deserialize(datagram)?;
    if !header.has_magic() {
        return Err(ProtocolError::BadMagic(header.magic));
    }
    if header.opcode != OPCODE_INFO {
        return Err(ProtocolError::UnexpectedOpcode(header.opcode));
    }

    ensure_len(datagram, INFO_FIXED_LEN)?;
    let fixed: InfoFixed = bincode::deserialize(datagram)?;

    let mut cursor = INFO_FIXED_LEN;
    let hostname = decode_hostname(read_string(datagram, &mut cursor)?);

    let gamemode = read_string(datagram, &mut cursor)
        .ok()
        .map(codepage::decode);
    let language = match gamemode {
        Some(_) => read_string(datagram, &mut cursor)
            .ok()
            .map(codepage::decode),
        None => None,
    };

    Ok(InfoReply {
        passworded: fixed.password != 0,
        players: fixed.players,
        max_players: fixed.max_players,
        hostname,
        gamemode,
        language,
    })
}

/// Builds the reply a server would send for `request`.
pub fn encode_info_reply(request: &QueryHeader, reply: &InfoReply) -> Result<Vec<u8>, ProtocolError> {
    let fixed = InfoFixed {
        header: QueryHeader {
            opcode: OPCODE_INFO,
            ..*request
        },
        password: reply.passworded as u8,
        players: reply.players,
        max_players: reply.max_players,
    };
    let mut datagram = bincode::serialize(&fixed)?;
    write_string(&mut datagram, &reply.hostname);

    if reply.gamemode.is_some() || reply.language.is_some() {
        write_string(&mut datagram, reply.gamemode.as_deref().unwrap_or(""));
    }
    if let Some(language) = &reply.language {
        write_string(&mut datagram, language);
    }
    Ok(datagram)
}

/// Decodes an advertised hostname byte for byte. Padding and blank names
/// are kept as sent.
pub fn decode_hostname(bytes: &[u8]) -> String {
    codepage::decode(bytes)
}

fn ensure_len(datagram: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if datagram.len() < needed {
        return Err(ProtocolError::Truncated {
            needed,
            got: datagram.len(),
        });
    }
    Ok(())
}

fn read_string<'a>(datagram: &'a [u8], cursor: &mut usize) -> Result<&'a [u8], ProtocolError> {
    let start = *cursor + 4;
    let prefix = datagram
        .get(*cursor..start)
        .ok_or(ProtocolError::Truncated {
            needed: start,
            got: datagram.len(),
        })?;
    let declared = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;

    let available = datagram.len() - start;
    if declared > available {
        return Err(ProtocolError::LengthOverrun {
            declared,
            available,
        });
    }
    *cursor = start + declared;
    Ok(&datagram[start..*cursor])
}

fn write_string(datagram: &mut Vec<u8>, text: &str) {
    let bytes = codepage::encode(text);
    datagram.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    datagram.extend_from_slice(&bytes);
}

/// Parses a dotted-quad IPv4 host. Hostnames and IPv6 are rejected because
/// the request embeds the four octets.
pub fn parse_host(host: &str) -> Option<Ipv4Addr> {
    host.parse().ok()
}

/// One monitored game server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub added_by: String,
}

impl Endpoint {
    pub fn new(host: &str, port: u16, added_by: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            added_by: added_by.to_string(),
        }
    }

    /// Identity is the exact `(host, port)` pair, no normalization.
    pub fn matches(&self, host: &str, port: u16) -> bool {
        self.host == host && self.port == port
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Outcome of one probe. The optional fields are only set when `online`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct StatusResult {
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_players: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passworded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamemode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl StatusResult {
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn hostname_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.hostname.as_deref().unwrap_or(fallback)
    }

    pub fn players_or_zero(&self) -> u16 {
        self.players.unwrap_or(0)
    }

    pub fn max_players_or_zero(&self) -> u16 {
        self.max_players.unwrap_or(0)
    }
}

impl From<InfoReply> for StatusResult {
    fn from(reply: InfoReply) -> Self {
        Self {
            online: true,
            hostname: Some(reply.hostname),
            players: Some(reply.players),
            max_players: Some(reply.max_players),
            passworded: Some(reply.passworded),
            gamemode: reply.gamemode,
            language: reply.language,
        }
    }
}
