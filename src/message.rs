use std::error::Error;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::prefix::Prefix;
use crate::rib::PathOrigin;

#[derive(Debug)]
pub enum MessageError {
    /// JSON parse failure or missing required field
    Malformed(String),
    /// Message arrived for a neighbor outside the startup set
    UnknownNeighbor(String),
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageError::Malformed(reason) => write!(f, "Malformed message: {}", reason),
            MessageError::UnknownNeighbor(addr) => write!(f, "Unknown neighbor: {}", addr),
        }
    }
}

impl Error for MessageError {}

impl From<serde_json::Error> for MessageError {
    fn from(error: serde_json::Error) -> Self {
        MessageError::Malformed(error.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Update,
    Revoke,
    Data,
    NoRoute,
    Dump,
    Table,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            MessageKind::Update => "update",
            MessageKind::Revoke => "revoke",
            MessageKind::Data => "data",
            MessageKind::NoRoute => "no route",
            MessageKind::Dump => "dump",
            MessageKind::Table => "table",
        };
        write!(f, "{}", word)
    }
}

impl Serialize for MessageKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D>(deserializer: D) -> Result<MessageKind, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "update" => Ok(MessageKind::Update),
            "revoke" => Ok(MessageKind::Revoke),
            "data" => Ok(MessageKind::Data),
            "no route" => Ok(MessageKind::NoRoute),
            "dump" => Ok(MessageKind::Dump),
            "table" => Ok(MessageKind::Table),
            _ => Err(de::Error::custom(format!(
                "unsupported message type: '{}'",
                s
            ))),
        }
    }
}

/// The envelope every on-wire message travels in. `msg` stays a raw
/// JSON value until the dispatcher knows what shape to expect.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub src: String,
    pub dst: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub msg: Value,
}

impl Envelope {
    pub fn decode(bytes: &[u8]) -> Result<Envelope, MessageError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {} -> {}>", self.kind, self.src, self.dst)
    }
}

/// Body of an `update` message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteParams {
    #[serde(flatten)]
    pub prefix: Prefix,
    pub localpref: u32,
    #[serde(rename = "selfOrigin")]
    pub self_origin: bool,
    #[serde(rename = "ASPath")]
    pub as_path: Vec<u32>,
    pub origin: PathOrigin,
}

/// One row of a `table` reply
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableEntry {
    #[serde(flatten)]
    pub prefix: Prefix,
    pub peer: String,
}

/// Router-side address of a link: the neighbor's first three octets
/// followed by `.1`
pub fn router_side_addr(neighbor: &str) -> String {
    match neighbor.rfind('.') {
        Some(idx) => format!("{}.1", &neighbor[..idx]),
        None => neighbor.to_string(),
    }
}
