use serde::{Deserialize, Serialize};

use crate::blockchain::Block;
use crate::error::ProtocolError;
use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    QueryLatest = 0,
    QueryAll = 1,
    QueryTxPool = 2,
    ResponseTxPool = 4,
    ResponseChain = 8,
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(MessageType::QueryLatest),
            1 => Ok(MessageType::QueryAll),
            2 => Ok(MessageType::QueryTxPool),
            4 => Ok(MessageType::ResponseTxPool),
            8 => Ok(MessageType::ResponseChain),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

/// The frame peers exchange: a type code and an optional JSON-encoded
/// payload carried as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A decoded peer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    QueryLatest,
    QueryAll,
    QueryTxPool,
    ResponseChain(Vec<Block>),
    ResponseTxPool(Vec<Transaction>),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::QueryLatest => MessageType::QueryLatest,
            Message::QueryAll => MessageType::QueryAll,
            Message::QueryTxPool => MessageType::QueryTxPool,
            Message::ResponseChain(_) => MessageType::ResponseChain,
            Message::ResponseTxPool(_) => MessageType::ResponseTxPool,
        }
    }

    pub fn to_wire(&self) -> Result<WireMessage, ProtocolError> {
        let data = match self {
            Message::QueryLatest | Message::QueryAll | Message::QueryTxPool => None,
            Message::ResponseChain(blocks) => Some(serde_json::to_string(blocks)?),
            Message::ResponseTxPool(txs) => Some(serde_json::to_string(txs)?),
        };
        Ok(WireMessage {
            kind: self.message_type() as u8,
            data,
        })
    }

    pub fn from_wire(wire: WireMessage) -> Result<Self, ProtocolError> {
        let kind = MessageType::try_from(wire.kind)?;
        let payload = wire
            .data
            .as_deref()
            .ok_or(ProtocolError::MissingData(wire.kind));
        Ok(match kind {
            MessageType::QueryLatest => Message::QueryLatest,
            MessageType::QueryAll => Message::QueryAll,
            MessageType::QueryTxPool => Message::QueryTxPool,
            MessageType::ResponseChain => Message::ResponseChain(serde_json::from_str(payload?)?),
            MessageType::ResponseTxPool => Message::ResponseTxPool(serde_json::from_str(payload?)?),
        })
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(&self.to_wire()?)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Self::from_wire(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_carry_no_data() {
        assert_eq!(Message::QueryLatest.to_json().unwrap(), r#"{"type":0}"#);
        assert_eq!(Message::QueryAll.to_json().unwrap(), r#"{"type":1}"#);
        assert_eq!(Message::QueryTxPool.to_json().unwrap(), r#"{"type":2}"#);
    }

    #[test]
    fn null_data_is_accepted_for_queries() {
        assert_eq!(
            Message::from_json(r#"{"type":1,"data":null}"#).unwrap(),
            Message::QueryAll
        );
    }

    #[test]
    fn chain_payload_is_a_json_string() {
        let msg = Message::ResponseChain(vec![Block::genesis()]);
        let wire: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(wire["type"], 8);
        let inner: Vec<Block> = serde_json::from_str(wire["data"].as_str().unwrap()).unwrap();
        assert_eq!(inner, vec![Block::genesis()]);
        assert_eq!(Message::from_json(&msg.to_json().unwrap()).unwrap(), msg);
    }

    #[test]
    fn bad_frames_are_errors() {
        assert!(matches!(
            Message::from_json(r#"{"type":3}"#),
            Err(ProtocolError::UnknownType(3))
        ));
        assert!(matches!(
            Message::from_json(r#"{"type":8}"#),
            Err(ProtocolError::MissingData(8))
        ));
        assert!(matches!(
            Message::from_json(r#"{"type":4,"data":"[{\"id\":1}]"}"#),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            Message::from_json("not json"),
            Err(ProtocolError::Json(_))
        ));
    }
}
