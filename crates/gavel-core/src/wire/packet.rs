// Engine.IO v4 / Socket.IO v4 text framing.
//
// Every WebSocket text frame is one Engine.IO packet: a single type digit
// followed by an optional payload. Socket.IO packets travel inside Engine.IO
// `message` packets and carry their own type digit, an optional namespace,
// an optional ack id and a JSON body.

use serde::Deserialize;
use serde_json::Value;

use super::WireError;

/// Handshake sent by the server in the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, WireError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(WireError::Empty)?;
        let body = chars.as_str();
        match kind {
            '0' => {
                let handshake = serde_json::from_str(body)
                    .map_err(|e| WireError::Handshake(e.to_string()))?;
                Ok(EnginePacket::Open(handshake))
            }
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(body.to_string())),
            '3' => Ok(EnginePacket::Pong(body.to_string())),
            '4' => Ok(EnginePacket::Message(body.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(WireError::UnknownEngineType(other)),
        }
    }

    /// Encode the packets a client ever sends. `Open` is server-only and
    /// encodes as an empty open frame.
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{data}"),
            EnginePacket::Pong(data) => format!("3{data}"),
            EnginePacket::Message(data) => format!("4{data}"),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// Client: auth payload. Server: `{"sid": ...}` acknowledgement.
    Connect(Option<Value>),
    Disconnect,
    Event {
        name: String,
        data: Value,
        ack_id: Option<u64>,
    },
    Ack {
        id: u64,
        data: Value,
    },
    /// Server refused the namespace connection, usually `{"message": ...}`.
    ConnectError(Value),
}

impl SocketPacket {
    /// Decode the body of an Engine.IO `message` packet.
    pub fn decode(body: &str) -> Result<Self, WireError> {
        let mut chars = body.chars();
        let kind = chars.next().ok_or(WireError::Empty)?;
        let mut rest = chars.as_str();

        // Namespace: "/name," prefix. Only the root namespace is used, so
        // the value is skipped.
        if rest.starts_with('/') {
            rest = match rest.find(',') {
                Some(idx) => &rest[idx + 1..],
                None => "",
            };
        }

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits]
                .parse::<u64>()
                .map_err(|e| WireError::Malformed(format!("ack id: {e}")))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let json = |s: &str| -> Result<Value, WireError> {
            serde_json::from_str(s).map_err(|e| WireError::Malformed(e.to_string()))
        };

        match kind {
            '0' => {
                if rest.is_empty() {
                    Ok(SocketPacket::Connect(None))
                } else {
                    Ok(SocketPacket::Connect(Some(json(rest)?)))
                }
            }
            '1' => Ok(SocketPacket::Disconnect),
            '2' => {
                let (name, data) = split_event_array(json(rest)?)?;
                Ok(SocketPacket::Event { name, data, ack_id })
            }
            '3' => {
                let id = ack_id.ok_or_else(|| WireError::Malformed("ack without id".into()))?;
                let data = if rest.is_empty() { Value::Null } else { json(rest)? };
                Ok(SocketPacket::Ack { id, data })
            }
            '4' => {
                let data = if rest.is_empty() { Value::Null } else { json(rest)? };
                Ok(SocketPacket::ConnectError(data))
            }
            other => Err(WireError::UnknownSocketType(other)),
        }
    }

    /// Encode into the body of an Engine.IO `message` packet.
    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_string(),
            SocketPacket::Connect(Some(auth)) => format!("0{auth}"),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, data, ack_id } => {
                let array = Value::Array(vec![Value::String(name.clone()), data.clone()]);
                match ack_id {
                    Some(id) => format!("2{id}{array}"),
                    None => format!("2{array}"),
                }
            }
            SocketPacket::Ack { id, data } => format!("3{id}{}", Value::Array(vec![data.clone()])),
            SocketPacket::ConnectError(data) => format!("4{data}"),
        }
    }

    /// Encode as a complete WebSocket text frame (`4` + socket packet).
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }

    /// Human-readable reason carried by a `ConnectError`.
    pub fn connect_error_message(data: &Value) -> String {
        data.get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| data.to_string())
    }
}

fn split_event_array(value: Value) -> Result<(String, Value), WireError> {
    let Value::Array(items) = value else {
        return Err(WireError::Malformed("event body is not an array".into()));
    };
    let mut items = items.into_iter();
    let name = match items.next() {
        Some(Value::String(name)) => name,
        _ => return Err(WireError::Malformed("event name missing".into())),
    };
    let data = items.next().unwrap_or(Value::Null);
    Ok((name, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_open_handshake() {
        let frame = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        match EnginePacket::decode(frame).unwrap() {
            EnginePacket::Open(h) => {
                assert_eq!(h.sid, "abc");
                assert_eq!(h.ping_interval, 25000);
                assert_eq!(h.ping_timeout, 20000);
            }
            other => panic!("expected Open, got {other:?}"),
        }
    }

    #[test]
    fn bad_handshake_is_handshake_error() {
        let err = EnginePacket::decode("0{not json").unwrap_err();
        assert!(matches!(err, WireError::Handshake(_)));
    }

    #[test]
    fn decodes_ping_and_answers_pong() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
    }

    #[test]
    fn empty_and_unknown_frames_are_errors() {
        assert!(matches!(EnginePacket::decode(""), Err(WireError::Empty)));
        assert!(matches!(
            EnginePacket::decode("9"),
            Err(WireError::UnknownEngineType('9'))
        ));
    }

    #[test]
    fn decodes_event_with_payload() {
        let frame = r#"42["bid:received",{"playerId":"p1","amount":500}]"#;
        let EnginePacket::Message(body) = EnginePacket::decode(frame).unwrap() else {
            panic!("expected message");
        };
        match SocketPacket::decode(&body).unwrap() {
            SocketPacket::Event { name, data, ack_id } => {
                assert_eq!(name, "bid:received");
                assert_eq!(data["amount"], 500);
                assert_eq!(ack_id, None);
            }
            other => panic!("expected Event, got {other:?}"),
        }
    }

    #[test]
    fn decodes_event_with_namespace_and_ack_id() {
        let packet = SocketPacket::decode(r#"2/admin,12["x",{"a":1}]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                name: "x".into(),
                data: json!({"a": 1}),
                ack_id: Some(12),
            }
        );
    }

    #[test]
    fn event_without_payload_has_null_data() {
        let packet = SocketPacket::decode(r#"2["auction:ended"]"#).unwrap();
        assert!(matches!(packet, SocketPacket::Event { data: Value::Null, .. }));
    }

    #[test]
    fn event_body_must_be_named_array() {
        assert!(SocketPacket::decode(r#"2{"a":1}"#).is_err());
        assert!(SocketPacket::decode(r#"2[1,2]"#).is_err());
    }

    #[test]
    fn decodes_connect_ack_and_connect_error() {
        assert_eq!(
            SocketPacket::decode(r#"0{"sid":"s1"}"#).unwrap(),
            SocketPacket::Connect(Some(json!({"sid": "s1"})))
        );
        let err = SocketPacket::decode(r#"4{"message":"Authentication error"}"#).unwrap();
        let SocketPacket::ConnectError(data) = err else {
            panic!("expected ConnectError");
        };
        assert_eq!(SocketPacket::connect_error_message(&data), "Authentication error");
    }

    #[test]
    fn encodes_client_frames() {
        let connect = SocketPacket::Connect(Some(json!({"token": "t"})));
        assert_eq!(connect.to_frame(), r#"40{"token":"t"}"#);

        let join = SocketPacket::Event {
            name: "join:auction".into(),
            data: json!({"eventId": "e1"}),
            ack_id: None,
        };
        assert_eq!(join.to_frame(), r#"42["join:auction",{"eventId":"e1"}]"#);
    }
}
