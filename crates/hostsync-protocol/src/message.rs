//! Channel payloads.
//!
//! Each [`Channel`] carries exactly one payload shape. [`Message`] ties the
//! two together so the rest of the stack can match on a single enum, while
//! the transport still sees `(channel, bytes)` pairs.

use serde::{Deserialize, Serialize};

use crate::{Action, Channel, Codec, PeerId, ProtocolError, Snapshot};

/// Payload of the `gameAction` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMessage {
    pub action: Action,
    /// Sender wall-clock time (unix ms) at submission.
    pub timestamp: u64,
    pub player_id: PeerId,
}

/// Payload of the `stateSync` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
    /// The host's `get_state` result at broadcast time.
    pub state: Snapshot,
    /// Host wall-clock time (unix ms) at broadcast.
    pub timestamp: u64,
    /// Host simulation tick at broadcast.
    pub tick: u64,
    /// Set on catch-up snapshots sent when a peer joins.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub full_sync: bool,
}

/// Payload of the `playerJoin` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinMessage {
    pub player_id: PeerId,
    #[serde(default)]
    pub player_data: serde_json::Value,
}

/// A decoded message together with the channel it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    GameAction(ActionMessage),
    StateSync(SyncMessage),
    PlayerJoin(PlayerJoinMessage),
    /// Id of the peer leaving.
    PlayerLeave(PeerId),
    /// Id of the new host.
    HostTransfer(PeerId),
}

impl Message {
    /// The channel this message is sent on.
    pub fn channel(&self) -> Channel {
        match self {
            Self::GameAction(_) => Channel::GameAction,
            Self::StateSync(_) => Channel::StateSync,
            Self::PlayerJoin(_) => Channel::PlayerJoin,
            Self::PlayerLeave(_) => Channel::PlayerLeave,
            Self::HostTransfer(_) => Channel::HostTransfer,
        }
    }

    /// Encodes the payload (without the channel) with `codec`.
    pub fn encode<C: Codec>(&self, codec: &C) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Self::GameAction(m) => codec.encode(m),
            Self::StateSync(m) => codec.encode(m),
            Self::PlayerJoin(m) => codec.encode(m),
            Self::PlayerLeave(id) | Self::HostTransfer(id) => codec.encode(id),
        }
    }

    /// Decodes a payload received on `channel`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] when the bytes don't match the
    /// channel's payload shape.
    pub fn decode<C: Codec>(
        codec: &C,
        channel: Channel,
        data: &[u8],
    ) -> Result<Self, ProtocolError> {
        Ok(match channel {
            Channel::GameAction => Self::GameAction(codec.decode(data)?),
            Channel::StateSync => Self::StateSync(codec.decode(data)?),
            Channel::PlayerJoin => Self::PlayerJoin(codec.decode(data)?),
            Channel::PlayerLeave => Self::PlayerLeave(codec.decode(data)?),
            Channel::HostTransfer => Self::HostTransfer(codec.decode(data)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{ActionKind, JsonCodec};

    fn sync(full: bool) -> SyncMessage {
        SyncMessage {
            state: Snapshot::new(json!({"players": {"p1": {"x": 1}}})),
            timestamp: 1_000,
            tick: 7,
            full_sync: full,
        }
    }

    #[test]
    fn test_action_message_json_shape() {
        let msg = ActionMessage {
            action: Action::new(ActionKind::Wait),
            timestamp: 42,
            player_id: PeerId::from("p1"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["playerId"], "p1");
        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["action"]["kind"]["type"], "wait");
    }

    #[test]
    fn test_full_sync_flag_omitted_when_false() {
        let json = serde_json::to_value(sync(false)).unwrap();
        assert!(json.get("fullSync").is_none());

        let json = serde_json::to_value(sync(true)).unwrap();
        assert_eq!(json["fullSync"], true);
    }

    #[test]
    fn test_sync_message_state_survives_codec() {
        let codec = JsonCodec;
        let original = sync(true);
        let bytes = Message::StateSync(original.clone()).encode(&codec).unwrap();
        let decoded = Message::decode(&codec, Channel::StateSync, &bytes).unwrap();
        match decoded {
            Message::StateSync(msg) => {
                assert_eq!(msg.state, original.state);
                assert!(msg.full_sync);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_float_state_survives_codec_exactly() {
        let codec = JsonCodec;
        let mut seed = 0x9e37_79b9_7f4a_7c15_u64;
        let mut values = vec![182.787_456_578_654_06, 0.1 + 0.2, 1e-300, -2.5e300, f64::EPSILON];
        for _ in 0..2_000 {
            // xorshift64
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            values.push((seed >> 11) as f64 / (1u64 << 53) as f64 * 1_000.0 - 500.0);
        }

        for (tick, value) in values.into_iter().enumerate() {
            let original = SyncMessage {
                state: Snapshot::new(json!({"players": {"p1": {"x": value, "hp": value / 3.0}}})),
                timestamp: 0,
                tick: tick as u64,
                full_sync: false,
            };
            let bytes = Message::StateSync(original.clone()).encode(&codec).unwrap();
            match Message::decode(&codec, Channel::StateSync, &bytes).unwrap() {
                Message::StateSync(msg) => assert_eq!(msg.state, original.state, "value {value}"),
                other => panic!("unexpected message: {other:?}"),
            }
        }
    }

    #[test]
    fn test_host_transfer_payload_is_bare_peer_id() {
        let codec = JsonCodec;
        let bytes = Message::HostTransfer(PeerId::from("p2")).encode(&codec).unwrap();
        assert_eq!(bytes, b"\"p2\"");
    }

    #[test]
    fn test_player_join_data_defaults_to_null() {
        let codec = JsonCodec;
        let msg = Message::decode(&codec, Channel::PlayerJoin, br#"{"playerId":"p3"}"#).unwrap();
        assert_eq!(
            msg,
            Message::PlayerJoin(PlayerJoinMessage {
                player_id: PeerId::from("p3"),
                player_data: serde_json::Value::Null,
            })
        );
    }

    #[test]
    fn test_decode_on_wrong_channel_fails() {
        let codec = JsonCodec;
        let bytes = Message::HostTransfer(PeerId::from("p2")).encode(&codec).unwrap();
        assert!(Message::decode(&codec, Channel::StateSync, &bytes).is_err());
    }

    #[test]
    fn test_channel_matches_variant() {
        assert_eq!(Message::PlayerLeave(PeerId::from("a")).channel(), Channel::PlayerLeave);
        assert_eq!(Message::StateSync(sync(false)).channel(), Channel::StateSync);
    }
}
