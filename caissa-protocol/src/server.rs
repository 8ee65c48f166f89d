//! Remote game-server wire contract.
//!
//! The board controller polls the server for the most recent move and
//! posts physically detected moves back. Both payloads are small JSON
//! objects; encoding stays allocator-free via `serde-json-core`.

use heapless::String;
use serde::{Deserialize, Serialize};

/// Capacity for the move field (canonical form is 5 characters).
pub const MOVE_FIELD_LEN: usize = 8;

/// Capacity for identity fields (room id, source, side tags).
pub const TAG_FIELD_LEN: usize = 24;

/// Buffer size that fits any encoded request/response body.
pub const JSON_BUF_LEN: usize = 192;

/// Source tag attached to moves detected on the physical board.
pub const SOURCE_PHYSICAL: &str = "physical";

/// Poll response from the game server.
///
/// A `null` or absent move means "no new move".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResponse {
    /// Long-algebraic move, e.g. `"e2-e4"`
    #[serde(rename = "move", default)]
    pub mv: Option<String<MOVE_FIELD_LEN>>,
    /// Where the move originated (UI, engine, physical)
    #[serde(default)]
    pub source: Option<String<TAG_FIELD_LEN>>,
    /// Which side made the move, when the server knows
    #[serde(rename = "playerSide", default)]
    pub player_side: Option<String<TAG_FIELD_LEN>>,
}

/// Physical move report posted to the game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveReport<'a> {
    /// Long-algebraic move, e.g. `"e2-e4"`
    #[serde(rename = "move")]
    pub mv: &'a str,
    /// Always [`SOURCE_PHYSICAL`]
    pub source: &'a str,
    #[serde(rename = "roomId")]
    pub room_id: &'a str,
    #[serde(rename = "playerSide")]
    pub player_side: &'a str,
}

impl<'a> MoveReport<'a> {
    /// Build a report for a physically detected move.
    pub fn physical(mv: &'a str, room_id: &'a str, player_side: &'a str) -> Self {
        Self {
            mv,
            source: SOURCE_PHYSICAL,
            room_id,
            player_side,
        }
    }

    /// Encode into `buf`, returning the used prefix length.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, serde_json_core::ser::Error> {
        serde_json_core::to_slice(self, buf)
    }
}

impl PollResponse {
    /// Decode a poll response body.
    pub fn decode(body: &[u8]) -> Result<Self, serde_json_core::de::Error> {
        let (resp, _) = serde_json_core::from_slice(body)?;
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_response_with_move() {
        let body = br#"{"move":"e2-e4","source":"ui","playerSide":"white"}"#;
        let resp = PollResponse::decode(body).unwrap();
        assert_eq!(resp.mv.as_deref(), Some("e2-e4"));
        assert_eq!(resp.source.as_deref(), Some("ui"));
        assert_eq!(resp.player_side.as_deref(), Some("white"));
    }

    #[test]
    fn test_poll_response_null_move() {
        let body = br#"{"move":null,"source":null,"playerSide":null}"#;
        let resp = PollResponse::decode(body).unwrap();
        assert!(resp.mv.is_none());
    }

    #[test]
    fn test_poll_response_absent_fields() {
        let resp = PollResponse::decode(br#"{}"#).unwrap();
        assert!(resp.mv.is_none());
        assert!(resp.source.is_none());
        assert!(resp.player_side.is_none());
    }

    #[test]
    fn test_move_report_encoding() {
        let report = MoveReport::physical("e2-e4", "room-42", "white");
        let mut buf = [0u8; JSON_BUF_LEN];
        let len = report.encode(&mut buf).unwrap();
        let body = core::str::from_utf8(&buf[..len]).unwrap();
        assert_eq!(
            body,
            r#"{"move":"e2-e4","source":"physical","roomId":"room-42","playerSide":"white"}"#
        );
    }

    #[test]
    fn test_poll_response_rejects_garbage() {
        assert!(PollResponse::decode(b"not json").is_err());
    }
}
