//! Per-session player roster.
//!
//! Tracks every player the session has admitted, with the data they sent
//! on join and the last view of them pulled out of a state snapshot.
//! Snapshots are expected to carry players under a top-level `players`
//! key, either as an object keyed by peer id or as an array of objects
//! with an `id` field; anything else is left alone.

use hostsync_protocol::{PeerId, Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// What a snapshot says about one player.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerView {
    pub position: Option<Position>,
    pub health: Option<f64>,
    pub score: Option<f64>,
}

impl PlayerView {
    /// Reads a player entry. `position` may be nested (`{"position":
    /// {"x", "y"}}`) or flat (`{"x", "y"}`).
    pub fn from_entry(entry: &Value) -> Option<Self> {
        let object = entry.as_object()?;
        let position = object
            .get("position")
            .and_then(|p| serde_json::from_value::<Position>(p.clone()).ok())
            .or_else(|| {
                Some(Position {
                    x: object.get("x")?.as_f64()?,
                    y: object.get("y")?.as_f64()?,
                })
            });
        Some(Self {
            position,
            health: object.get("health").and_then(Value::as_f64),
            score: object.get("score").and_then(Value::as_f64),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub player_id: PeerId,
    /// Unix ms when the player was admitted.
    pub joined_at: u64,
    pub player_data: Value,
    pub last_state: Option<PlayerView>,
}

/// Admitted players in admission order.
#[derive(Debug, Default)]
pub struct PlayerRoster {
    records: Vec<PlayerRecord>,
}

impl PlayerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player. Returns `false` if already present; non-null `data`
    /// still replaces what was stored.
    pub fn insert(&mut self, player_id: PeerId, data: Value, joined_at: u64) -> bool {
        if let Some(record) = self.get_mut(&player_id) {
            if !data.is_null() {
                record.player_data = data;
            }
            return false;
        }
        self.records.push(PlayerRecord {
            player_id,
            joined_at,
            player_data: data,
            last_state: None,
        });
        true
    }

    pub fn remove(&mut self, player_id: &PeerId) -> Option<PlayerRecord> {
        let pos = self.records.iter().position(|r| r.player_id == *player_id)?;
        Some(self.records.remove(pos))
    }

    pub fn get(&self, player_id: &PeerId) -> Option<&PlayerRecord> {
        self.records.iter().find(|r| r.player_id == *player_id)
    }

    fn get_mut(&mut self, player_id: &PeerId) -> Option<&mut PlayerRecord> {
        self.records.iter_mut().find(|r| r.player_id == *player_id)
    }

    pub fn contains(&self, player_id: &PeerId) -> bool {
        self.get(player_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> Vec<PeerId> {
        self.records.iter().map(|r| r.player_id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.records.iter()
    }

    /// Refreshes `last_state` of every known player found in `state`.
    pub fn update_from_state(&mut self, state: &Snapshot) {
        let Some(players) = state.as_value().get("players") else {
            return;
        };
        for record in &mut self.records {
            let entry = match players {
                Value::Object(map) => map.get(record.player_id.as_str()),
                Value::Array(list) => list
                    .iter()
                    .find(|p| p.get("id").and_then(Value::as_str) == Some(record.player_id.as_str())),
                _ => None,
            };
            if let Some(view) = entry.and_then(PlayerView::from_entry) {
                record.last_state = Some(view);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn roster(ids: &[&str]) -> PlayerRoster {
        let mut roster = PlayerRoster::new();
        for (i, id) in ids.iter().enumerate() {
            roster.insert(PeerId::from(*id), Value::Null, i as u64);
        }
        roster
    }

    #[test]
    fn test_insert_is_idempotent_and_keeps_order() {
        let mut roster = roster(&["b", "a"]);
        assert!(!roster.insert("b".into(), json!({"name": "bee"}), 99));
        assert_eq!(roster.ids(), vec![PeerId::from("b"), PeerId::from("a")]);

        let b = roster.get(&"b".into()).unwrap();
        assert_eq!(b.joined_at, 0);
        assert_eq!(b.player_data, json!({"name": "bee"}));
    }

    #[test]
    fn test_null_data_does_not_clobber() {
        let mut roster = PlayerRoster::new();
        roster.insert("a".into(), json!({"color": "red"}), 0);
        roster.insert("a".into(), Value::Null, 1);
        assert_eq!(roster.get(&"a".into()).unwrap().player_data, json!({"color": "red"}));
    }

    #[test]
    fn test_remove() {
        let mut roster = roster(&["a", "b"]);
        assert!(roster.remove(&"a".into()).is_some());
        assert!(roster.remove(&"a".into()).is_none());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_update_from_keyed_players() {
        let mut roster = roster(&["p1", "p2"]);
        let state = Snapshot::new(json!({
            "players": {
                "p1": {"position": {"x": 3.0, "y": 4.0}, "health": 90, "score": 2},
                "p2": {"x": 1, "y": 1}
            }
        }));
        roster.update_from_state(&state);

        let p1 = roster.get(&"p1".into()).unwrap().last_state.clone().unwrap();
        assert_eq!(p1.position, Some(Position { x: 3.0, y: 4.0 }));
        assert_eq!(p1.health, Some(90.0));
        assert_eq!(p1.score, Some(2.0));

        let p2 = roster.get(&"p2".into()).unwrap().last_state.clone().unwrap();
        assert_eq!(p2.position, Some(Position { x: 1.0, y: 1.0 }));
        assert_eq!(p2.health, None);
    }

    #[test]
    fn test_update_from_player_array() {
        let mut roster = roster(&["p1"]);
        let state = Snapshot::new(json!({"players": [{"id": "p1", "score": 7}]}));
        roster.update_from_state(&state);
        let view = roster.get(&"p1".into()).unwrap().last_state.clone().unwrap();
        assert_eq!(view.score, Some(7.0));
        assert_eq!(view.position, None);
    }

    #[test]
    fn test_unrecognized_state_leaves_views_alone() {
        let mut roster = roster(&["p1"]);
        roster.update_from_state(&Snapshot::new(json!({"players": ["p1"]})));
        roster.update_from_state(&Snapshot::new(json!(42)));
        assert!(roster.get(&"p1".into()).unwrap().last_state.is_none());
    }
}
