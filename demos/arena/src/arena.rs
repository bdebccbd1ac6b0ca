//! A small grid arena: fighters move one cell at a time, hit adjacent
//! fighters, and drink potions.
//!
//! Obstacles and spawn points come from the map seed, so every peer builds
//! the same map for the same room.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use hostsync::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

const SIZE: i32 = 12;
const OBSTACLES: usize = 10;
const MAX_HEALTH: i32 = 100;
const ATTACK_DAMAGE: i32 = 25;
const POTION_HEAL: i32 = 30;
/// Ticks between +1 health regeneration.
const REGEN_EVERY: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
struct Pos {
    x: i32,
    y: i32,
}

impl Pos {
    fn step(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    fn in_bounds(self) -> bool {
        (0..SIZE).contains(&self.x) && (0..SIZE).contains(&self.y)
    }

    fn touches(self, other: Pos) -> bool {
        (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1
    }
}

#[derive(Debug, Clone, Serialize)]
struct Fighter {
    position: Pos,
    health: i32,
    score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Arena {
    map_seed: u64,
    size: i32,
    tick: u64,
    obstacles: Vec<Pos>,
    players: BTreeMap<PeerId, Fighter>,
    #[serde(skip)]
    max_players: usize,
}

impl Arena {
    fn new(map_seed: u64, max_players: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(map_seed);
        let mut obstacles = Vec::with_capacity(OBSTACLES);
        while obstacles.len() < OBSTACLES {
            let pos = Pos {
                x: rng.random_range(0..SIZE),
                y: rng.random_range(0..SIZE),
            };
            if !obstacles.contains(&pos) {
                obstacles.push(pos);
            }
        }
        Self {
            map_seed,
            size: SIZE,
            tick: 0,
            obstacles,
            players: BTreeMap::new(),
            max_players,
        }
    }

    fn is_free(&self, pos: Pos) -> bool {
        pos.in_bounds()
            && !self.obstacles.contains(&pos)
            && !self.players.values().any(|f| f.position == pos)
    }

    /// Spawn point for `peer`, derived from the map seed and the peer id so
    /// every peer computes the same one regardless of join order.
    fn spawn_point(&self, peer: &PeerId) -> Option<Pos> {
        let salt = peer
            .as_str()
            .bytes()
            .fold(self.map_seed, |h, b| (h ^ u64::from(b)).wrapping_mul(0x100_0000_01b3));
        let mut rng = StdRng::seed_from_u64(salt);
        for _ in 0..64 {
            let pos = Pos {
                x: rng.random_range(0..SIZE),
                y: rng.random_range(0..SIZE),
            };
            if self.is_free(pos) {
                return Some(pos);
            }
        }
        (0..SIZE)
            .flat_map(|y| (0..SIZE).map(move |x| Pos { x, y }))
            .find(|pos| self.is_free(*pos))
    }

    fn snapshot(&self) -> Result<Snapshot, EngineError> {
        serde_json::to_value(self)
            .map(Snapshot::new)
            .map_err(|e| EngineError::MalformedState(e.to_string()))
    }
}

/// `Simulation` backend hosting any number of arenas.
#[derive(Default)]
pub struct ArenaBackend {
    arenas: HashMap<InstanceId, Arena>,
    next_id: u64,
}

impl ArenaBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn arena(&mut self, instance: InstanceId) -> Result<&mut Arena, EngineError> {
        self.arenas
            .get_mut(&instance)
            .ok_or(EngineError::UnknownInstance(instance))
    }
}

impl Simulation for ArenaBackend {
    fn create_instance(
        &mut self,
        room_id: &RoomId,
        config: &GameConfig,
    ) -> Result<InstanceId, EngineError> {
        self.next_id += 1;
        let id = InstanceId(self.next_id);
        let seed = config.map_seed.unwrap_or_else(|| room_id.derived_seed());
        self.arenas.insert(id, Arena::new(seed, config.max_players));
        Ok(id)
    }

    fn apply_action(
        &mut self,
        instance: InstanceId,
        peer: &PeerId,
        action: &Action,
    ) -> Result<ActionOutcome, EngineError> {
        let arena = self.arena(instance)?;
        let Some(me) = arena.players.get(peer).cloned() else {
            return Err(EngineError::UnknownPlayer(peer.clone()));
        };

        let mut broadcast = false;
        match &action.kind {
            ActionKind::Move { dx, dy } => {
                let next = me.position.step(*dx, *dy);
                if !arena.is_free(next) {
                    return Err(EngineError::Rejected("cell blocked".into()));
                }
                if let Some(f) = arena.players.get_mut(peer) {
                    f.position = next;
                }
            }
            ActionKind::Attack { target } => {
                let target = PeerId::from(target.as_str());
                let victim = arena
                    .players
                    .get(&target)
                    .ok_or_else(|| EngineError::UnknownPlayer(target.clone()))?;
                if target == *peer || !me.position.touches(victim.position) {
                    return Err(EngineError::Rejected("target out of reach".into()));
                }
                if victim.health <= ATTACK_DAMAGE {
                    // Knocked out: respawn with full health.
                    if let Some(mut victim) = arena.players.remove(&target) {
                        if let Some(position) = arena.spawn_point(&target) {
                            victim.position = position;
                        }
                        victim.health = MAX_HEALTH;
                        arena.players.insert(target.clone(), victim);
                    }
                    if let Some(f) = arena.players.get_mut(peer) {
                        f.score += 1;
                    }
                } else if let Some(victim) = arena.players.get_mut(&target) {
                    victim.health -= ATTACK_DAMAGE;
                }
                broadcast = true;
            }
            ActionKind::UseItem { item } if item == "potion" => {
                if let Some(f) = arena.players.get_mut(peer) {
                    f.health = (f.health + POTION_HEAL).min(MAX_HEALTH);
                }
            }
            ActionKind::UseItem { item } => {
                return Err(EngineError::Rejected(format!("unknown item {item}")));
            }
            ActionKind::Interact | ActionKind::Wait => {}
            ActionKind::Custom { name, .. } => {
                return Err(EngineError::Rejected(format!("unsupported action {name}")));
            }
        }

        Ok(ActionOutcome {
            state: arena.snapshot()?,
            broadcast,
        })
    }

    fn tick(&mut self, instance: InstanceId, _elapsed: Duration) -> Result<Snapshot, EngineError> {
        let arena = self.arena(instance)?;
        arena.tick += 1;
        if arena.tick % REGEN_EVERY == 0 {
            for fighter in arena.players.values_mut() {
                fighter.health = (fighter.health + 1).min(MAX_HEALTH);
            }
        }
        arena.snapshot()
    }

    fn add_player(
        &mut self,
        instance: InstanceId,
        peer: &PeerId,
        data: &serde_json::Value,
    ) -> Result<bool, EngineError> {
        let arena = self.arena(instance)?;
        if arena.players.contains_key(peer) {
            return Ok(true);
        }
        if arena.players.len() >= arena.max_players {
            return Ok(false);
        }
        let Some(position) = arena.spawn_point(peer) else {
            return Ok(false);
        };
        let name = data.get("name").and_then(|n| n.as_str()).map(str::to_string);
        arena.players.insert(
            peer.clone(),
            Fighter {
                position,
                health: MAX_HEALTH,
                score: 0,
                name,
            },
        );
        Ok(true)
    }

    fn remove_player(&mut self, instance: InstanceId, peer: &PeerId) -> Result<bool, EngineError> {
        Ok(self.arena(instance)?.players.remove(peer).is_some())
    }

    fn destroy_instance(&mut self, instance: InstanceId) {
        self.arenas.remove(&instance);
    }

    fn get_state(&self, instance: InstanceId) -> Result<Snapshot, EngineError> {
        self.arenas
            .get(&instance)
            .ok_or(EngineError::UnknownInstance(instance))?
            .snapshot()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn arena_with(players: &[&str]) -> (ArenaBackend, InstanceId) {
        let mut backend = ArenaBackend::new();
        let config = GameConfig {
            map_seed: Some(7),
            ..GameConfig::default()
        };
        let id = backend.create_instance(&RoomId::from("r"), &config).unwrap();
        for p in players {
            assert!(backend.add_player(id, &PeerId::from(*p), &json!({})).unwrap());
        }
        (backend, id)
    }

    fn place(backend: &mut ArenaBackend, id: InstanceId, peer: &str, x: i32, y: i32) {
        let arena = backend.arena(id).unwrap();
        arena.obstacles.clear();
        arena.players.get_mut(&PeerId::from(peer)).unwrap().position = Pos { x, y };
    }

    fn act(
        backend: &mut ArenaBackend,
        id: InstanceId,
        peer: &str,
        kind: ActionKind,
    ) -> Result<ActionOutcome, EngineError> {
        backend.apply_action(id, &PeerId::from(peer), &Action::new(kind))
    }

    // =========================================================================
    // Map generation
    // =========================================================================

    #[test]
    fn test_same_seed_builds_same_map() {
        let (a, a_id) = arena_with(&[]);
        let (b, b_id) = arena_with(&[]);
        assert_eq!(a.get_state(a_id).unwrap(), b.get_state(b_id).unwrap());
    }

    #[test]
    fn test_spawn_point_is_deterministic() {
        let (a, a_id) = arena_with(&["p1"]);
        let (b, b_id) = arena_with(&["p1"]);
        let a_state = a.get_state(a_id).unwrap();
        let b_state = b.get_state(b_id).unwrap();
        assert_eq!(
            a_state.as_value()["players"]["p1"],
            b_state.as_value()["players"]["p1"]
        );
    }

    #[test]
    fn test_room_seed_used_without_map_seed() {
        let mut backend = ArenaBackend::new();
        let room = RoomId::from("lobby");
        let id = backend.create_instance(&room, &GameConfig::default()).unwrap();
        let state = backend.get_state(id).unwrap();
        assert_eq!(state.as_value()["mapSeed"], json!(room.derived_seed()));
    }

    #[test]
    fn test_full_arena_rejects_player() {
        let mut backend = ArenaBackend::new();
        let config = GameConfig {
            max_players: 1,
            ..GameConfig::default()
        };
        let id = backend.create_instance(&RoomId::from("r"), &config).unwrap();
        assert!(backend.add_player(id, &PeerId::from("a"), &json!({})).unwrap());
        assert!(!backend.add_player(id, &PeerId::from("b"), &json!({})).unwrap());
    }

    // =========================================================================
    // Actions
    // =========================================================================

    #[test]
    fn test_move_updates_position() {
        let (mut backend, id) = arena_with(&["p1"]);
        place(&mut backend, id, "p1", 3, 3);
        let outcome = act(&mut backend, id, "p1", ActionKind::Move { dx: 1, dy: 0 }).unwrap();
        assert!(!outcome.broadcast);
        assert_eq!(
            outcome.state.as_value()["players"]["p1"]["position"],
            json!({"x": 4, "y": 3})
        );
    }

    #[test]
    fn test_move_off_the_map_is_rejected() {
        let (mut backend, id) = arena_with(&["p1"]);
        place(&mut backend, id, "p1", 0, 0);
        let err = act(&mut backend, id, "p1", ActionKind::Move { dx: -1, dy: 0 }).unwrap_err();
        assert!(matches!(err, EngineError::Rejected(_)));
    }

    #[test]
    fn test_attack_needs_adjacency_and_broadcasts() {
        let (mut backend, id) = arena_with(&["p1", "p2"]);
        place(&mut backend, id, "p1", 0, 0);
        place(&mut backend, id, "p2", 5, 5);
        let far = act(&mut backend, id, "p1", ActionKind::Attack { target: "p2".into() });
        assert!(matches!(far, Err(EngineError::Rejected(_))));

        place(&mut backend, id, "p2", 1, 1);
        let hit = act(&mut backend, id, "p1", ActionKind::Attack { target: "p2".into() }).unwrap();
        assert!(hit.broadcast);
        assert_eq!(hit.state.as_value()["players"]["p2"]["health"], json!(75));
    }

    #[test]
    fn test_knockout_scores_and_respawns() {
        let (mut backend, id) = arena_with(&["p1", "p2"]);
        place(&mut backend, id, "p1", 0, 0);
        place(&mut backend, id, "p2", 1, 0);
        for _ in 0..3 {
            act(&mut backend, id, "p1", ActionKind::Attack { target: "p2".into() }).unwrap();
        }
        let last = act(&mut backend, id, "p1", ActionKind::Attack { target: "p2".into() }).unwrap();
        let players = &last.state.as_value()["players"];
        assert_eq!(players["p1"]["score"], json!(1));
        assert_eq!(players["p2"]["health"], json!(MAX_HEALTH));
    }

    #[test]
    fn test_potion_heals_up_to_max() {
        let (mut backend, id) = arena_with(&["p1", "p2"]);
        place(&mut backend, id, "p1", 0, 0);
        place(&mut backend, id, "p2", 1, 0);
        act(&mut backend, id, "p1", ActionKind::Attack { target: "p2".into() }).unwrap();
        let healed = act(&mut backend, id, "p2", ActionKind::UseItem { item: "potion".into() }).unwrap();
        assert_eq!(healed.state.as_value()["players"]["p2"]["health"], json!(MAX_HEALTH));

        let junk = act(&mut backend, id, "p2", ActionKind::UseItem { item: "rock".into() });
        assert!(matches!(junk, Err(EngineError::Rejected(_))));
    }

    #[test]
    fn test_unknown_player_is_reported() {
        let (mut backend, id) = arena_with(&["p1"]);
        let err = act(&mut backend, id, "ghost", ActionKind::Wait).unwrap_err();
        assert!(matches!(err, EngineError::UnknownPlayer(_)));
    }

    // =========================================================================
    // Ticking
    // =========================================================================

    #[test]
    fn test_tick_counts_and_regenerates() {
        let (mut backend, id) = arena_with(&["p1", "p2"]);
        place(&mut backend, id, "p1", 0, 0);
        place(&mut backend, id, "p2", 1, 0);
        act(&mut backend, id, "p1", ActionKind::Attack { target: "p2".into() }).unwrap();

        let mut state = backend.get_state(id).unwrap();
        for _ in 0..REGEN_EVERY {
            state = backend.tick(id, Duration::from_millis(16)).unwrap();
        }
        assert_eq!(state.as_value()["tick"], json!(REGEN_EVERY));
        assert_eq!(state.as_value()["players"]["p2"]["health"], json!(76));
    }

    #[test]
    fn test_destroyed_instance_is_unknown() {
        let (mut backend, id) = arena_with(&[]);
        backend.destroy_instance(id);
        assert!(matches!(
            backend.tick(id, Duration::ZERO),
            Err(EngineError::UnknownInstance(_))
        ));
    }
}
