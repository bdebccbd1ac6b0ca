//! Host coordinator: who is authoritative in the room.
//!
//! A pure state machine. Every input returns the list of
//! [`CoordinatorEffect`]s the session must carry out (start timers,
//! announce, ...); the coordinator itself never touches the network.
//!
//! ```text
//!             become_host / sole member / elected successor
//!   Follower ─────────────────────────────────────────────▶ Host
//!      ▲                                                     │
//!      └──────── announcement naming another peer ───────────┘
//!                or local leave
//! ```
//!
//! Host loss is only ever detected through the transport's leave events.
//! A host that stops responding without leaving keeps its role.

use hostsync_engine::ElectionPolicy;
use hostsync_protocol::PeerId;
use serde::Serialize;
use tracing::{debug, info};

/// The local peer's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HostRole {
    #[default]
    Follower,
    Host,
}

impl HostRole {
    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host)
    }
}

impl std::fmt::Display for HostRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Follower => write!(f, "follower"),
            Self::Host => write!(f, "host"),
        }
    }
}

/// Something the session has to do as a result of a role change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEffect {
    /// Make sure the simulation timer runs.
    StartTickLoop,
    /// Start broadcasting authoritative state every sync interval.
    StartSyncTimer,
    /// Stop broadcasting authoritative state.
    StopSyncTimer,
    /// Broadcast a `hostTransfer` naming this peer.
    AnnounceHost(PeerId),
    /// The known host changed. `None` means no host is known.
    HostChanged(Option<PeerId>),
}

/// Tracks room membership and the local peer's role.
#[derive(Debug)]
pub struct HostCoordinator {
    local: PeerId,
    role: HostRole,
    /// Last peer known to be host (possibly `local`).
    current_host: Option<PeerId>,
    /// Every member, local peer included, in local join order.
    members: Vec<PeerId>,
    policy: ElectionPolicy,
    /// `require_host`: elect automatically on creation and host loss.
    auto_elect: bool,
}

impl HostCoordinator {
    /// A coordinator for `local`, starting as `Follower`.
    pub fn new(local: PeerId, policy: ElectionPolicy, auto_elect: bool) -> Self {
        Self {
            members: vec![local.clone()],
            local,
            role: HostRole::Follower,
            current_host: None,
            policy,
            auto_elect,
        }
    }

    pub fn role(&self) -> HostRole {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role.is_host()
    }

    /// The peer currently believed to be host.
    pub fn current_host(&self) -> Option<&PeerId> {
        self.current_host.as_ref()
    }

    /// All members, local peer included, in join order.
    pub fn members(&self) -> &[PeerId] {
        &self.members
    }

    /// Number of remote members.
    pub fn remote_count(&self) -> usize {
        self.members.len() - 1
    }

    /// The local instance exists. `existing` lists the remote peers that
    /// were already in the room; they go ahead of the local peer in join
    /// order. A peer alone in the room becomes host.
    pub fn on_instance_created(&mut self, existing: &[PeerId]) -> Vec<CoordinatorEffect> {
        let mut members: Vec<PeerId> = existing
            .iter()
            .filter(|p| **p != self.local)
            .cloned()
            .collect();
        members.push(self.local.clone());
        self.members = members;

        if self.auto_elect && self.remote_count() == 0 {
            debug!(peer = %self.local, "first in room");
            return self.become_host();
        }
        Vec::new()
    }

    /// Claims the host role. Idempotent: a peer that already is host gets
    /// no effects, so timers are never started twice.
    pub fn become_host(&mut self) -> Vec<CoordinatorEffect> {
        if self.is_host() {
            return Vec::new();
        }
        self.role = HostRole::Host;
        self.current_host = Some(self.local.clone());
        info!(peer = %self.local, members = self.members.len(), "became host");
        vec![
            CoordinatorEffect::StartTickLoop,
            CoordinatorEffect::StartSyncTimer,
            CoordinatorEffect::AnnounceHost(self.local.clone()),
            CoordinatorEffect::HostChanged(Some(self.local.clone())),
        ]
    }

    /// A `hostTransfer` naming `host` arrived.
    pub fn on_host_announced(&mut self, host: &PeerId) -> Vec<CoordinatorEffect> {
        if *host == self.local {
            return self.become_host();
        }

        let mut effects = Vec::new();
        if self.is_host() {
            self.role = HostRole::Follower;
            info!(peer = %self.local, new_host = %host, "stepping down as host");
            effects.push(CoordinatorEffect::StopSyncTimer);
        }
        if self.current_host.as_ref() != Some(host) {
            self.current_host = Some(host.clone());
            effects.push(CoordinatorEffect::HostChanged(Some(host.clone())));
        }
        if !self.members.contains(host) {
            self.members.push(host.clone());
        }
        effects
    }

    /// A remote peer joined. The host re-announces itself so the newcomer
    /// learns who is authoritative.
    pub fn on_peer_joined(&mut self, peer: &PeerId) -> Vec<CoordinatorEffect> {
        if !self.members.contains(peer) {
            self.members.push(peer.clone());
        }
        if self.is_host() {
            vec![CoordinatorEffect::AnnounceHost(self.local.clone())]
        } else {
            Vec::new()
        }
    }

    /// A remote peer left. If it was the host (or no host is known), the
    /// elected successor claims the role.
    pub fn on_peer_left(&mut self, peer: &PeerId) -> Vec<CoordinatorEffect> {
        if *peer == self.local {
            return Vec::new();
        }
        self.members.retain(|p| p != peer);

        if self.is_host() {
            if self.remote_count() == 0 {
                info!(peer = %self.local, "host alone in room, broadcasts have no recipients");
            }
            return Vec::new();
        }

        let host_lost = match &self.current_host {
            Some(host) => host == peer,
            None => true,
        };
        if !host_lost {
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.current_host.take().is_some() {
            info!(peer = %self.local, departed = %peer, "host left the room");
            effects.push(CoordinatorEffect::HostChanged(None));
        }
        if self.auto_elect && self.successor().as_ref() == Some(&self.local) {
            effects.extend(self.become_host());
        }
        effects
    }

    /// The local peer is leaving; it gives up the host role.
    pub fn on_local_leave(&mut self) -> Vec<CoordinatorEffect> {
        self.members.retain(|p| *p == self.local);
        if !self.is_host() {
            return Vec::new();
        }
        self.role = HostRole::Follower;
        self.current_host = None;
        info!(peer = %self.local, "host leaving room");
        vec![
            CoordinatorEffect::StopSyncTimer,
            CoordinatorEffect::HostChanged(None),
        ]
    }

    /// Who should take over under the configured policy.
    pub fn successor(&self) -> Option<PeerId> {
        match self.policy {
            ElectionPolicy::LowestPeerId => self.members.iter().min().cloned(),
            ElectionPolicy::JoinOrder => self.members.first().cloned(),
        }
    }
}
