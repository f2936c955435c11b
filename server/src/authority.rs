//! Server-authoritative movement resolution and player lifecycle
//!
//! The authority owns the canonical player registry. It consumes transport
//! events one at a time and answers each with the outbound messages the
//! network layer should deliver. It never touches sockets itself, which keeps
//! every decision here synchronous and testable.

use log::{debug, error, info, trace, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{
    ConnectionHandle, Message, MovementIntent, PlayerRegistry, Presentation, TransportEvent,
    UserDisconnect, UserSetup, UserUpdate,
};
use std::collections::HashMap;

/// Attempts at drawing a random free name before falling back to the handle.
const NAME_ATTEMPTS: usize = 16;

/// Message the network layer must deliver on the authority's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Send {
        to: ConnectionHandle,
        message: Message,
    },
    Broadcast {
        message: Message,
        exclude: Option<ConnectionHandle>,
    },
}

/// Canonical game state plus the rules that mutate it
pub struct Authority<P: Presentation> {
    registry: PlayerRegistry,
    /// IP text each player connected from, sent along when introducing them
    ip_addresses: HashMap<ConnectionHandle, String>,
    presentation: P,
    step: f32,
    skins: Vec<String>,
    rng: StdRng,
}

impl<P: Presentation> Authority<P> {
    pub fn new(presentation: P, step: f32, skins: Vec<String>) -> Self {
        Self::with_rng(presentation, step, skins, StdRng::from_entropy())
    }

    /// Deterministic name and skin assignment, for tests and replays.
    pub fn with_seed(presentation: P, step: f32, skins: Vec<String>, seed: u64) -> Self {
        Self::with_rng(presentation, step, skins, StdRng::seed_from_u64(seed))
    }

    fn with_rng(presentation: P, step: f32, skins: Vec<String>, rng: StdRng) -> Self {
        Self {
            registry: PlayerRegistry::new(),
            ip_addresses: HashMap::new(),
            presentation,
            step,
            skins,
            rng,
        }
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn presentation(&self) -> &P {
        &self.presentation
    }

    pub fn handle_event(&mut self, event: TransportEvent) -> Vec<Outbound> {
        match event {
            TransportEvent::Connected {
                identity,
                remote_addr,
            } => self.player_connected(identity, &remote_addr),
            TransportEvent::Disconnected { identity } => self.player_disconnected(identity),
            TransportEvent::MessageReceived { identity, bytes } => {
                self.message_received(identity, &bytes)
            }
        }
    }

    /// Registers a newly connected player and introduces everyone
    ///
    /// The newcomer first learns its own name, then every player already in
    /// the session together with that player's current position. All other
    /// clients learn about the newcomer. `ip_address` is the peer IP without
    /// a port.
    pub fn player_connected(
        &mut self,
        identity: ConnectionHandle,
        ip_address: &str,
    ) -> Vec<Outbound> {
        let name = self.generate_unique_name(identity);
        let skin = self.pick_skin();

        if let Err(e) = self
            .registry
            .register(identity, &name, &skin, None, &mut self.presentation)
        {
            warn!("Dropping connection event from {}: {}", ip_address, e);
            return Vec::new();
        }
        self.ip_addresses.insert(identity, ip_address.to_owned());
        info!(
            "User {} connected from {} as {:?} with skin {:?}",
            identity, ip_address, name, skin
        );

        let mut outbound = vec![Outbound::Send {
            to: identity,
            message: UserSetup::new(identity, true, &name, &skin, ip_address).into(),
        }];

        for other in self.registry.iter().filter(|p| p.identity() != identity) {
            let other_ip = self
                .ip_addresses
                .get(&other.identity())
                .map(String::as_str)
                .unwrap_or_default();
            let setup =
                UserSetup::new(other.identity(), false, other.name(), other.skin(), other_ip);
            outbound.push(Outbound::Send {
                to: identity,
                message: setup.into(),
            });
            outbound.push(Outbound::Send {
                to: identity,
                message: UserUpdate::new(other.name(), other.position()).into(),
            });
        }

        outbound.push(Outbound::Broadcast {
            message: UserSetup::new(identity, false, &name, &skin, ip_address).into(),
            exclude: Some(identity),
        });

        outbound
    }

    /// Removes a departed player. Repeated notifications are no-ops.
    pub fn player_disconnected(&mut self, identity: ConnectionHandle) -> Vec<Outbound> {
        self.ip_addresses.remove(&identity);
        match self.registry.unregister(identity, &mut self.presentation) {
            Some(name) => {
                info!("User {} ({:?}) disconnected", identity, name);
                vec![Outbound::Broadcast {
                    message: UserDisconnect::new(&name).into(),
                    exclude: Some(identity),
                }]
            }
            None => {
                debug!("Disconnect for unknown connection {} ignored", identity);
                Vec::new()
            }
        }
    }

    /// Decodes and dispatches one client frame.
    pub fn message_received(&mut self, identity: ConnectionHandle, bytes: &[u8]) -> Vec<Outbound> {
        let message = match Message::decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed frame from {}: {}", identity, e);
                return Vec::new();
            }
        };

        match message {
            Message::UserCmdMove(intent) => self
                .resolve_movement(identity, intent)
                .map(|update| {
                    vec![Outbound::Broadcast {
                        message: update.into(),
                        exclude: None,
                    }]
                })
                .unwrap_or_default(),
            Message::Heartbeat(heartbeat) => {
                trace!("Heartbeat from {} at {}", identity, heartbeat.timestamp_ms);
                Vec::new()
            }
            other => {
                error!(
                    "{} should not be sent to the server, dropped frame from {}",
                    other.kind(),
                    identity
                );
                Vec::new()
            }
        }
    }

    /// Applies one movement intent to the sender's canonical position
    ///
    /// Returns the position update to broadcast, or `None` when the intent is
    /// idle or its sender is no longer registered. Z is never changed.
    pub fn resolve_movement(
        &mut self,
        identity: ConnectionHandle,
        intent: MovementIntent,
    ) -> Option<UserUpdate> {
        if intent.is_idle() {
            warn!("User {} sent a movement intent without direction", identity);
            return None;
        }

        let Some(player) = self.registry.lookup(identity) else {
            warn!("Movement intent from unregistered connection {}", identity);
            return None;
        };

        let (dx, dy) = intent.displacement(self.step);
        let position = player.position().translated(dx, dy);

        let player = match self.registry.update_position(identity, position) {
            Ok(player) => player,
            Err(e) => {
                warn!("Could not move {}: {}", identity, e);
                return None;
            }
        };

        self.presentation
            .set_visual_position(player.visual(), player.position());
        trace!(
            "User {} moved to ({:.3}, {:.3})",
            player.name(),
            position.x,
            position.y
        );

        Some(UserUpdate::new(player.name(), position))
    }

    /// Drops every player, destroying their visual objects.
    pub fn shutdown(&mut self) {
        self.ip_addresses.clear();
        self.registry.clear(&mut self.presentation);
    }

    /// Draws random `User` names, then falls back to `Guest` plus the handle.
    /// Handles are never reused and random draws never start with `Guest`, so
    /// the fallback cannot collide.
    fn generate_unique_name(&mut self, identity: ConnectionHandle) -> String {
        for _ in 0..NAME_ATTEMPTS {
            let candidate = format!("User{:04}", self.rng.gen_range(0..10_000));
            if !self.registry.contains_name(&candidate) {
                return candidate;
            }
        }
        format!("Guest{}", identity.0)
    }

    fn pick_skin(&mut self) -> String {
        self.skins.choose(&mut self.rng).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{
        HeadlessPresentation, HorizontalDirection, MsgKind, Position, VerticalDirection,
        MOVE_STEP,
    };

    fn authority() -> Authority<HeadlessPresentation> {
        Authority::with_seed(
            HeadlessPresentation::new(),
            MOVE_STEP,
            vec!["trollface_1.bmp".to_string(), "trollface_2.bmp".to_string()],
            7,
        )
    }

    fn name_of(authority: &Authority<HeadlessPresentation>, identity: u32) -> String {
        authority
            .registry()
            .lookup(ConnectionHandle(identity))
            .unwrap()
            .name()
            .to_string()
    }

    fn intent_frame(h: HorizontalDirection, v: VerticalDirection) -> Vec<u8> {
        Message::from(MovementIntent::new(h, v))
            .encode()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_connect_registers_at_origin_with_unique_name() {
        let mut authority = authority();
        authority.player_connected(ConnectionHandle(1), "127.0.0.1:5000");
        authority.player_connected(ConnectionHandle(2), "127.0.0.1:5001");

        let first = authority.registry().lookup(ConnectionHandle(1)).unwrap();
        let second = authority.registry().lookup(ConnectionHandle(2)).unwrap();
        assert_ne!(first.name(), second.name());
        assert!(first.name().starts_with("User"));
        assert_eq!(first.position(), Position::ORIGIN);
        assert!(["trollface_1.bmp", "trollface_2.bmp"].contains(&first.skin()));
        assert_eq!(authority.presentation().len(), 2);
    }

    #[test]
    fn test_connect_outbound_order() {
        let mut authority = authority();
        authority.player_connected(ConnectionHandle(1), "10.0.0.1");
        let out = authority.player_connected(ConnectionHandle(2), "10.0.0.2");
        let first_name = name_of(&authority, 1);
        let second_name = name_of(&authority, 2);

        assert_eq!(out.len(), 4);
        match &out[0] {
            Outbound::Send {
                to,
                message: Message::UserSetup(setup),
            } => {
                assert_eq!(*to, ConnectionHandle(2));
                assert!(setup.is_current_client);
                assert_eq!(setup.user_name, second_name.as_str());
                assert_eq!(setup.ip_address, "10.0.0.2");
            }
            other => panic!("Unexpected outbound {:?}", other),
        }
        match &out[1] {
            Outbound::Send {
                to,
                message: Message::UserSetup(setup),
            } => {
                assert_eq!(*to, ConnectionHandle(2));
                assert!(!setup.is_current_client);
                assert_eq!(setup.connection, ConnectionHandle(1));
                assert_eq!(setup.user_name, first_name.as_str());
                assert_eq!(setup.ip_address, "10.0.0.1");
            }
            other => panic!("Unexpected outbound {:?}", other),
        }
        assert!(matches!(
            &out[2],
            Outbound::Send { message: Message::UserUpdate(update), .. }
                if update.user_name == first_name.as_str()
        ));
        match &out[3] {
            Outbound::Broadcast {
                message: Message::UserSetup(setup),
                exclude,
            } => {
                assert_eq!(*exclude, Some(ConnectionHandle(2)));
                assert!(!setup.is_current_client);
                assert_eq!(setup.user_name, second_name.as_str());
                assert_eq!(setup.ip_address, "10.0.0.2");
            }
            other => panic!("Unexpected outbound {:?}", other),
        }
    }

    fn own_setup(out: &[Outbound]) -> &UserSetup {
        match out.first() {
            Some(Outbound::Send {
                message: Message::UserSetup(setup),
                ..
            }) => setup,
            other => panic!("Unexpected outbound {:?}", other),
        }
    }

    #[test]
    fn test_longest_ipv6_address_is_not_truncated() {
        let mut authority = authority();
        let ip = "ffff:ffff:ffff:ffff:ffff:ffff:255.255.255.255";
        assert_eq!(ip.len(), 45);

        let out = authority.player_connected(ConnectionHandle(1), ip);
        let setup = own_setup(&out);
        assert_eq!(setup.ip_address, ip);

        let frame = Message::from(setup.clone()).encode().unwrap();
        match Message::decode(&frame).unwrap() {
            Message::UserSetup(decoded) => assert_eq!(decoded.ip_address, ip),
            other => panic!("Unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_departed_player_ip_is_forgotten() {
        let mut authority = authority();
        authority.player_connected(ConnectionHandle(1), "10.0.0.1");
        authority.player_disconnected(ConnectionHandle(1));
        authority.player_connected(ConnectionHandle(2), "10.0.0.2");

        let out = authority.player_connected(ConnectionHandle(3), "10.0.0.3");

        let introduced: Vec<_> = out
            .iter()
            .filter_map(|item| match item {
                Outbound::Send {
                    message: Message::UserSetup(setup),
                    ..
                } if !setup.is_current_client => Some(setup.ip_address.as_str().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(introduced, vec!["10.0.0.2".to_string()]);
    }

    #[test]
    fn test_name_fallback_when_random_names_are_taken() {
        let mut authority = authority();
        let mut draws = StdRng::seed_from_u64(7);
        let mut presentation = HeadlessPresentation::new();
        let mut taken = 0;
        for i in 0..NAME_ATTEMPTS {
            let name = format!("User{:04}", draws.gen_range(0..10_000));
            if authority
                .registry
                .register(ConnectionHandle(100 + i as u32), &name, "", None, &mut presentation)
                .is_ok()
            {
                taken += 1;
            }
        }
        assert!(taken > 0);

        let name = authority.generate_unique_name(ConnectionHandle(7));
        assert_eq!(name, "Guest7");
        assert!(!authority.registry().contains_name(&name));
    }

    #[test]
    fn test_resolve_left_up_scenario() {
        let mut authority = Authority::with_seed(HeadlessPresentation::new(), 0.25, vec![], 1);
        authority.player_connected(ConnectionHandle(1), "127.0.0.1:1");
        let name = name_of(&authority, 1);

        let update = authority
            .resolve_movement(
                ConnectionHandle(1),
                MovementIntent::new(HorizontalDirection::Left, VerticalDirection::Up),
            )
            .unwrap();

        assert_eq!(update.user_name, name.as_str());
        assert_eq!(update.position, Position::new(-0.25, 0.25, 0.0));

        let player = authority.registry().lookup(ConnectionHandle(1)).unwrap();
        assert_eq!(player.position(), Position::new(-0.25, 0.25, 0.0));
        assert_eq!(
            authority.presentation().position_of(player.visual()),
            Some(Position::new(-0.25, 0.25, 0.0))
        );
    }

    #[test]
    fn test_every_direction_pair_moves_only_x_and_y() {
        let horizontals = [
            HorizontalDirection::None,
            HorizontalDirection::Left,
            HorizontalDirection::Right,
        ];
        let verticals = [
            VerticalDirection::None,
            VerticalDirection::Up,
            VerticalDirection::Down,
        ];

        for h in horizontals {
            for v in verticals {
                let mut authority = authority();
                authority.player_connected(ConnectionHandle(1), "127.0.0.1:1");
                let intent = MovementIntent::new(h, v);
                let result = authority.resolve_movement(ConnectionHandle(1), intent);
                let position = authority
                    .registry()
                    .lookup(ConnectionHandle(1))
                    .unwrap()
                    .position();

                if intent.is_idle() {
                    assert!(result.is_none());
                    assert_eq!(position, Position::ORIGIN);
                    continue;
                }

                assert!(result.is_some());
                assert_approx_eq!(position.x, h.signum() * MOVE_STEP);
                assert_approx_eq!(position.y, v.signum() * MOVE_STEP);
                assert_eq!(position.z, 0.0);
            }
        }
    }

    #[test]
    fn test_resolve_accumulates_absolute_position() {
        let mut authority = authority();
        authority.player_connected(ConnectionHandle(1), "127.0.0.1:1");
        let right = MovementIntent::new(HorizontalDirection::Right, VerticalDirection::None);

        for _ in 0..3 {
            authority.resolve_movement(ConnectionHandle(1), right);
        }
        let update = authority
            .resolve_movement(ConnectionHandle(1), right)
            .unwrap();

        assert_approx_eq!(update.position.x, 4.0 * MOVE_STEP);
        assert_eq!(update.position.y, 0.0);
    }

    #[test]
    fn test_unregistered_intent_is_dropped() {
        let mut authority = authority();
        authority.player_connected(ConnectionHandle(1), "127.0.0.1:1");

        let frame = intent_frame(HorizontalDirection::Left, VerticalDirection::None);
        let out = authority.message_received(ConnectionHandle(9), &frame);

        assert!(out.is_empty());
        assert_eq!(authority.registry().len(), 1);
        assert_eq!(
            authority
                .registry()
                .lookup(ConnectionHandle(1))
                .unwrap()
                .position(),
            Position::ORIGIN
        );
    }

    #[test]
    fn test_intent_frame_broadcasts_update() {
        let mut authority = authority();
        authority.player_connected(ConnectionHandle(1), "127.0.0.1:1");
        let name = name_of(&authority, 1);

        let frame = intent_frame(HorizontalDirection::Right, VerticalDirection::Down);
        let out = authority.message_received(ConnectionHandle(1), &frame);

        assert_eq!(out.len(), 1);
        match &out[0] {
            Outbound::Broadcast {
                message: Message::UserUpdate(update),
                exclude: None,
            } => {
                assert_eq!(update.user_name, name.as_str());
                assert_approx_eq!(update.position.x, MOVE_STEP);
                assert_approx_eq!(update.position.y, -MOVE_STEP);
            }
            other => panic!("Unexpected outbound {:?}", other),
        }
    }

    #[test]
    fn test_idle_intent_frame_is_dropped() {
        let mut authority = authority();
        authority.player_connected(ConnectionHandle(1), "127.0.0.1:1");

        let frame = intent_frame(HorizontalDirection::None, VerticalDirection::None);
        assert!(authority
            .message_received(ConnectionHandle(1), &frame)
            .is_empty());
    }

    #[test]
    fn test_role_violation_and_malformed_frames_are_dropped() {
        let mut authority = authority();
        authority.player_connected(ConnectionHandle(1), "127.0.0.1:1");

        let update = Message::from(UserUpdate::new("x", Position::new(5.0, 5.0, 0.0)))
            .encode()
            .unwrap();
        assert!(authority
            .message_received(ConnectionHandle(1), &update)
            .is_empty());

        assert!(authority
            .message_received(ConnectionHandle(1), &[42, 0, 0])
            .is_empty());
        assert!(authority
            .message_received(ConnectionHandle(1), &[MsgKind::UserCmdMove.tag()])
            .is_empty());

        assert_eq!(
            authority
                .registry()
                .lookup(ConnectionHandle(1))
                .unwrap()
                .position(),
            Position::ORIGIN
        );
    }

    #[test]
    fn test_disconnect_twice_is_noop() {
        let mut authority = authority();
        authority.player_connected(ConnectionHandle(1), "127.0.0.1:1");
        let name = name_of(&authority, 1);

        let out = authority.handle_event(TransportEvent::Disconnected {
            identity: ConnectionHandle(1),
        });
        assert_eq!(
            out,
            vec![Outbound::Broadcast {
                message: UserDisconnect::new(&name).into(),
                exclude: Some(ConnectionHandle(1)),
            }]
        );
        assert!(authority.registry().is_empty());
        assert!(authority.presentation().is_empty());

        let out = authority.handle_event(TransportEvent::Disconnected {
            identity: ConnectionHandle(1),
        });
        assert!(out.is_empty());
    }

    #[test]
    fn test_duplicate_connection_event_is_dropped() {
        let mut authority = authority();
        authority.player_connected(ConnectionHandle(1), "127.0.0.1:1");
        let name = name_of(&authority, 1);

        let out = authority.player_connected(ConnectionHandle(1), "127.0.0.1:1");

        assert!(out.is_empty());
        assert_eq!(authority.registry().len(), 1);
        assert_eq!(name_of(&authority, 1), name);
    }

    #[test]
    fn test_shutdown_clears_registry() {
        let mut authority = authority();
        authority.player_connected(ConnectionHandle(1), "127.0.0.1:1");
        authority.player_connected(ConnectionHandle(2), "127.0.0.1:2");

        authority.shutdown();

        assert!(authority.registry().is_empty());
        assert!(authority.presentation().is_empty());
    }
}
