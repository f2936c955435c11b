//! Player registry kept by both the server and every client.
//!
//! The registry maps display names to player state and keeps a second index
//! from connection handle to name. It is owned by exactly one control loop per
//! process, so it carries no locking of its own.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use log::{debug, info};

use crate::error::RegistryError;
use crate::presentation::{Presentation, VisualHandle};
use crate::{ConnectionHandle, Position};

/// Lookup key: either the connection handle or the exact display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKey<'a> {
    Identity(ConnectionHandle),
    Name(&'a str),
}

impl From<ConnectionHandle> for PlayerKey<'_> {
    fn from(identity: ConnectionHandle) -> Self {
        PlayerKey::Identity(identity)
    }
}

impl<'a> From<&'a str> for PlayerKey<'a> {
    fn from(name: &'a str) -> Self {
        PlayerKey::Name(name)
    }
}

impl fmt::Display for PlayerKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerKey::Identity(identity) => write!(f, "connection {}", identity),
            PlayerKey::Name(name) => write!(f, "player {:?}", name),
        }
    }
}

/// State of one registered player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    identity: ConnectionHandle,
    name: String,
    skin: String,
    visual: VisualHandle,
    position: Position,
}

impl PlayerState {
    pub fn identity(&self) -> ConnectionHandle {
        self.identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn skin(&self) -> &str {
        &self.skin
    }

    /// Handle of the visual object drawn for this player. Always set while the
    /// entry exists; the presentation layer owns the object itself.
    pub fn visual(&self) -> VisualHandle {
        self.visual
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

/// Registered players of one process
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<String, PlayerState>,
    names_by_identity: HashMap<ConnectionHandle, String>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new player at the origin
    ///
    /// Fails if the display name, or the connection, already has an entry; the
    /// existing entry is left untouched. When `visual` is `None` the
    /// presentation layer is asked to create an object for the player.
    pub fn register<P: Presentation + ?Sized>(
        &mut self,
        identity: ConnectionHandle,
        name: &str,
        skin: &str,
        visual: Option<VisualHandle>,
        presentation: &mut P,
    ) -> Result<&PlayerState, RegistryError> {
        if self.names_by_identity.contains_key(&identity) {
            return Err(RegistryError::DuplicateIdentity(identity));
        }

        match self.players.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateName(name.to_owned())),
            Entry::Vacant(slot) => {
                let visual = visual.unwrap_or_else(|| presentation.create_visual_object());
                presentation.set_visual_position(visual, Position::ORIGIN);

                self.names_by_identity.insert(identity, name.to_owned());
                info!("Registered player {:?} on connection {}", name, identity);

                Ok(slot.insert(PlayerState {
                    identity,
                    name: name.to_owned(),
                    skin: skin.to_owned(),
                    visual,
                    position: Position::ORIGIN,
                }))
            }
        }
    }

    /// Finds a player by connection handle or exact, case-sensitive name.
    pub fn lookup<'a>(&self, key: impl Into<PlayerKey<'a>>) -> Option<&PlayerState> {
        match key.into() {
            PlayerKey::Identity(identity) => self
                .names_by_identity
                .get(&identity)
                .and_then(|name| self.players.get(name)),
            PlayerKey::Name(name) => self.players.get(name),
        }
    }

    /// Overwrites the stored position; last write wins.
    pub fn update_position<'a>(
        &mut self,
        key: impl Into<PlayerKey<'a>>,
        position: Position,
    ) -> Result<&PlayerState, RegistryError> {
        let key = key.into();
        let name = self
            .resolve_name(key)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))?;

        let player = self
            .players
            .get_mut(&name)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))?;
        player.position = position;
        Ok(player)
    }

    /// Removes a player and destroys its visual object
    ///
    /// Returns the removed player's name, or `None` when nothing was
    /// registered under the key, which makes repeated removal a no-op.
    pub fn unregister<'a, P: Presentation + ?Sized>(
        &mut self,
        key: impl Into<PlayerKey<'a>>,
        presentation: &mut P,
    ) -> Option<String> {
        let name = self.resolve_name(key.into())?;
        let player = self.players.remove(&name)?;
        self.names_by_identity.remove(&player.identity);

        presentation.destroy_visual_object(player.visual);
        info!(
            "Unregistered player {:?} from connection {}",
            player.name, player.identity
        );
        Some(player.name)
    }

    /// Tears the registry down, destroying every visual object.
    pub fn clear<P: Presentation + ?Sized>(&mut self, presentation: &mut P) {
        for (_, player) in self.players.drain() {
            presentation.destroy_visual_object(player.visual);
        }
        self.names_by_identity.clear();
        debug!("Player registry cleared");
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.players.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn resolve_name(&self, key: PlayerKey<'_>) -> Option<String> {
        match key {
            PlayerKey::Identity(identity) => self.names_by_identity.get(&identity).cloned(),
            PlayerKey::Name(name) if self.players.contains_key(name) => Some(name.to_owned()),
            PlayerKey::Name(_) => None,
        }
    }
}
