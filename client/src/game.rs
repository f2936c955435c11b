//! Client-side mirror of the server's player registry
//!
//! The client never decides a position. It adopts whatever the server
//! broadcasts, keeping its own registry and the presentation in step.

use log::{debug, error, info, warn};
use shared::{
    Message, PlayerRegistry, Position, Presentation, UserDisconnect, UserSetup, UserUpdate,
    VisualHandle,
};
use std::collections::HashMap;
use std::time::Duration;

/// Visual transition between two authoritative positions
#[derive(Debug, Clone, Copy)]
struct Glide {
    from: Position,
    to: Position,
    elapsed: Duration,
}

impl Glide {
    fn current(&self, window: Duration) -> Position {
        let alpha = self.elapsed.as_secs_f32() / window.as_secs_f32();
        self.from.lerp(self.to, alpha)
    }

    fn is_done(&self, window: Duration) -> bool {
        self.elapsed >= window
    }
}

/// Applies server messages to the local registry and presentation
pub struct ClientGame<P: Presentation> {
    registry: PlayerRegistry,
    presentation: P,
    my_name: Option<String>,
    interpolation: Option<Duration>,
    glides: HashMap<VisualHandle, Glide>,
}

impl<P: Presentation> ClientGame<P> {
    pub fn new(presentation: P) -> Self {
        Self {
            registry: PlayerRegistry::new(),
            presentation,
            my_name: None,
            interpolation: None,
            glides: HashMap::new(),
        }
    }

    /// Smooths visual motion over `window`. The registry still takes every
    /// update immediately.
    pub fn with_interpolation(mut self, window: Duration) -> Self {
        self.interpolation = (!window.is_zero()).then_some(window);
        self
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn presentation(&self) -> &P {
        &self.presentation
    }

    /// Name the server assigned to this client, once known
    pub fn my_name(&self) -> Option<&str> {
        self.my_name.as_deref()
    }

    /// Our own authoritative position, once the server has introduced us
    pub fn my_position(&self) -> Option<Position> {
        self.my_name
            .as_deref()
            .and_then(|name| self.registry.lookup(name))
            .map(|player| player.position())
    }

    /// Decodes and applies one frame from the server.
    pub fn handle_frame(&mut self, bytes: &[u8]) {
        match Message::decode(bytes) {
            Ok(message) => self.handle_message(message),
            Err(e) => warn!("Dropping malformed frame from server: {}", e),
        }
    }

    pub fn handle_message(&mut self, message: Message) {
        match message {
            Message::UserSetup(setup) => self.apply_user_setup(&setup),
            Message::UserUpdate(update) => self.apply_user_update(&update),
            Message::UserDisconnect(disconnect) => self.apply_user_disconnect(&disconnect),
            other => error!("{} should not be sent to a client, dropped", other.kind()),
        }
    }

    /// Learns about a player, possibly ourselves
    pub fn apply_user_setup(&mut self, setup: &UserSetup) {
        let name = setup.user_name.as_str();

        if setup.is_current_client {
            info!("Server assigned us the name {:?}", name);
            self.my_name = Some(name.to_owned());
        }

        if self.registry.contains_name(name) {
            info!("Player {:?} is already known, setup ignored", name);
            return;
        }

        if let Err(e) = self.registry.register(
            setup.connection,
            name,
            setup.skin.as_str(),
            None,
            &mut self.presentation,
        ) {
            warn!("Could not register {:?}: {}", name, e);
        }
    }

    /// Overwrites X and Y of a known player. Z stays as it was.
    pub fn apply_user_update(&mut self, update: &UserUpdate) {
        let name = update.user_name.as_str();

        let Some(previous) = self.registry.lookup(name).map(|p| p.position()) else {
            warn!("Position update for unknown player {:?} dropped", name);
            return;
        };

        let target = Position::new(update.position.x, update.position.y, previous.z);
        let visual = match self.registry.update_position(name, target) {
            Ok(player) => player.visual(),
            Err(e) => {
                warn!("Could not update {:?}: {}", name, e);
                return;
            }
        };

        match self.interpolation {
            Some(window) => {
                let from = self
                    .glides
                    .get(&visual)
                    .map(|glide| glide.current(window))
                    .unwrap_or(previous);
                self.glides.insert(
                    visual,
                    Glide {
                        from,
                        to: target,
                        elapsed: Duration::ZERO,
                    },
                );
            }
            None => self.presentation.set_visual_position(visual, target),
        }
    }

    pub fn apply_user_disconnect(&mut self, disconnect: &UserDisconnect) {
        let name = disconnect.user_name.as_str();
        let visual = self.registry.lookup(name).map(|player| player.visual());

        match self.registry.unregister(name, &mut self.presentation) {
            Some(_) => {
                if let Some(visual) = visual {
                    self.glides.remove(&visual);
                }
                if self.my_name.as_deref() == Some(name) {
                    self.my_name = None;
                }
            }
            None => warn!("Disconnect for unknown player {:?} ignored", name),
        }
    }

    /// Advances visual interpolation by `dt`. No-op when interpolation is off.
    pub fn advance(&mut self, dt: Duration) {
        let Some(window) = self.interpolation else {
            return;
        };

        for (visual, glide) in self.glides.iter_mut() {
            glide.elapsed += dt;
            self.presentation
                .set_visual_position(*visual, glide.current(window));
        }

        let before = self.glides.len();
        self.glides.retain(|_, glide| !glide.is_done(window));
        if before != self.glides.len() {
            debug!("{} glides finished", before - self.glides.len());
        }
    }

    /// Forgets every player, destroying their visual objects.
    pub fn reset(&mut self) {
        self.glides.clear();
        self.registry.clear(&mut self.presentation);
        self.my_name = None;
    }
}
