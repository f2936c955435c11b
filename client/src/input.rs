//! Movement input sources and the outgoing message schedule

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Heartbeat, HorizontalDirection, Message, MovementIntent, VerticalDirection};
use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Produces at most one movement intent per tick
pub trait InputSource: Send {
    fn poll(&mut self) -> Option<MovementIntent>;
}

/// Observer that never moves
#[derive(Debug, Default)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn poll(&mut self) -> Option<MovementIntent> {
        None
    }
}

/// Replays a fixed list of intents, one per tick, then goes idle.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    script: VecDeque<Option<MovementIntent>>,
}

impl ScriptedInput {
    pub fn new(script: impl IntoIterator<Item = Option<MovementIntent>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Option<MovementIntent> {
        self.script.pop_front().flatten()
    }
}

/// Random walk bot
///
/// Holds a direction for a random number of ticks, then picks a new one.
/// Idle stretches are part of the walk.
pub struct WanderInput {
    rng: StdRng,
    current: MovementIntent,
    ticks_left: u32,
}

impl WanderInput {
    const MIN_HOLD_TICKS: u32 = 10;
    const MAX_HOLD_TICKS: u32 = 60;

    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            current: MovementIntent::default(),
            ticks_left: 0,
        }
    }

    fn pick_direction(&mut self) {
        let horizontal = match self.rng.gen_range(0..3) {
            0 => HorizontalDirection::None,
            1 => HorizontalDirection::Left,
            _ => HorizontalDirection::Right,
        };
        let vertical = match self.rng.gen_range(0..3) {
            0 => VerticalDirection::None,
            1 => VerticalDirection::Up,
            _ => VerticalDirection::Down,
        };
        self.current = MovementIntent::new(horizontal, vertical);
        self.ticks_left = self
            .rng
            .gen_range(Self::MIN_HOLD_TICKS..=Self::MAX_HOLD_TICKS);
    }
}

impl Default for WanderInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for WanderInput {
    fn poll(&mut self) -> Option<MovementIntent> {
        if self.ticks_left == 0 {
            self.pick_direction();
        }
        self.ticks_left -= 1;

        (!self.current.is_idle()).then_some(self.current)
    }
}

/// Turns polled input into outgoing messages
///
/// Every non-idle intent is sent. When nothing has been sent for the
/// heartbeat interval a `Heartbeat` keeps the connection alive.
pub struct InputManager {
    source: Box<dyn InputSource>,
    heartbeat_interval: Duration,
    last_sent: Instant,
    intents_sent: u64,
}

impl InputManager {
    pub fn new(source: Box<dyn InputSource>, heartbeat_interval: Duration) -> Self {
        Self {
            source,
            heartbeat_interval,
            last_sent: Instant::now(),
            intents_sent: 0,
        }
    }

    /// Polls the source once and returns the message to send this tick, if any.
    pub fn update(&mut self) -> Option<Message> {
        self.update_at(Instant::now())
    }

    fn update_at(&mut self, now: Instant) -> Option<Message> {
        let message = match self.source.poll().filter(|intent| !intent.is_idle()) {
            Some(intent) => {
                self.intents_sent += 1;
                Message::UserCmdMove(intent)
            }
            None if now.duration_since(self.last_sent) >= self.heartbeat_interval => {
                Message::Heartbeat(Heartbeat {
                    timestamp_ms: Self::get_timestamp(),
                })
            }
            None => return None,
        };

        self.last_sent = now;
        Some(message)
    }

    pub fn intents_sent(&self) -> u64 {
        self.intents_sent
    }

    fn get_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn left_up() -> MovementIntent {
        MovementIntent::new(HorizontalDirection::Left, VerticalDirection::Up)
    }

    #[test]
    fn test_idle_input_never_moves() {
        let mut input = IdleInput;
        assert!((0..100).all(|_| input.poll().is_none()));
    }

    #[test]
    fn test_scripted_input_plays_in_order() {
        let mut input =
            ScriptedInput::new([Some(left_up()), None, Some(MovementIntent::default())]);

        assert_eq!(input.poll(), Some(left_up()));
        assert_eq!(input.poll(), None);
        assert_eq!(input.remaining(), 1);
        assert_eq!(input.poll(), Some(MovementIntent::default()));
        assert_eq!(input.poll(), None);
    }

    #[test]
    fn test_wander_input_is_deterministic_per_seed() {
        let mut a = WanderInput::with_seed(42);
        let mut b = WanderInput::with_seed(42);

        let run_a: Vec<_> = (0..200).map(|_| a.poll()).collect();
        let run_b: Vec<_> = (0..200).map(|_| b.poll()).collect();

        assert_eq!(run_a, run_b);
        assert!(run_a.iter().all(|i| i.map_or(true, |i| !i.is_idle())));
    }

    #[test]
    fn test_wander_input_eventually_moves() {
        let mut input = WanderInput::with_seed(7);
        assert!((0..1000).any(|_| input.poll().is_some()));
    }

    #[test]
    fn test_manager_sends_every_intent() {
        let source = ScriptedInput::new([Some(left_up()), Some(left_up())]);
        let mut manager = InputManager::new(Box::new(source), Duration::from_secs(60));

        assert_eq!(manager.update(), Some(Message::UserCmdMove(left_up())));
        assert_eq!(manager.update(), Some(Message::UserCmdMove(left_up())));
        assert_eq!(manager.update(), None);
        assert_eq!(manager.intents_sent(), 2);
    }

    #[test]
    fn test_manager_never_sends_idle_intent() {
        let source = ScriptedInput::new([Some(MovementIntent::default())]);
        let mut manager = InputManager::new(Box::new(source), Duration::from_secs(60));

        assert_eq!(manager.update(), None);
        assert_eq!(manager.intents_sent(), 0);
    }

    #[test]
    fn test_manager_heartbeat_after_silence() {
        let mut manager = InputManager::new(Box::new(IdleInput), Duration::from_millis(500));
        let start = manager.last_sent;

        assert_eq!(manager.update_at(start + Duration::from_millis(100)), None);
        assert!(matches!(
            manager.update_at(start + Duration::from_millis(600)),
            Some(Message::Heartbeat(_))
        ));
        // The heartbeat restarts the silence window.
        assert_eq!(manager.update_at(start + Duration::from_millis(700)), None);
    }
}
