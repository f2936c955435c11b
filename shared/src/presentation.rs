//! Seam towards whatever draws players.
//!
//! The presentation side owns visual objects; the registry only keeps their
//! handles and asks for creation and destruction explicitly.

use std::collections::HashMap;

use log::{debug, warn};

use crate::Position;

/// Non-owning reference to a visual object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisualHandle(u32);

impl VisualHandle {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

pub trait Presentation {
    fn create_visual_object(&mut self) -> VisualHandle;
    fn set_visual_position(&mut self, visual: VisualHandle, position: Position);
    fn destroy_visual_object(&mut self, visual: VisualHandle);
}

/// Presentation without a window: keeps object positions in memory and logs
/// what a renderer would draw.
#[derive(Debug, Default)]
pub struct HeadlessPresentation {
    next_id: u32,
    objects: HashMap<VisualHandle, Position>,
}

impl HeadlessPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position_of(&self, visual: VisualHandle) -> Option<Position> {
        self.objects.get(&visual).copied()
    }

    pub fn contains(&self, visual: VisualHandle) -> bool {
        self.objects.contains_key(&visual)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Presentation for HeadlessPresentation {
    fn create_visual_object(&mut self) -> VisualHandle {
        self.next_id += 1;
        let visual = VisualHandle(self.next_id);
        self.objects.insert(visual, Position::ORIGIN);
        debug!("Created visual object {}", visual.0);
        visual
    }

    fn set_visual_position(&mut self, visual: VisualHandle, position: Position) {
        match self.objects.get_mut(&visual) {
            Some(slot) => {
                *slot = position;
                debug!(
                    "Visual {} at ({:.3}, {:.3}, {:.3})",
                    visual.0, position.x, position.y, position.z
                );
            }
            None => warn!("Ignoring move of unknown visual object {}", visual.0),
        }
    }

    fn destroy_visual_object(&mut self, visual: VisualHandle) {
        if self.objects.remove(&visual).is_some() {
            debug!("Destroyed visual object {}", visual.0);
        } else {
            warn!("Visual object {} destroyed twice", visual.0);
        }
    }
}
