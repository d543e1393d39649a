//! Host-facing seams: the live world view, input injection, and the JSON frame
//! adapter used when the host drives the core one serialized frame at a time.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PickupError, Result};
use crate::types::{InputCommand, LabelId, MouseButton, Point, Rect};

// =============================================================================
// WORLD DATA
// =============================================================================

/// Game window geometry in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameWindow {
    pub bounds: Rect,
    pub foreground: bool,
}

/// The object lying under a ground label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundEntity {
    /// Type identifier, e.g. `Metadata/Items/Currency/CurrencyRerollRare`.
    pub path: String,
    pub metadata: String,
    /// Planar distance to the player, in grid units.
    pub distance: f32,
    pub can_pick_up: bool,
    /// Seconds left before the object may be picked up by us.
    pub pickup_cooldown_secs: f32,
    /// State of the targetable component, `None` when the object has none.
    pub targetable: Option<bool>,
}

impl Default for GroundEntity {
    fn default() -> Self {
        Self {
            path: String::new(),
            metadata: String::new(),
            distance: 0.0,
            can_pick_up: true,
            pickup_cooldown_secs: 0.0,
            targetable: None,
        }
    }
}

/// One on-screen ground label. `rect` is relative to the game window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundLabel {
    pub id: LabelId,
    pub valid: bool,
    pub visible: bool,
    /// Host reports the label as the current hover target.
    pub targeted: bool,
    pub rect: Rect,
    pub entity: Option<GroundEntity>,
}

impl Default for GroundLabel {
    fn default() -> Self {
        Self {
            id: LabelId::NULL,
            valid: true,
            visible: true,
            targeted: false,
            rect: Rect::default(),
            entity: None,
        }
    }
}

impl GroundLabel {
    pub fn is_live(&self) -> bool {
        !self.id.is_null() && self.valid && self.visible
    }

    pub fn path(&self) -> Option<&str> {
        self.entity.as_ref().map(|e| e.path.as_str())
    }
}

/// Held keys sampled by the host for this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyState {
    pub hotkey: bool,
    pub cancel: bool,
}

// =============================================================================
// COLLABORATOR TRAITS
// =============================================================================

/// Read access to the host's current world and UI state.
///
/// Everything returned is valid for the current frame only. Callers keep
/// [`LabelId`]s across ticks and resolve them again through this trait.
pub trait WorldView {
    /// Every ground label the host knows about, visible or not.
    fn labels(&self) -> &[GroundLabel];

    fn window(&self) -> GameWindow;

    /// Address of the UI element under the cursor.
    fn hovered_element(&self) -> Option<LabelId>;

    fn is_targeted(&self, label: LabelId) -> bool {
        self.resolve(label).is_some_and(|l| l.targeted)
    }

    /// Look up a live (valid and visible) label by handle.
    fn resolve(&self, label: LabelId) -> Option<&GroundLabel> {
        if label.is_null() {
            return None;
        }
        self.labels().iter().find(|l| l.id == label && l.is_live())
    }
}

/// Input injection primitives.
pub trait InputSink {
    /// Place the cursor at a screen position.
    fn move_pointer(&mut self, to: Point);

    fn click(&mut self, button: MouseButton);
}

// =============================================================================
// JSON FRAME ADAPTER
// =============================================================================

/// One host frame: clock, keys and world state, as delivered over JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSnapshot {
    /// Host monotonic clock in milliseconds.
    pub now_ms: u64,
    pub keys: KeyState,
    pub window: GameWindow,
    pub hovered: Option<LabelId>,
    pub labels: Vec<GroundLabel>,
}

impl FrameSnapshot {
    pub fn from_json(raw: &str) -> Result<Self> {
        let frame: FrameSnapshot = serde_json::from_str(raw)?;
        frame.validate()?;
        Ok(frame)
    }

    pub fn validate(&self) -> Result<()> {
        let bounds = self.window.bounds;
        if !bounds.is_finite() || bounds.width <= 0.0 || bounds.height <= 0.0 {
            return Err(PickupError::InvalidFrame(format!(
                "window bounds must be finite and positive, got {}x{}",
                bounds.width, bounds.height
            )));
        }
        if let Some(label) = self.labels.iter().find(|l| !l.rect.is_finite()) {
            return Err(PickupError::InvalidFrame(format!(
                "label {:?} has a non-finite rect {:?}",
                label.id, label.rect
            )));
        }
        Ok(())
    }

    pub fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms)
    }
}

impl WorldView for FrameSnapshot {
    fn labels(&self) -> &[GroundLabel] {
        &self.labels
    }

    fn window(&self) -> GameWindow {
        self.window
    }

    fn hovered_element(&self) -> Option<LabelId> {
        self.hovered
    }
}

/// [`InputSink`] that queues commands for the host to replay.
#[derive(Debug, Clone, Default)]
pub struct RecordedInput {
    commands: Vec<InputCommand>,
}

impl RecordedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[InputCommand] {
        &self.commands
    }

    pub fn clicks(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, InputCommand::Click { .. }))
            .count()
    }

    pub fn take(&mut self) -> Vec<InputCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl InputSink for RecordedInput {
    fn move_pointer(&mut self, to: Point) {
        self.commands.push(InputCommand::MovePointer { x: to.x, y: to.y });
    }

    fn click(&mut self, button: MouseButton) {
        self.commands.push(InputCommand::Click { button });
    }
}
