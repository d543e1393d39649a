//! Per-tick orchestration: activation state, idle hysteresis, and the pickup
//! cycle (select a candidate, interact with it, wait, repeat).

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::str::FromStr;
use std::time::Duration;

use crate::config::{PickupConfig, IDLE_PROMOTION};
use crate::error;
use crate::interaction::{usable_area, Interaction, InteractionReport, Step};
use crate::portal;
use crate::snapshot::CandidateSnapshot;
use crate::types::LabelId;
use crate::weights::WeightTable;
use crate::world::{InputSink, KeyState, WorldView};

/// Activation events sent by other host components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum HostEvent {
    StartPickIt,
    EndPickIt,
}

// =============================================================================
// PICKUP CYCLE
// =============================================================================

#[derive(Debug)]
enum CycleState {
    Selecting,
    Interacting(Box<Interaction>),
    Waiting { until: Duration },
}

/// The resumable pickup loop. Paused and resumed by the driver; once finished
/// it never runs again and must be replaced.
#[derive(Debug)]
struct PickupCycle {
    state: CycleState,
    paused: bool,
    finished: bool,
}

impl PickupCycle {
    fn new() -> Self {
        Self {
            state: CycleState::Selecting,
            paused: true,
            finished: false,
        }
    }

    fn is_running(&self) -> bool {
        !self.paused && !self.finished
    }

    fn phase(&self) -> CyclePhase {
        if self.finished {
            return CyclePhase::Finished;
        }
        if self.paused {
            return CyclePhase::Paused;
        }
        match self.state {
            CycleState::Selecting => CyclePhase::Selecting,
            CycleState::Interacting(_) => CyclePhase::Interacting,
            CycleState::Waiting { .. } => CyclePhase::Waiting,
        }
    }
}

// =============================================================================
// REPORTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Paused,
    Selecting,
    Interacting,
    Waiting,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PassOutcome {
    /// Game window did not have input focus.
    NotForeground,
    /// Neither the activation flag nor the hotkey was set when selecting.
    Inactive,
    NoCandidate,
    Interacted {
        label: LabelId,
        path: String,
        report: InteractionReport,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    /// Sequence number of the pass since the driver was created.
    pub pass: u64,
    pub outcome: PassOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub active: bool,
    pub phase: CyclePhase,
    pub fully_idle: bool,
    /// Set on the tick a pass completes.
    pub pass: Option<PassReport>,
}

// =============================================================================
// DRIVER
// =============================================================================

pub struct TickDriver {
    config: PickupConfig,
    weights: WeightTable,
    snapshot: CandidateSnapshot,
    cycle: PickupCycle,
    rng: StdRng,
    enabled: bool,
    full_work: bool,
    /// Idle stopwatch start; `None` while reset.
    idle_since: Option<Duration>,
    passes: u64,
}

impl TickDriver {
    pub fn new(config: PickupConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic click jitter, for replays and tests.
    pub fn with_seed(config: PickupConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: PickupConfig, rng: StdRng) -> Self {
        let weights = WeightTable::from(config.weights.clone());
        Self {
            config,
            weights,
            snapshot: CandidateSnapshot::new(),
            cycle: PickupCycle::new(),
            rng,
            enabled: false,
            full_work: true,
            idle_since: None,
            passes: 0,
        }
    }

    pub fn weights_mut(&mut self) -> &mut WeightTable {
        &mut self.weights
    }

    /// Change the wait between passes. Rejected values leave the current one in place.
    pub fn set_extra_delay(&mut self, ms: u64) -> error::Result<()> {
        PickupConfig::check_extra_delay(ms)?;
        self.config.extra_delay_ms = ms;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            tracing::info!("Pickup {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
    }

    /// Apply a host event by id. Returns false for ids this driver ignores.
    pub fn handle_event(&mut self, event_id: &str) -> bool {
        match HostEvent::from_str(event_id) {
            Ok(HostEvent::StartPickIt) => self.set_enabled(true),
            Ok(HostEvent::EndPickIt) => self.set_enabled(false),
            Err(_) => return false,
        }
        true
    }

    /// Finish the current cycle instance, as the host does before a hot reload.
    pub fn shutdown(&mut self) {
        self.cycle.finished = true;
    }

    /// Run one scheduler tick.
    pub fn tick<W, I>(
        &mut self,
        now: Duration,
        keys: KeyState,
        world: &W,
        input: &mut I,
    ) -> TickReport
    where
        W: WorldView + ?Sized,
        I: InputSink + ?Sized,
    {
        if keys.cancel {
            if self.enabled {
                tracing::info!("Cancel key pressed, pickup disabled");
            }
            self.enabled = false;
            self.cycle.paused = true;
        }

        if self.enabled || keys.hotkey {
            self.idle_since = Some(now);
            if self.cycle.finished {
                tracing::info!("Pickup cycle was replaced, re-acquiring");
                self.cycle = PickupCycle::new();
            }
            self.cycle.paused = false;
            self.full_work = false;
        } else if self.full_work {
            self.cycle.paused = true;
            self.idle_since = None;
        }

        if self
            .idle_since
            .is_some_and(|start| now.saturating_sub(start) > IDLE_PROMOTION)
        {
            self.full_work = true;
            self.idle_since = None;
        }

        let pass = if self.cycle.is_running() {
            self.resume_cycle(now, self.enabled || keys.hotkey, world, input)
        } else {
            None
        };

        TickReport {
            active: self.enabled,
            phase: self.cycle.phase(),
            fully_idle: self.full_work,
            pass,
        }
    }

    fn resume_cycle<W, I>(
        &mut self,
        now: Duration,
        active: bool,
        world: &W,
        input: &mut I,
    ) -> Option<PassReport>
    where
        W: WorldView + ?Sized,
        I: InputSink + ?Sized,
    {
        loop {
            match self.cycle.state {
                CycleState::Selecting => match self.select(now, active, world) {
                    Ok(interaction) => {
                        self.cycle.state = CycleState::Interacting(Box::new(interaction));
                    }
                    Err(outcome) => return Some(self.end_pass(now, outcome)),
                },

                CycleState::Interacting(ref mut interaction) => {
                    let step = interaction.step(now, world, input, &mut self.rng);
                    let Step::Finished(report) = step else {
                        return None;
                    };
                    let candidate = interaction.candidate();
                    let outcome = PassOutcome::Interacted {
                        label: candidate.label,
                        path: candidate.path.clone(),
                        report,
                    };
                    self.full_work = true;
                    return Some(self.end_pass(now, outcome));
                }

                CycleState::Waiting { until } => {
                    if now < until {
                        return None;
                    }
                    self.cycle.state = CycleState::Selecting;
                }
            }
        }
    }

    /// Pick the pass target, or say why there is none.
    fn select<W: WorldView + ?Sized>(
        &mut self,
        now: Duration,
        active: bool,
        world: &W,
    ) -> Result<Interaction, PassOutcome> {
        let window = world.window();
        if !window.foreground {
            return Err(PassOutcome::NotForeground);
        }

        let portal = portal::find_portal(world);
        let area = usable_area(&window.bounds);
        let range = self.config.pickup_range;
        let candidate = self
            .snapshot
            .get(now, world, &self.weights)
            .iter()
            .find(|c| c.distance < range && area.contains(c.screen_center(&window.bounds)))
            .cloned();

        if !active {
            return Err(PassOutcome::Inactive);
        }
        let Some(candidate) = candidate else {
            self.full_work = true;
            return Err(PassOutcome::NoCandidate);
        };

        tracing::debug!(
            "Selected {:?} ({}) at distance {:.1}, portal nearby candidate: {}",
            candidate.label,
            candidate.path,
            candidate.distance,
            portal.is_some()
        );
        Ok(Interaction::new(candidate, portal))
    }

    fn end_pass(&mut self, now: Duration, outcome: PassOutcome) -> PassReport {
        self.passes += 1;
        self.cycle.state = CycleState::Waiting {
            until: now + self.config.extra_delay(),
        };
        PassReport {
            pass: self.passes,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::Outcome;
    use crate::types::{InputCommand, Point, Rect};
    use crate::world::{FrameSnapshot, GameWindow, GroundEntity, GroundLabel, RecordedInput};

    fn label(id: u64, distance: f32, rect: Rect) -> GroundLabel {
        GroundLabel {
            id: LabelId(id),
            rect,
            entity: Some(GroundEntity {
                path: format!("Metadata/Items/Test/{id}"),
                distance,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn world(labels: Vec<GroundLabel>) -> FrameSnapshot {
        FrameSnapshot {
            window: GameWindow {
                bounds: Rect::new(0.0, 0.0, 800.0, 600.0),
                foreground: true,
            },
            labels,
            ..Default::default()
        }
    }

    fn config(range: f32) -> PickupConfig {
        PickupConfig {
            pickup_range: range,
            ..Default::default()
        }
    }

    fn first_move(input: &RecordedInput) -> Option<Point> {
        input.commands().iter().find_map(|c| match c {
            InputCommand::MovePointer { x, y } => Some(Point::new(*x, *y)),
            _ => None,
        })
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_selects_nearest_in_range() {
        let world = world(vec![
            label(1, 5.0, Rect::new(100.0, 100.0, 40.0, 20.0)),
            label(2, 2.0, Rect::new(300.0, 100.0, 40.0, 20.0)),
            label(3, 8.0, Rect::new(500.0, 100.0, 40.0, 20.0)),
        ]);
        let mut driver = TickDriver::with_seed(config(6.0), 1);
        driver.set_enabled(true);
        let mut input = RecordedInput::new();

        driver.tick(ms(0), KeyState::default(), &world, &mut input);

        assert_eq!(first_move(&input), Some(Point::new(320.0, 110.0)));
    }

    #[test]
    fn test_skips_nearest_inside_window_margin() {
        let world = world(vec![
            label(1, 5.0, Rect::new(100.0, 100.0, 40.0, 20.0)),
            // Centre x = 20: inside the window, but within the 36px margin.
            label(2, 2.0, Rect::new(0.0, 100.0, 40.0, 20.0)),
            label(3, 8.0, Rect::new(500.0, 100.0, 40.0, 20.0)),
        ]);
        let mut driver = TickDriver::with_seed(config(6.0), 1);
        driver.set_enabled(true);
        let mut input = RecordedInput::new();

        driver.tick(ms(0), KeyState::default(), &world, &mut input);

        assert_eq!(first_move(&input), Some(Point::new(120.0, 110.0)));
    }

    #[test]
    fn test_out_of_range_never_selected() {
        let world = world(vec![
            label(2, 2.0, Rect::new(0.0, 100.0, 40.0, 20.0)),
            label(3, 8.0, Rect::new(500.0, 100.0, 40.0, 20.0)),
        ]);
        let mut driver = TickDriver::with_seed(config(6.0), 1);
        driver.weights_mut().set("Metadata/Items/Test/3", 1_000);
        driver.set_enabled(true);
        let mut input = RecordedInput::new();

        let report = driver.tick(ms(0), KeyState::default(), &world, &mut input);

        assert!(input.commands().is_empty());
        assert_eq!(report.pass.map(|p| p.outcome), Some(PassOutcome::NoCandidate));
        assert!(report.fully_idle);
    }

    #[test]
    fn test_not_foreground_skips_pass() {
        let mut world = world(vec![label(1, 1.0, Rect::new(100.0, 100.0, 40.0, 20.0))]);
        world.window.foreground = false;
        let mut driver = TickDriver::with_seed(config(6.0), 1);
        let mut input = RecordedInput::new();
        let hotkey = KeyState {
            hotkey: true,
            cancel: false,
        };

        let report = driver.tick(ms(0), hotkey, &world, &mut input);

        assert!(input.commands().is_empty());
        assert_eq!(report.pass.map(|p| p.outcome), Some(PassOutcome::NotForeground));

        // Focus comes back: the next pass runs without extra backoff.
        world.window.foreground = true;
        driver.tick(ms(16), hotkey, &world, &mut input);
        assert!(first_move(&input).is_some());
    }

    #[test]
    fn test_cancel_clears_active_even_with_hotkey() {
        let world = world(vec![]);
        let mut driver = TickDriver::with_seed(config(6.0), 1);
        driver.set_enabled(true);
        let mut input = RecordedInput::new();

        let both = KeyState {
            hotkey: true,
            cancel: true,
        };
        let report = driver.tick(ms(0), both, &world, &mut input);
        assert!(!report.active);
        assert!(!driver.is_active());

        // Releasing both keys leaves automation off.
        driver.tick(ms(16), KeyState::default(), &world, &mut input);
        assert!(!driver.is_active());
    }

    #[test]
    fn test_idle_hysteresis_keeps_cycle_running() {
        let world = world(vec![label(1, 1.0, Rect::new(100.0, 100.0, 40.0, 20.0))]);
        let mut driver = TickDriver::with_seed(config(6.0), 1);
        let mut input = RecordedInput::new();
        let hotkey = KeyState {
            hotkey: true,
            cancel: false,
        };

        let report = driver.tick(ms(0), hotkey, &world, &mut input);
        assert_eq!(report.phase, CyclePhase::Interacting);

        // Released mid-interaction: keeps working until 300ms of inactivity.
        let report = driver.tick(ms(10), KeyState::default(), &world, &mut input);
        assert_ne!(report.phase, CyclePhase::Paused);
        assert!(!report.fully_idle);

        let report = driver.tick(ms(301), KeyState::default(), &world, &mut input);
        assert!(report.fully_idle);

        let report = driver.tick(ms(320), KeyState::default(), &world, &mut input);
        assert_eq!(report.phase, CyclePhase::Paused);
    }

    #[test]
    fn test_inactive_pass_does_not_interact() {
        let mut world = world(vec![label(1, 1.0, Rect::new(100.0, 100.0, 40.0, 20.0))]);
        world.window.foreground = false;
        let mut driver = TickDriver::with_seed(config(6.0), 1);
        let mut input = RecordedInput::new();

        // An unfocused pass does not count as full work, so the cycle keeps running
        // after the hotkey is released and its next pass finds automation off.
        let hotkey = KeyState {
            hotkey: true,
            cancel: false,
        };
        driver.tick(ms(0), hotkey, &world, &mut input);
        world.window.foreground = true;
        let report = driver.tick(ms(10), KeyState::default(), &world, &mut input);

        assert_eq!(report.pass.map(|p| p.outcome), Some(PassOutcome::Inactive));
        assert!(input.commands().is_empty());
    }

    #[test]
    fn test_extra_delay_between_passes() {
        let mut target = label(1, 1.0, Rect::new(100.0, 100.0, 40.0, 20.0));
        target.targeted = true;
        let world = world(vec![target]);
        let mut driver = TickDriver::with_seed(
            PickupConfig {
                pickup_range: 6.0,
                extra_delay_ms: 50,
                ..Default::default()
            },
            1,
        );
        driver.set_enabled(true);
        let mut input = RecordedInput::new();

        let mut finished_at = None;
        for now in 0..200u64 {
            let report = driver.tick(ms(now), KeyState::default(), &world, &mut input);
            if let Some(pass) = report.pass {
                let PassOutcome::Interacted { label, report, .. } = &pass.outcome else {
                    panic!("unexpected pass outcome {:?}", pass.outcome);
                };
                assert_eq!(*label, LabelId(1));
                assert_eq!(report.outcome, Outcome::Exhausted);
                assert_eq!(report.clicks, 3);
                finished_at = Some(now);
                break;
            }
        }
        let finished_at = finished_at.expect("pass should finish");
        assert_eq!(input.clicks(), 3);

        let moves_before = input.commands().len();
        for now in finished_at + 1..finished_at + 50 {
            driver.tick(ms(now), KeyState::default(), &world, &mut input);
        }
        assert_eq!(input.commands().len(), moves_before);

        driver.tick(ms(finished_at + 50), KeyState::default(), &world, &mut input);
        assert!(input.commands().len() > moves_before);
    }

    #[test]
    fn test_shutdown_reacquires_cycle() {
        let world = world(vec![label(1, 1.0, Rect::new(100.0, 100.0, 40.0, 20.0))]);
        let mut driver = TickDriver::with_seed(config(6.0), 1);
        let mut input = RecordedInput::new();

        driver.shutdown();
        let report = driver.tick(ms(0), KeyState::default(), &world, &mut input);
        assert_eq!(report.phase, CyclePhase::Finished);

        let hotkey = KeyState {
            hotkey: true,
            cancel: false,
        };
        let report = driver.tick(ms(16), hotkey, &world, &mut input);
        assert_eq!(report.phase, CyclePhase::Interacting);
        assert!(first_move(&input).is_some());
    }

    #[test]
    fn test_host_events() {
        let mut driver = TickDriver::with_seed(PickupConfig::default(), 1);
        assert!(driver.handle_event("start_pick_it"));
        assert!(driver.is_active());
        assert!(driver.handle_event("end_pick_it"));
        assert!(!driver.is_active());
        assert!(!driver.handle_event("toggle_everything"));
        assert_eq!(HostEvent::StartPickIt.as_ref(), "start_pick_it");
    }

    #[test]
    fn test_extra_delay_update_is_bounded() {
        let mut driver = TickDriver::with_seed(PickupConfig::default(), 1);
        driver.set_extra_delay(250).unwrap();
        assert_eq!(driver.config.extra_delay(), ms(250));

        assert!(matches!(
            driver.set_extra_delay(60_000),
            Err(error::PickupError::InvalidConfig(_))
        ));
        assert_eq!(driver.config.extra_delay_ms, 250);
    }
}
