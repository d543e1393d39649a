//! Click/verify/retry protocol for a single selected candidate.
//!
//! The protocol is an explicit state machine stepped once per host tick. Each
//! wait in the protocol is a [`Phase`] that yields back to the host and is
//! resumed by a later [`Interaction::step`] call:
//!
//! ```text
//! Validating -> Aiming(n) -> Settling(n) -> [Verifying(n)] -> PostClick(n) --+
//!                   ^                                                        |
//!                   +----------------------- n < 3 --------------------------+
//!                                            n = 3 -> Confirming -> Done
//! ```
//!
//! Any failed precondition or a vanished label goes straight to `Done`.

use rand::Rng;
use serde::Serialize;
use std::time::Duration;

use crate::config::{
    MAX_ATTEMPTS, MAX_CONFIRM_POLLS, PORTAL_VERIFY_DELAY, SETTLE_DELAY, WINDOW_MARGIN,
};
use crate::portal::{self, PortalRef};
use crate::snapshot::Candidate;
use crate::types::{MouseButton, Point, Rect};
use crate::world::{InputSink, WorldView};

/// Why a candidate was dropped before any input was sent for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disqualification {
    /// The live label could no longer be resolved when validating.
    Unresolved,
    /// The label centre or click point falls outside the usable window area.
    OutsideWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Disqualified(Disqualification),
    /// Label disappeared between attempts, most likely already picked up.
    Vanished,
    /// Every attempt was made.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InteractionReport {
    pub outcome: Outcome,
    /// Pointer moves made, one per attempt.
    pub attempts: u8,
    pub clicks: u8,
    /// Result of the post-attempt removal polling; `None` when it did not run.
    pub removed: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Pending,
    Finished(InteractionReport),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Validating,
    Aiming { attempt: u8 },
    Settling { attempt: u8, until: Duration },
    Verifying { attempt: u8, until: Duration },
    PostClick { attempt: u8 },
    Confirming { polls: u8 },
    Done(InteractionReport),
}

/// One pickup interaction in progress.
#[derive(Debug, Clone)]
pub struct Interaction {
    candidate: Candidate,
    portal: Option<PortalRef>,
    phase: Phase,
    attempts: u8,
    clicks: u8,
}

impl Interaction {
    pub fn new(candidate: Candidate, portal: Option<PortalRef>) -> Self {
        Self {
            candidate,
            portal,
            phase: Phase::Validating,
            attempts: 0,
            clicks: 0,
        }
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done(_))
    }

    /// Advance until the next wait point or the end of the protocol.
    pub fn step<W, I, R>(&mut self, now: Duration, world: &W, input: &mut I, rng: &mut R) -> Step
    where
        W: WorldView + ?Sized,
        I: InputSink + ?Sized,
        R: Rng,
    {
        loop {
            match self.phase {
                Phase::Validating => {
                    if world.resolve(self.candidate.label).is_none() {
                        tracing::debug!("Pick target {:?} is not valid", self.candidate.label);
                        let outcome = Outcome::Disqualified(Disqualification::Unresolved);
                        return self.finish(outcome, None);
                    }
                    let window = world.window().bounds;
                    let center = self.candidate.screen_center(&window);
                    if !usable_area(&window).contains(center) {
                        tracing::debug!(
                            "Label {:?} outside game window: centre={:?} window={:?}",
                            self.candidate.label,
                            center,
                            window
                        );
                        let outcome = Outcome::Disqualified(Disqualification::OutsideWindow);
                        return self.finish(outcome, None);
                    }
                    self.phase = Phase::Aiming { attempt: 0 };
                }

                Phase::Aiming { attempt } => {
                    let Some(label) = world.resolve(self.candidate.label) else {
                        if attempt > 0 {
                            tracing::debug!(
                                "Label {:?} gone, probably already picked",
                                self.candidate.label
                            );
                        } else {
                            tracing::debug!("Label {:?} not found", self.candidate.label);
                        }
                        return self.finish(Outcome::Vanished, None);
                    };

                    let rect = label.rect;
                    let window = world.window().bounds;
                    let local = if self.portal_nearby(world, Some(&rect)) {
                        random_point(&rect, rng)
                    } else {
                        rect.center()
                    };
                    let point = local.offset(window.top_left());

                    if !usable_area(&window).contains(point) {
                        tracing::debug!("Click point {:?} outside game window {:?}", point, window);
                        let outcome = Outcome::Disqualified(Disqualification::OutsideWindow);
                        return self.finish(outcome, None);
                    }

                    tracing::trace!(
                        "Attempt {} on {:?}: pointer -> {:?}",
                        attempt + 1,
                        self.candidate.label,
                        point
                    );
                    input.move_pointer(point);
                    self.attempts += 1;
                    self.phase = Phase::Settling {
                        attempt,
                        until: now + SETTLE_DELAY,
                    };
                    return Step::Pending;
                }

                Phase::Settling { attempt, until } => {
                    if now < until {
                        return Step::Pending;
                    }
                    if world.is_targeted(self.candidate.label) {
                        let target = world.resolve(self.candidate.label).map(|l| l.rect);
                        let nearby = self.portal_nearby(world, target.as_ref());
                        if nearby && !self.portal_targeted(world) {
                            self.phase = Phase::Verifying {
                                attempt,
                                until: now + PORTAL_VERIFY_DELAY,
                            };
                            return Step::Pending;
                        } else if !nearby {
                            self.click(input);
                        }
                    }
                    self.phase = Phase::PostClick { attempt };
                    return Step::Pending;
                }

                Phase::Verifying { attempt, until } => {
                    if now < until {
                        return Step::Pending;
                    }
                    let target = world.resolve(self.candidate.label).map(|l| l.rect);
                    if self.portal_nearby(world, target.as_ref()) && !self.portal_targeted(world) {
                        self.click(input);
                    }
                    self.phase = Phase::PostClick { attempt };
                    return Step::Pending;
                }

                Phase::PostClick { attempt } => {
                    self.phase = if attempt + 1 < MAX_ATTEMPTS {
                        Phase::Aiming { attempt: attempt + 1 }
                    } else {
                        Phase::Confirming { polls: 0 }
                    };
                }

                Phase::Confirming { polls } => {
                    let still_there = world
                        .labels()
                        .iter()
                        .any(|l| l.id == self.candidate.label && l.visible);
                    if !still_there {
                        return self.finish(Outcome::Exhausted, Some(true));
                    }
                    if polls + 1 >= MAX_CONFIRM_POLLS {
                        return self.finish(Outcome::Exhausted, Some(false));
                    }
                    self.phase = Phase::Confirming { polls: polls + 1 };
                    return Step::Pending;
                }

                Phase::Done(report) => return Step::Finished(report),
            }
        }
    }

    fn finish(&mut self, outcome: Outcome, removed: Option<bool>) -> Step {
        let report = InteractionReport {
            outcome,
            attempts: self.attempts,
            clicks: self.clicks,
            removed,
        };
        self.phase = Phase::Done(report);
        Step::Finished(report)
    }

    fn click<I: InputSink + ?Sized>(&mut self, input: &mut I) {
        tracing::trace!("Click on {:?}", self.candidate.label);
        input.click(MouseButton::Left);
        self.clicks += 1;
    }

    fn portal_nearby<W: WorldView + ?Sized>(&self, world: &W, target: Option<&Rect>) -> bool {
        let portal = self.portal.and_then(|p| p.refresh(world));
        portal::is_nearby(portal.as_ref().map(|p| &p.rect), target)
    }

    fn portal_targeted<W: WorldView + ?Sized>(&self, world: &W) -> bool {
        self.portal.is_some_and(|p| portal::is_targeted(world, &p))
    }
}

/// Window area where clicks are allowed.
pub fn usable_area(window: &Rect) -> Rect {
    window.inflate(-WINDOW_MARGIN, -WINDOW_MARGIN)
}

/// Uniform point inside `rect`, or its centre when the rect has no usable area.
fn random_point<R: Rng>(rect: &Rect, rng: &mut R) -> Point {
    if !rect.is_finite() || rect.width <= 0.0 || rect.height <= 0.0 {
        return rect.center();
    }
    Point::new(
        rng.gen_range(rect.left()..=rect.right()),
        rng.gen_range(rect.top()..=rect.bottom()),
    )
}
