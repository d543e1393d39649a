//! Ranked, time-cached view of pickable ground labels.

use rayon::prelude::*;
use std::time::Duration;

use crate::config::{MARKER_PATH, SNAPSHOT_TTL};
use crate::types::{LabelId, Point, Rect};
use crate::weights::WeightTable;
use crate::world::{GroundEntity, GroundLabel, WorldView};

/// A pickable object, scored at the time of the last rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub label: LabelId,
    pub path: String,
    pub distance: f32,
    pub weight: i32,
    /// Label rectangle relative to the game window, as seen at rebuild time.
    pub screen_rect: Rect,
    pub is_marker: bool,
}

impl Candidate {
    /// Cached label centre translated into screen coordinates.
    pub fn screen_center(&self, window: &Rect) -> Point {
        self.screen_rect.center().offset(window.top_left())
    }
}

/// Candidate list rebuilt from the world at most once per TTL.
#[derive(Debug)]
pub struct CandidateSnapshot {
    ttl: Duration,
    last_build: Option<Duration>,
    cached: Vec<Candidate>,
}

impl Default for CandidateSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateSnapshot {
    pub fn new() -> Self {
        Self {
            ttl: SNAPSHOT_TTL,
            last_build: None,
            cached: Vec::new(),
        }
    }

    /// Candidates sorted nearest first. Rebuilds only once the TTL has run out.
    pub fn get<W: WorldView + ?Sized>(
        &mut self,
        now: Duration,
        world: &W,
        weights: &WeightTable,
    ) -> &[Candidate] {
        let stale = match self.last_build {
            Some(built) => now.saturating_sub(built) >= self.ttl,
            None => true,
        };
        if stale {
            self.cached = build_candidates(world, weights);
            self.last_build = Some(now);
            tracing::debug!("Candidate snapshot rebuilt: {} candidates", self.cached.len());
        }
        &self.cached
    }

    pub fn last_build(&self) -> Option<Duration> {
        self.last_build
    }
}

fn build_candidates<W: WorldView + ?Sized>(world: &W, weights: &WeightTable) -> Vec<Candidate> {
    let window = world.window().bounds;

    let mut candidates: Vec<Candidate> = world
        .labels()
        .par_iter()
        .filter_map(|label| {
            let entity = admit(label, &window)?;
            Some(Candidate {
                label: label.id,
                path: entity.path.clone(),
                distance: entity.distance,
                weight: weights.weight_of(&entity.path),
                screen_rect: label.rect,
                is_marker: entity.path == MARKER_PATH,
            })
        })
        .collect();

    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    candidates
}

/// Eligibility rule. Marker objects skip every other check; they only need an
/// object to read the path from.
fn admit<'a>(label: &'a GroundLabel, window: &Rect) -> Option<&'a GroundEntity> {
    let entity = label.entity.as_ref()?;
    if entity.path == MARKER_PATH {
        return Some(entity);
    }

    let center = label.rect.center().offset(window.top_left());
    let eligible = !label.id.is_null()
        && label.valid
        && !entity.path.is_empty()
        && label.visible
        && window.contains(center)
        && entity.can_pick_up
        && entity.pickup_cooldown_secs <= 0.0;

    eligible.then_some(entity)
}
