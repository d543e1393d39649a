//! Portal avoidance: keeps clicks meant for an item from landing on a nearby
//! portal label.

use crate::config::{PORTAL_MARGIN, PORTAL_METADATA};
use crate::types::{LabelId, Rect};
use crate::world::WorldView;

/// The nearest visible portal for the current pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalRef {
    pub label: LabelId,
    pub rect: Rect,
    pub distance: f32,
}

impl PortalRef {
    /// Re-read the portal from the current frame. `None` once it is gone.
    pub fn refresh<W: WorldView + ?Sized>(&self, world: &W) -> Option<PortalRef> {
        world.resolve(self.label).map(|label| PortalRef {
            label: label.id,
            rect: label.rect,
            distance: label.entity.as_ref().map_or(self.distance, |e| e.distance),
        })
    }
}

/// Nearest live label whose object metadata names the portal type.
pub fn find_portal<W: WorldView + ?Sized>(world: &W) -> Option<PortalRef> {
    world
        .labels()
        .iter()
        .filter(|label| label.is_live())
        .filter_map(|label| {
            let entity = label.entity.as_ref()?;
            entity.metadata.contains(PORTAL_METADATA).then(|| PortalRef {
                label: label.id,
                rect: label.rect,
                distance: entity.distance,
            })
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// True when both labels exist and overlap once grown by the safety margin.
pub fn is_nearby(portal: Option<&Rect>, target: Option<&Rect>) -> bool {
    let (Some(portal), Some(target)) = (portal, target) else {
        return false;
    };
    let portal = portal.inflate(PORTAL_MARGIN, PORTAL_MARGIN);
    let target = target.inflate(PORTAL_MARGIN, PORTAL_MARGIN);
    portal.intersects(&target)
}

/// Is the portal what the host would activate right now?
pub fn is_targeted<W: WorldView + ?Sized>(world: &W, portal: &PortalRef) -> bool {
    if world.hovered_element() == Some(portal.label) {
        return true;
    }
    world
        .labels()
        .iter()
        .find(|label| label.id == portal.label)
        .and_then(|label| label.entity.as_ref())
        .and_then(|entity| entity.targetable)
        .unwrap_or(false)
}
