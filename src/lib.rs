//! Pickup Core - ground item selection and click protocol for the pickup agent
//!
//! Each host tick:
//! - Rank visible ground labels (cached for 500ms)
//! - Select the nearest in-range target
//! - Run the move/verify/click/retry sequence, steering clear of portals
//!
//! The host supplies world state through [`WorldView`] and receives input through
//! [`InputSink`]. With the `python` feature the crate also builds as a Python
//! extension module that exchanges JSON frames.

pub mod config;
pub mod driver;
pub mod error;
pub mod interaction;
pub mod logging;
pub mod portal;
pub mod snapshot;
pub mod types;
pub mod weights;
pub mod world;

#[cfg(feature = "python")]
mod python;

pub use config::PickupConfig;
pub use driver::{HostEvent, PassOutcome, PassReport, TickDriver, TickReport};
pub use error::{PickupError, Result};
pub use interaction::{Interaction, InteractionReport, Outcome};
pub use snapshot::{Candidate, CandidateSnapshot};
pub use types::{InputCommand, LabelId, MouseButton, Point, Rect};
pub use weights::WeightTable;
pub use world::{
    FrameSnapshot, GameWindow, GroundEntity, GroundLabel, InputSink, KeyState, RecordedInput,
    WorldView,
};
