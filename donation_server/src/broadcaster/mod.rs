//! Realtime fan-out for live campaign viewers.
//!
//! One logical actor per campaign owns that campaign's connection set, so accept, deregister and broadcast are
//! serialized without locks. Actors are spawned on the first viewer, evict themselves when their set empties, and
//! are respawned lazily by the registry. Nothing here persists: a reconnecting client simply re-registers.

mod actor;
mod registry;

pub use actor::{CampaignBroadcaster, Command, ConnectionClosed, LiveConnection};
pub use registry::BroadcasterRegistry;
