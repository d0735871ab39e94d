//! Cover Engine - geometric cover resolution and cover aggregate bookkeeping
//! for tabletop combat

pub mod core;
pub mod cover;
pub mod scene;
pub mod spatial;
