//! Shared value types for the camera mapper: geometry primitives, the
//! mapping requirements model, and the command catalogue with its fixed
//! on-disk JSON schema.

pub mod catalogue;
pub mod geometry;
pub mod requirements;

pub use catalogue::{
    ActionKind, ClickTarget, Command, CommandCatalogue, CommandChangeSequence, ItemKind,
    SLEEP_SAFETY_FACTOR,
};
pub use geometry::{BoundingBox, ClickableRegion, Point, RegionSource};
pub use requirements::{normalize_name, MappingRequirements, Requirement};
