//! Declarative map style state and its reconciliation against a live map.
//!
//! The widget owns a [`StyleState`] snapshot. Every property update produces a
//! new snapshot; [`plan`] computes the minimal [`StyleOp`] sequence between the
//! two and [`apply`] executes it through a [`MapHandle`].

pub mod apply;
pub mod diff;
pub mod error;
pub mod handle;
pub mod memory;
pub mod model;
pub mod ops;
pub mod patch;

pub use apply::*;
pub use diff::*;
pub use error::*;
pub use handle::*;
pub use memory::*;
pub use model::*;
pub use ops::*;
pub use patch::{Patch, PatchError, PatchKind, PatchOp, PathSeg};
