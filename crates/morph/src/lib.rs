//! Morph targets for particle shapes.
//!
//! [`reconcile`] brings point sets of different sizes to one common count so
//! slot `i` is the same particle in every shape. [`MorphController`] then
//! hands the renderer a current buffer, a target buffer and a progress value.
//!
//! # Invariants
//! - Padding slots copy items from their own source, never from another
//!   source and never a sentinel.
//! - The per-slot size buffer is generated once and shared by all targets.
//! - Progress is driven by elapsed seconds, not frame count, and never
//!   decreases within a transition.

mod controller;
mod reconcile;

pub use controller::{Easing, MorphConfig, MorphController, MorphState};
pub use reconcile::{reconcile, AttributeBuffer, MorphError, Reconciled};

pub fn crate_info() -> &'static str {
    "flowfield-morph v0.1.0"
}
