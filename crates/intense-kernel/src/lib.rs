//! # Intense Kernel
//!
//! Intensional contexts and the algebra of their changes.
//!
//! A context is a tree: each node may carry a base value and maps dimensions
//! to child contexts. Contexts are ordered by refinement, which is what
//! best-fit resolution runs on. Changes are [`ContextOp`] deltas that compose,
//! and an [`AEther`] is a live context whose changes are pushed to the
//! [`Participant`]s attached along the way.
//!
//! ## Architecture
//!
//! ```text
//! BaseValue, Dimension      ← Leaves and edge labels
//!     │
//! Context                   ← Owned trees, total order and refinement
//!     │
//! ContextOp                 ← Deltas: set/clear base, clear dims, compose
//!     │
//! AEther + Participant      ← Live tree, change propagation
//!     │
//! ContextDomain             ← Versions, best fit and near fits
//! ```
//!
//! [`text`] reads and writes the canonical text form; [`wire`] the binary
//! form. Both enforce the bounds in [`Limits`].

pub mod aether;
pub mod config;
pub mod context;
pub mod dimension;
pub mod domain;
pub mod error;
pub mod op;
pub mod participant;
pub mod text;
pub mod value;
pub mod wire;

pub use aether::AEther;
pub use config::{Config, Limits};
pub use context::{Context, ContextView, NodeRef};
pub use dimension::{CompoundDimension, Dimension};
pub use domain::{ContextDomain, Resolution};
pub use error::{IntenseError, Result};
pub use op::{ContextOp, clear_op};
pub use participant::{NotifyResult, Origin, Participant, ParticipantError};
pub use value::{BaseValue, Binder, BoundValue, ValueKind};
pub use wire::{Wire, WireReader, WireWriter};
