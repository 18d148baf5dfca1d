//! # Vigil Core
//!
//! Core library for tracking which JSON-RPC node backends are safe to serve from.
//!
//! This crate provides the foundational components for:
//!
//! - **[`backend`]**: Backend handles and the JSON-RPC transport used to probe them, behind a
//!   semaphore-capped shared HTTP client.
//!
//! - **[`consensus`]**: Per-backend health polling, agreement on `latest`/`safe`/`finalized`
//!   heights, consensus-group selection and the latched fallback mode.
//!
//! - **[`config`]**: Layered configuration loading (defaults, TOML file, environment).
//!
//! - **[`types`]**: Block references, sync status, priority classes and hex helpers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         BackendGroup                         │
//! │  ┌────────────────┐  ┌────────────────────┐  ┌─────────────┐ │
//! │  │ ConsensusPoller│  │GroupConsensusResolv│  │FallbackLatch│ │
//! │  └───────┬────────┘  └─────────┬──────────┘  └──────┬──────┘ │
//! │          │                     │                    │        │
//! │  ┌───────▼────────┐  ┌─────────▼──────────┐         │        │
//! │  │  BackendState  │─►│ ConsensusSnapshot  │◄────────┘        │
//! │  │   (per slot)   │  │    (ArcSwap)       │                  │
//! │  └────────────────┘  └────────────────────┘                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Round Flow
//!
//! ```text
//! ConsensusDriver tick
//!       │
//!       ▼
//! ┌─────────────┐
//! │ Poll (all)  │ ─── probe failure ──► healthy = false
//! └──────┬──────┘
//!        │ barrier
//!        ▼
//! ┌─────────────┐
//! │   Resolve   │ ─── no healthy primary ──► latch Fallback
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │   Publish   │ ─── changed ──► listeners
//! └─────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod consensus;
pub mod types;

pub use backend::{Backend, BackendOptions};
pub use consensus::{BackendGroup, ConsensusDriver, ConsensusSnapshot, TrackerError, TrackerSettings};
