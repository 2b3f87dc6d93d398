//! End-to-end integration module
//!
//! The orchestration layer that connects all components of the studio
//! client: capture -> VAD controller -> upload -> clustering -> transcript,
//! plus chat streaming and backend status polling.

mod orchestrator;

pub use orchestrator::{NetEvent, Orchestrator, StudioCommand, StudioEvent, StudioHandle};
