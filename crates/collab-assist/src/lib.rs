//! Diagram assistant.
//!
//! Turns a text selection into a PlantUML snippet through an external
//! text-generation service. Stateless, and independent of the session engine.
//!
//! Provides:
//! - `DiagramGenerator` - Trait for generation backends
//! - `ChatCompletionsGenerator` - OpenAI-compatible backend
//! - `DiagramService` - Validation and fallback around a backend

pub mod chat;
pub mod diagram;

pub use chat::{ChatCompletionsGenerator, DiagramConfig};
pub use diagram::{AssistError, DiagramGenerator, DiagramService, FALLBACK_DIAGRAM};
