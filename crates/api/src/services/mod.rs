//! Application services and external integrations.

pub mod chat_hub;
pub mod evaluation;
pub mod gemini;
pub mod generation;
pub mod generator;
pub mod profile;
pub mod profile_events;

pub use chat_hub::{ChatHub, MessageSubscription};
pub use evaluation::{EvaluationError, EvaluationService};
pub use gemini::GeminiClient;
pub use generation::{ContentError, ContentGenerator};
pub use generator::{GenerationError, GenerationParams, TextGenerator};
pub use profile::ProfileService;
pub use profile_events::ProfileEvents;
