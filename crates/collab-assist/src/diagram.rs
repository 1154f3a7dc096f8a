//! Diagram generation with a static fallback.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Returned whenever no usable diagram could be generated.
pub const FALLBACK_DIAGRAM: &str = "@startuml
Alice -> Bob: Hello
Bob --> Alice: I got your message
@enduml";

/// Assistant error.
#[derive(Debug, Error)]
pub enum AssistError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("No choices returned")]
    EmptyResponse,
}

/// Trait for diagram generation backends.
#[async_trait]
pub trait DiagramGenerator: Send + Sync {
    /// Produce PlantUML source describing `selected_text`.
    async fn generate(&self, selected_text: &str) -> Result<String, AssistError>;
}

/// Whether `code` looks like a complete PlantUML snippet.
#[must_use]
pub fn is_valid_plantuml(code: &str) -> bool {
    code.contains("@startuml") && code.contains("@enduml")
}

/// Diagram service that never fails: backend errors and malformed output
/// fall back to [`FALLBACK_DIAGRAM`].
#[derive(Clone, Default)]
pub struct DiagramService {
    generator: Option<Arc<dyn DiagramGenerator>>,
}

impl DiagramService {
    #[must_use]
    pub fn new(generator: Arc<dyn DiagramGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Service without a backend; always answers with the fallback.
    #[must_use]
    pub fn fallback_only() -> Self {
        Self { generator: None }
    }

    #[must_use]
    pub fn has_backend(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn generate_diagram(&self, selected_text: &str) -> String {
        if selected_text.trim().is_empty() {
            return FALLBACK_DIAGRAM.to_string();
        }
        let Some(generator) = &self.generator else {
            return FALLBACK_DIAGRAM.to_string();
        };

        match generator.generate(selected_text).await {
            Ok(code) if is_valid_plantuml(&code) => code,
            Ok(_) => {
                tracing::warn!("Generated diagram is not valid PlantUML, using fallback");
                FALLBACK_DIAGRAM.to_string()
            }
            Err(e) => {
                tracing::error!(error = %e, "Diagram generation failed, using fallback");
                FALLBACK_DIAGRAM.to_string()
            }
        }
    }
}
