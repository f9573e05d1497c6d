//! Topic and quiz generation.

use std::sync::Arc;

use chrono::Utc;
use domain::models::difficulty::Difficulty;
use domain::models::generation::{GeneratedTopic, GenerateQuizItemsResponse};
use domain::services::prompts::{
    quiz_prompt, quiz_response_schema, topic_prompt, QUIZ_MAX_OUTPUT_TOKENS,
    TOPIC_MAX_OUTPUT_TOKENS, TOPIC_TEMPERATURE,
};
use domain::services::{parse_quiz_items, parse_topic, QuizParseError, TopicParseError};
use persistence::repositories::AptitudeQuestionRepository;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

use super::generator::{GenerationError, GenerationParams, TextGenerator};
use crate::middleware::metrics::record_generation;

/// Sampling temperature for quiz items.
const QUIZ_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("{source}")]
    Topic { source: TopicParseError, raw: String },

    #[error("{source}")]
    Quiz { source: QuizParseError, raw: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ContentError {
    fn outcome(&self) -> &'static str {
        match self {
            ContentError::Generation(GenerationError::NotConfigured) => "not_configured",
            ContentError::Generation(_) => "upstream_error",
            ContentError::Topic { .. } | ContentError::Quiz { .. } => "invalid_output",
            ContentError::Database(_) => "database_error",
        }
    }
}

pub struct ContentGenerator {
    pool: PgPool,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl ContentGenerator {
    pub fn new(pool: PgPool, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { pool, generator }
    }

    fn generator(&self) -> Result<&dyn TextGenerator, GenerationError> {
        self.generator
            .as_deref()
            .ok_or(GenerationError::NotConfigured)
    }

    /// A discussion topic with up to three talking points.
    pub async fn topic(
        &self,
        category: &str,
        difficulty: Difficulty,
    ) -> Result<GeneratedTopic, ContentError> {
        let result = self.generate_topic(category, difficulty).await;
        finish("topic", &result);
        result
    }

    async fn generate_topic(
        &self,
        category: &str,
        difficulty: Difficulty,
    ) -> Result<GeneratedTopic, ContentError> {
        let category = category.trim();
        let raw = self
            .generator()?
            .generate(
                &topic_prompt(category, difficulty),
                &GenerationParams::text(TOPIC_TEMPERATURE, TOPIC_MAX_OUTPUT_TOKENS),
            )
            .await?;

        let parsed = parse_topic(&raw).map_err(|source| ContentError::Topic { source, raw })?;

        Ok(GeneratedTopic {
            topic: parsed.topic,
            supporting_points: parsed.supporting_points,
            category: category.to_string(),
            difficulty,
            generated_at: Utc::now(),
        })
    }

    /// Generates quiz items, dropping malformed ones. With `persist`, the
    /// accepted items are added to the question bank.
    pub async fn quiz_items(
        &self,
        count: u32,
        persist: bool,
    ) -> Result<GenerateQuizItemsResponse, ContentError> {
        let result = self.generate_quiz_items(count, persist).await;
        finish("quiz", &result);
        result
    }

    async fn generate_quiz_items(
        &self,
        count: u32,
        persist: bool,
    ) -> Result<GenerateQuizItemsResponse, ContentError> {
        let raw = self
            .generator()?
            .generate(
                &quiz_prompt(count),
                &GenerationParams::json(
                    QUIZ_TEMPERATURE,
                    QUIZ_MAX_OUTPUT_TOKENS,
                    quiz_response_schema(),
                ),
            )
            .await?;

        let validated =
            parse_quiz_items(&raw).map_err(|source| ContentError::Quiz { source, raw })?;

        if validated.rejected > 0 {
            warn!(
                accepted = validated.items.len(),
                rejected = validated.rejected,
                "Dropped malformed quiz items"
            );
        }

        if persist {
            let stored = AptitudeQuestionRepository::new(self.pool.clone())
                .insert_many(&validated.items)
                .await?;
            info!(stored = stored.len(), "Generated quiz items added to question bank");
        }

        Ok(GenerateQuizItemsResponse {
            count: validated.items.len(),
            data: validated.items,
            rejected: validated.rejected,
            persisted: persist,
        })
    }
}

fn finish<T>(kind: &'static str, result: &Result<T, ContentError>) {
    match result {
        Ok(_) => record_generation(kind, "ok"),
        Err(e) => {
            warn!(kind, outcome = e.outcome(), error = %e, "Generation failed");
            record_generation(kind, e.outcome());
        }
    }
}
