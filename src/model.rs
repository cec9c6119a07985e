use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::throttle::{Clock as _, RateLimiter};

pub const RETRIES_EXHAUSTED: &str = "Failed to analyze the text after multiple retries.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

const FIELD_TEMPLATE: &str = r#""Listeners": Please enter the full name of the listener or listeners without any additional text. It must be a persons' name. If the name is in Pronoun form (such as "I", "He", "She"), is used, use the listeners name.
"Listening to": Please specify only the title or name of what is being listening to, without any extra details.
"Performed by": Mention who performed or delivered the content being listened to.
"Date/Time": Extract all date and time in whatever format they appear in the provided text. then, you must convert the date and time to UTC in the format 'YYYY-MM-DDTHH:MM:SSZ'. If Month, Day, time (Hour, Minutes, Seconds) are missing in the text, use '00' for them".
"Medium": Choose one from - "Live", "Playback", "Broadcast", or "Others". Choose Live, if the context relates to live music performances where the listener is present at the venues or events such as: Concerts, Theatres, Parks, Clubs, Bars, Street Performances, House Concerts, Stadiums, Coffee Shops, Churches, Cathedrals, Open Mics, Radio Shows, or TV Shows. Choose Playback, if the text relates to any of the following and is not associated with live music performances: Album, MP3, Vinyl, CD, Tapes, 8-Track Tapes, Digital Downloads, FLAC, Radio (for prerecorded music), Music Videos, Podcasts (music-focused, on-demand), Satellite Radio, WAV, Streaming (e.g., Spotify, Apple Music), Bluetooth Speakers, or Wireless Headphones. Choose Broadcast, if the text relates to any of the following methods or platforms for disseminating music, regardless of whether the music is live or pre-recorded such as: Radio (AM, FM, Shortwave), Television, Music TV channels, Talent shows, Award ceremonies, Internet Radio, Satellite Radio, Podcasts (for music distribution), Webcasts, Live Streaming Platforms, Public Address Systems, or DAB (Digital Audio Broadcasting). Choose Others, If the text does not fit the above categories.
"Listening Environment": Select all the listening environment that applied to the excerpt from the following - "Indoors", "In the company of others", "In Public", "In Private", "Solitary", "Outdoors", "Domestic", "Accompanied", or "Others". Select Indoors, if the environment is Home, office, commercial places (e.g., malls, restaurants), public facilities (e.g., libraries, train stations). Select Outdoors, if the environment is Parks, streets, beaches, wilderness (e.g., forests, mountains). Select Solitary, if the listener was Alone in the environment, without any other human presence. Select In the Company of Others, if the listener was Listening with family, friends, colleagues, or strangers. Select "In Private", if the Listening happend in private places, like personal homes or offices. Select In Public", if the environment is an Area with multiple people and reduced privacy. Select Domestic, if the listener Listened within household settings, which might include living rooms, bedrooms, or kitchens. Select "Accompanied", if the listener was Listening with one or more individuals, regardless of the relationship or setting. Select Others", if the listening environment did not fit any of the above categories.
"Location": Provide the city and country.
"#;

const TASK_PREFIX: &str = "Act as a knowledge engineer with over 25 years of experience in information extraction, analyze the passage below and determine any encounters depicted within it. Please provide a concise answer. Respond using a JSON structure with the following seven keys as per the custom template:\n\n";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_owned(),
            content: content.into(),
        }
    }
}

/// Chat completion request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// System message, the field template, then the task framing with the passage.
    pub fn for_passage(model: &str, passage: &str, max_tokens: u32) -> Self {
        Self {
            model: model.to_owned(),
            messages: vec![
                ChatMessage::new("system", SYSTEM_PROMPT),
                ChatMessage::new("user", FIELD_TEMPLATE),
                ChatMessage::new("user", format!("{TASK_PREFIX}{passage}")),
            ],
            temperature: 0.0,
            max_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("{0}")]
    RateLimited(String),
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ModelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT: Self = Self {
        attempts: 3,
        backoff: Duration::from_secs(10),
    };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Wraps a [`ChatModel`] with the run's rate limiter and the rate-limit retry policy.
///
/// Never fails: errors come back as answer text so the batch keeps going.
#[derive(Debug)]
pub struct ModelClient<M> {
    model: M,
    model_id: String,
    retry: RetryPolicy,
}

impl<M: ChatModel> ModelClient<M> {
    pub fn new(model: M, model_id: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            model,
            model_id: model_id.into(),
            retry,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub async fn analyze(&self, limiter: &mut RateLimiter, passage: &str) -> String {
        let request = ChatRequest::for_passage(
            &self.model_id,
            passage,
            limiter.limits().tokens_per_request,
        );
        let attempts = self.retry.attempts;

        for attempt in 1..=attempts {
            limiter.wait_for_slot().await;

            match self.model.complete(&request).await {
                Ok(answer) => {
                    limiter.record_request();
                    tracing::debug!(
                        attempt,
                        tokens_used = limiter.state().tokens_used,
                        "model answered"
                    );
                    return answer.trim().to_owned();
                }
                Err(ModelError::RateLimited(message)) => {
                    tracing::warn!(attempt, attempts, error = %message, "rate limited by model API");
                    limiter.clock().sleep(self.retry.backoff).await;
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "model call failed; not retrying");
                    return format!("An error occurred: {err}");
                }
            }
        }

        RETRIES_EXHAUSTED.to_owned()
    }
}
