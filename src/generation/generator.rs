use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::AiWorkoutConfig;
use crate::utils::retry::{ExponentialBackoff, retry_with_backoff};

use super::model::{GenerationParams, WorkoutBlueprint};

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("request to generation backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("generation backend returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("generation backend returned an invalid blueprint: {0}")]
    Decode(String),
}

impl GeneratorError {
    /// 连接错误、超时、5xx 和 429 视为暂时性错误
    pub fn is_transient(&self) -> bool {
        match self {
            GeneratorError::Transport(e) => e.is_timeout() || e.is_connect(),
            GeneratorError::Upstream { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            GeneratorError::Decode(_) => false,
        }
    }
}

/// 外部 AI 生成服务
#[async_trait]
pub trait WorkoutGenerator: Send + Sync {
    async fn generate(&self, params: &GenerationParams) -> Result<WorkoutBlueprint, GeneratorError>;
}

/// 通过 HTTP 调用 AI 生成服务
pub struct HttpWorkoutGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    backoff: ExponentialBackoff,
}

impl HttpWorkoutGenerator {
    pub fn new(config: &AiWorkoutConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            backoff: ExponentialBackoff::with_retries(config.max_retries),
        })
    }

    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    async fn request_once(
        &self,
        params: &GenerationParams,
    ) -> Result<WorkoutBlueprint, GeneratorError> {
        let mut request = self.client.post(&self.endpoint).json(params);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let blueprint: WorkoutBlueprint = serde_json::from_slice(&bytes)
            .map_err(|e| GeneratorError::Decode(e.to_string()))?;

        if blueprint.days.is_empty() {
            return Err(GeneratorError::Decode("blueprint has no training days".into()));
        }

        Ok(blueprint)
    }
}

#[async_trait]
impl WorkoutGenerator for HttpWorkoutGenerator {
    async fn generate(&self, params: &GenerationParams) -> Result<WorkoutBlueprint, GeneratorError> {
        tracing::debug!("Requesting workout blueprint from {}", self.endpoint);
        retry_with_backoff(
            &self.backoff,
            || self.request_once(params),
            GeneratorError::is_transient,
        )
        .await
    }
}
