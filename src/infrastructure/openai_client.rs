// OpenAI Chat Completions クライアント
//
// 構造化抽出に使うテキスト補完を1回だけ呼び出す。
// 再試行やフォールバックモデルへの切り替えは行わない。

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::http_client::truncate_body;

/// OpenAI APIのデフォルトベースURL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// デフォルトモデル
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// 補完エラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompletionError {
    /// レート制限・クォータ超過（429）
    #[error("レート制限: {0}")]
    RateLimited(String),

    /// APIキーが不正（401/403）
    #[error("認証エラー: status={0}")]
    Unauthorized(u16),

    /// その他のHTTPエラー
    #[error("HTTPエラー: status={status}, message={message}")]
    HttpError { status: u16, message: String },

    /// タイムアウト
    #[error("タイムアウト")]
    Timeout,

    /// ネットワークエラー
    #[error("ネットワークエラー: {0}")]
    NetworkError(String),

    /// レスポンスJSONが不正
    #[error("不正なレスポンス: {0}")]
    InvalidResponse(String),

    /// 応答テキストが空
    #[error("応答が空です")]
    EmptyResponse,
}

/// 補完リクエスト
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// テキスト補完トレイト
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// 補完を実行し、応答テキストを返す
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// ステータスコードからエラーを分類
fn classify_status(status: u16, body: &str) -> CompletionError {
    match status {
        429 => CompletionError::RateLimited(truncate_body(body)),
        401 | 403 => CompletionError::Unauthorized(status),
        _ => CompletionError::HttpError {
            status,
            message: truncate_body(body),
        },
    }
}

/// 応答の先頭選択肢からテキストを取り出す
fn first_choice_text(response: ChatCompletionResponse) -> Result<String, CompletionError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(CompletionError::EmptyResponse)
}

/// OpenAI Chat Completions実装
#[derive(Clone)]
pub struct OpenAiCompletionClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl fmt::Debug for OpenAiCompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompletionClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompletionClient {
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "補完リクエスト失敗");
                if e.is_timeout() {
                    CompletionError::Timeout
                } else {
                    CompletionError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %truncate_body(&text), "補完APIエラー");
            return Err(classify_status(status.as_u16(), &text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        let text = first_choice_text(parsed)?;
        debug!(length = text.len(), "補完完了");
        Ok(text)
    }
}
