// Telegram返信送信
//
// Bot APIのsendMessageで送信者に返信する。
// 送信失敗はハンドラーの結果を変えず、ログに記録するのみ。

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use super::http_client::truncate_body;
use crate::domain::{ReplyStyle, SenderId};

/// Telegram Bot APIのデフォルトベースURL
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// 送信エラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeliveryError {
    /// ボットトークンが設定されていない
    #[error("ボットトークンが設定されていません")]
    NotConfigured,

    /// ネットワークエラー（タイムアウトを含む）
    #[error("ネットワークエラー: {0}")]
    NetworkError(String),

    /// HTTPエラー
    #[error("HTTPエラー: status={status}, message={message}")]
    HttpError { status: u16, message: String },

    /// Bot APIが ok=false を返した
    #[error("Telegram APIエラー: {0}")]
    ApiError(String),
}

/// 返信送信トレイト
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 送信者に返信する
    async fn send(
        &self,
        recipient: &SenderId,
        text: &str,
        style: ReplyStyle,
    ) -> Result<(), DeliveryError>;
}

/// sendMessageのレスポンス
#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot APIによる送信実装
#[derive(Clone)]
pub struct TelegramNotificationSender {
    client: Client,
    bot_token: String,
    api_base: String,
}

impl fmt::Debug for TelegramNotificationSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotificationSender")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramNotificationSender {
    pub fn new(client: Client, bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client,
            bot_token: bot_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/bot{token}/sendMessage`
    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

/// sendMessageのリクエストボディを作成
fn send_message_body(recipient: &SenderId, text: &str, style: ReplyStyle) -> serde_json::Value {
    let mut body = json!({
        "chat_id": recipient.to_json_value(),
        "text": text,
    });
    if style == ReplyStyle::Rich {
        body["parse_mode"] = json!("HTML");
    }
    body
}

#[async_trait]
impl NotificationSender for TelegramNotificationSender {
    #[instrument(skip(self, text), fields(recipient = %recipient))]
    async fn send(
        &self,
        recipient: &SenderId,
        text: &str,
        style: ReplyStyle,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.send_message_url())
            .json(&send_message_body(recipient, text, style))
            .send()
            .await
            .map_err(|e| {
                // reqwestのエラー文字列にはURL（トークン入り）が含まれるため除去する
                let e = e.without_url();
                error!(error = %e, "sendMessageリクエスト失敗");
                DeliveryError::NetworkError(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(status = %status, body = %truncate_body(&body), "sendMessageエラー");
            return Err(DeliveryError::HttpError {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        match serde_json::from_str::<SendMessageResponse>(&body) {
            Ok(parsed) if !parsed.ok => Err(DeliveryError::ApiError(
                parsed.description.unwrap_or_else(|| "ok=false".to_string()),
            )),
            _ => {
                debug!("返信送信完了");
                Ok(())
            }
        }
    }
}
