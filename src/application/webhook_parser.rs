/// Webhookイベントパーサー
///
/// Lambdaイベントから送信者IDとメッセージ本文を取り出す。
/// 以下のいずれの形式も受け付ける:
/// - API Gateway / Function URLのプロキシイベント（`body`がJSON文字列、base64の場合あり）
/// - `body`がオブジェクトのイベント
/// - Telegramのupdateそのもの（直接呼び出し）
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value;
use thiserror::Error;

use crate::domain::SenderId;

/// 受信メッセージ
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub sender_id: SenderId,
    /// メッセージ本文（テキストがない場合は空文字列）
    pub text: String,
    pub update_id: Option<i64>,
}

/// Webhookパースエラー（HTTP 400に対応）
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WebhookError {
    /// ボディがJSONでない
    #[error("invalid JSON body")]
    InvalidJson,

    /// base64デコードに失敗
    #[error("invalid base64 body")]
    InvalidBase64,

    /// messageがない
    #[error("no message in update")]
    MissingMessage,

    /// chat.idがない
    #[error("no chat id in message")]
    MissingChatId,
}

/// Webhookイベントパーサー
pub struct WebhookParser;

impl WebhookParser {
    /// Lambdaイベントをパースして受信メッセージに変換
    ///
    /// # 例
    /// ```
    /// use expense_bot::application::WebhookParser;
    /// use serde_json::json;
    ///
    /// let event = json!({"body": r#"{"message":{"chat":{"id":42},"text":"/start"}}"#});
    /// let message = WebhookParser::parse(&event).unwrap();
    /// assert_eq!(message.sender_id.as_str(), "42");
    /// assert_eq!(message.text, "/start");
    /// ```
    pub fn parse(event: &Value) -> Result<IncomingMessage, WebhookError> {
        let update = Self::extract_update(event)?;
        Self::parse_update(&update)
    }

    /// イベントからTelegram updateを取り出す
    fn extract_update(event: &Value) -> Result<Value, WebhookError> {
        match event.get("body") {
            Some(Value::String(body)) => {
                let is_base64 = event
                    .get("isBase64Encoded")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);

                let decoded = if is_base64 {
                    let bytes = STANDARD
                        .decode(body.trim())
                        .map_err(|_| WebhookError::InvalidBase64)?;
                    String::from_utf8(bytes).map_err(|_| WebhookError::InvalidBase64)?
                } else {
                    body.clone()
                };

                serde_json::from_str(&decoded).map_err(|_| WebhookError::InvalidJson)
            }
            Some(body @ Value::Object(_)) => Ok(body.clone()),
            Some(Value::Null) | None => Ok(event.clone()),
            Some(_) => Err(WebhookError::InvalidJson),
        }
    }

    /// Telegram updateから送信者と本文を取り出す
    ///
    /// 編集されたメッセージ（edited_message）も受け付ける。
    fn parse_update(update: &Value) -> Result<IncomingMessage, WebhookError> {
        let message = update
            .get("message")
            .or_else(|| update.get("edited_message"))
            .filter(|message| message.is_object())
            .ok_or(WebhookError::MissingMessage)?;

        let sender_id = message
            .get("chat")
            .and_then(|chat| chat.get("id"))
            .and_then(SenderId::from_json)
            .ok_or(WebhookError::MissingChatId)?;

        let text = message
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(IncomingMessage {
            sender_id,
            text,
            update_id: update.get("update_id").and_then(Value::as_i64),
        })
    }
}
