// 自然文からの支出フィールド抽出
//
// テキスト補完サービスにJSONでの回答を求め、その応答を抽出結果に変換する。
// 失敗はすべて ExtractionError として返し、呼び出し側はコマンド解析結果にフォールバックする。

use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::{Amount, AmountError, Category, ExtractedExpense};
use crate::infrastructure::{CompletionClient, CompletionError, CompletionRequest};

/// 補完の温度パラメータ
pub const EXTRACTION_TEMPERATURE: f32 = 0.3;

/// 補完の最大トークン数
pub const EXTRACTION_MAX_TOKENS: u32 = 200;

const SYSTEM_PROMPT: &str = "You are a financial assistant that extracts expense information. \
You reply ONLY with valid JSON.";

/// 抽出失敗（ExtractionUnavailable）
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractionError {
    /// 補完呼び出しの失敗
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    /// 応答がJSONオブジェクトでない
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    /// 必須キーがない
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// 金額が変換できない
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),
}

/// 応答JSON
///
/// 英語キーとスペイン語キーの両方を受け付ける。
#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default, alias = "monto")]
    amount: Option<Value>,
    #[serde(default, alias = "categoria")]
    category: Option<Value>,
    #[serde(default, alias = "descripcion")]
    description: Option<Value>,
    #[serde(default, alias = "fecha")]
    date: Option<Value>,
}

/// 前後のコードフェンス（```/```json）を取り除く
pub fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // 言語タグ（json等）を読み飛ばす
    let body = match rest.find('\n') {
        Some(newline) if rest[..newline].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[newline + 1..]
        }
        _ => rest.strip_prefix("json").unwrap_or(rest),
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// 抽出プロンプトを生成
fn user_prompt(text: &str, today: NaiveDate) -> String {
    let categories = Category::ALL
        .iter()
        .map(Category::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Extract the expense information from the following text and return a JSON object with:\n\
- amount (number, without symbols or separators)\n\
- category (string, one of: {categories})\n\
- description (short string)\n\
- date (YYYY-MM-DD, use {today} if not specified)\n\
\n\
Text: \"{text}\"\n\
\n\
Reply ONLY with the JSON object, without markdown or extra text.\n\
\n\
Example:\n\
{{\"amount\": 20000, \"category\": \"Food\", \"description\": \"lunch\", \"date\": \"{today}\"}}",
        today = today.format("%Y-%m-%d"),
    )
}

/// 応答テキストを抽出結果に変換
///
/// 日付がない、またはISO形式でない場合は`today`を使う。
pub fn parse_extraction(response: &str, today: NaiveDate) -> Result<ExtractedExpense, ExtractionError> {
    let json = strip_code_fence(response);
    let raw: RawExtraction =
        serde_json::from_str(json).map_err(|e| ExtractionError::InvalidJson(e.to_string()))?;

    let amount = match raw.amount {
        Some(Value::Null) | None => return Err(ExtractionError::MissingField("amount")),
        Some(value) => Amount::from_json(&value)?,
    };

    let category = match raw.category {
        Some(Value::Null) | None => return Err(ExtractionError::MissingField("category")),
        Some(Value::String(label)) => Category::from_label_or_other(&label),
        Some(_) => Category::Other,
    };

    let description = match raw.description {
        Some(Value::Null) | None => return Err(ExtractionError::MissingField("description")),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    };

    let date = raw
        .date
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|text| NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok())
        .unwrap_or(today);

    Ok(ExtractedExpense {
        amount,
        category,
        description,
        date,
    })
}

/// 自然文フィールド抽出器
#[derive(Debug, Clone)]
pub struct FieldExtractor<C>
where
    C: CompletionClient,
{
    client: C,
}

impl<C: CompletionClient> FieldExtractor<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// 今日の日付で抽出する
    pub async fn extract(&self, text: &str) -> Result<ExtractedExpense, ExtractionError> {
        self.extract_on(text, Local::now().date_naive()).await
    }

    /// 指定の処理日で抽出する
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn extract_on(
        &self,
        text: &str,
        today: NaiveDate,
    ) -> Result<ExtractedExpense, ExtractionError> {
        let request = CompletionRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: user_prompt(text, today),
            temperature: EXTRACTION_TEMPERATURE,
            max_tokens: EXTRACTION_MAX_TOKENS,
        };

        let response = self.client.complete(&request).await?;
        debug!(response = %response, "抽出サービス応答");

        parse_extraction(&response, today)
    }
}
