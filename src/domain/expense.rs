// 支出レコードのデータモデル
//
// 受信コマンド → 中間パース結果 / 抽出結果 → 正規化済みレコード の流れで使う型。
// どの型もリクエスト内でのみ生存し、リクエスト間で保持しない。

use std::fmt;

use chrono::NaiveDate;
use serde_json::Value;

use super::{Amount, Category};

/// メッセージ送信者の識別子
///
/// Telegramのchat.idは数値だが、プラットフォーム非依存の不透明な文字列として保持する。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SenderId(String);

impl SenderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// JSON値（数値または文字列）から識別子を作成
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => Some(Self(number.to_string())),
            Value::String(text) if !text.trim().is_empty() => Some(Self(text.trim().to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 送信API向けのJSON値
    ///
    /// 整数として解釈できる場合は数値、それ以外は文字列を返す。
    pub fn to_json_value(&self) -> Value {
        match self.0.parse::<i64>() {
            Ok(id) => Value::from(id),
            Err(_) => Value::from(self.0.clone()),
        }
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 受信したコマンド（1リクエストにつき1つ）
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseCommand {
    /// ユーザーが入力したコマンド全文
    pub raw_text: String,
    /// 送信者
    pub sender_id: SenderId,
}

impl ExpenseCommand {
    pub fn new(raw_text: impl Into<String>, sender_id: SenderId) -> Self {
        Self {
            raw_text: raw_text.into(),
            sender_id,
        }
    }

    /// 先頭のコマンドキーワードを除いた引数部分
    ///
    /// `"/expense 20000 pesos almuerzo"` → `"20000 pesos almuerzo"`
    pub fn arguments(&self) -> String {
        self.raw_text
            .split_whitespace()
            .skip(1)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// コマンドパーサーの中間結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAmountDescription {
    /// 2番目のトークン（未検証の金額）
    pub amount_token: String,
    /// 3番目以降のトークンを単一スペースで連結した説明
    pub description: String,
}

/// 抽出サービスからの構造化結果
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedExpense {
    pub amount: Amount,
    pub category: Category,
    pub description: String,
    /// 未指定の場合は処理日で補完済み
    pub date: NaiveDate,
}

/// 正規化の入力
///
/// コマンドパーサー経由か抽出サービス経由かのどちらか。
#[derive(Debug, Clone, PartialEq)]
pub enum ExpenseDraft {
    Parsed(ParsedAmountDescription),
    Extracted(ExtractedExpense),
}

impl ExpenseDraft {
    /// ログ用の経路名
    pub fn source(&self) -> &'static str {
        match self {
            ExpenseDraft::Parsed(_) => "command",
            ExpenseDraft::Extracted(_) => "extraction",
        }
    }
}

/// 永続化可能な正規化済み支出レコード
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedExpense {
    pub amount: Amount,
    pub category: Category,
    pub description: String,
    pub date: NaiveDate,
    pub sender_id: SenderId,
}
