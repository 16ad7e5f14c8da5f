// 支出レコード正規化
//
// コマンドパーサーまたは抽出サービスの出力から正規化済みレコードを作る。
// 金額の数値検証はここが唯一の判定箇所。

use chrono::{Local, NaiveDate};
use thiserror::Error;

use super::{
    Amount, AmountError, Category, ExpenseDraft, NormalizedExpense, SenderId,
};

/// 正規化エラー
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// 金額が数値でない
    #[error("amount must be numeric: {0}")]
    NonNumericAmount(String),

    /// 金額が負
    #[error("amount must not be negative: {0}")]
    NegativeAmount(String),
}

impl From<AmountError> for ValidationError {
    fn from(err: AmountError) -> Self {
        match err {
            AmountError::NotNumeric(token) => ValidationError::NonNumericAmount(token),
            AmountError::Negative(token) => ValidationError::NegativeAmount(token),
        }
    }
}

/// 支出レコード正規化器
pub struct ExpenseNormalizer;

impl ExpenseNormalizer {
    /// 処理日を今日として正規化
    pub fn normalize(
        draft: ExpenseDraft,
        sender_id: SenderId,
    ) -> Result<NormalizedExpense, ValidationError> {
        Self::normalize_on(draft, sender_id, Local::now().date_naive())
    }

    /// 処理日を指定して正規化
    ///
    /// - コマンド経路: 金額トークンを検証し、カテゴリは`Other`、日付は`today`
    /// - 抽出経路: 抽出済みの値をそのまま使う（日付は抽出時に補完済み）
    pub fn normalize_on(
        draft: ExpenseDraft,
        sender_id: SenderId,
        today: NaiveDate,
    ) -> Result<NormalizedExpense, ValidationError> {
        match draft {
            ExpenseDraft::Parsed(parsed) => {
                let amount = Amount::parse(&parsed.amount_token)?;
                Ok(NormalizedExpense {
                    amount,
                    category: Category::Other,
                    description: parsed.description,
                    date: today,
                    sender_id,
                })
            }
            ExpenseDraft::Extracted(extracted) => Ok(NormalizedExpense {
                amount: extracted.amount,
                category: extracted.category,
                description: extracted.description.trim().to_string(),
                date: extracted.date,
                sender_id,
            }),
        }
    }
}
