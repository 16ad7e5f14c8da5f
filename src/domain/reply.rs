/// ユーザーへの返信メッセージ
///
/// 処理結果ごとの返信文を生成する。
/// Rich書式ではTelegram HTML（<b>, <code>）を使い、ユーザー入力はエスケープする。
use super::{NormalizedExpense, ReplyStyle};

/// 返信メッセージ種別
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyMessage {
    /// `/start`
    Welcome,

    /// `/help`
    Help,

    /// 未知のコマンド
    UnknownCommand,

    /// トークン不足
    FormatError,

    /// 金額が数値でない
    InvalidAmount {
        token: String,
        /// 抽出サービスでの補完にも失敗した
        extraction_failed: bool,
    },

    /// スプレッドシートへの保存に失敗
    PersistenceFailed,

    /// 記録成功
    Recorded {
        expense: NormalizedExpense,
        /// シミュレーションモード（保存していない）
        simulated: bool,
    },
}

impl ReplyMessage {
    /// 返信種別名（Lambdaレスポンス・ログ用）
    pub fn kind(&self) -> &'static str {
        match self {
            ReplyMessage::Welcome => "welcome",
            ReplyMessage::Help => "help",
            ReplyMessage::UnknownCommand => "unknown_command",
            ReplyMessage::FormatError => "format_error",
            ReplyMessage::InvalidAmount { .. } => "invalid_amount",
            ReplyMessage::PersistenceFailed => "persistence_failed",
            ReplyMessage::Recorded { simulated: false, .. } => "recorded",
            ReplyMessage::Recorded { simulated: true, .. } => "simulated",
        }
    }

    /// 指定の書式で返信文を生成
    pub fn render(&self, style: ReplyStyle) -> String {
        let f = Markup { style };

        match self {
            ReplyMessage::Welcome => format!(
                "{}\n\nRecord an expense with:\n{}\n\nExamples:\n{}\n{}",
                f.bold("Welcome to your expense assistant!"),
                f.code("/expense <amount> <description>"),
                f.code("/expense 15000 lunch"),
                f.code("/expense 12000 taxi home"),
            ),

            ReplyMessage::Help => format!(
                "{}\n\n{} - welcome message\n{} - record an expense\n{} - this help\n\nInvalid examples:\n{} (missing amount)\n{} (missing description)",
                f.bold("Available commands"),
                f.code("/start"),
                f.code("/expense <amount> <description>"),
                f.code("/help"),
                f.code("/expense lunch"),
                f.code("/expense 15000"),
            ),

            ReplyMessage::UnknownCommand => format!(
                "Unknown command. Use {} or {}",
                f.code("/expense <amount> <description>"),
                f.code("/help"),
            ),

            ReplyMessage::FormatError => format!(
                "Invalid format. Use: {}\nExample: {}",
                f.code("/expense <amount> <description>"),
                f.code("/expense 15000 lunch"),
            ),

            ReplyMessage::InvalidAmount {
                token,
                extraction_failed,
            } => {
                let mut text = format!(
                    "The amount {} is not valid. Use numbers only, e.g. {}",
                    f.bold(&f.escape(token)),
                    f.code("/expense 15000 lunch"),
                );
                if *extraction_failed {
                    text.push_str("\nAutomatic recognition is unavailable right now, please try the basic format.");
                }
                text
            }

            ReplyMessage::PersistenceFailed => {
                "Could not save the expense. Please try again later.".to_string()
            }

            ReplyMessage::Recorded { expense, simulated } => {
                let mut text = format!(
                    "{}\nAmount: ${}\nCategory: {}\nDescription: {}\nDate: {}",
                    f.bold("Expense recorded"),
                    expense.amount,
                    expense.category,
                    f.escape(&expense.description),
                    expense.date.format("%Y-%m-%d"),
                );
                if *simulated {
                    text.push_str("\n(Simulation mode: not saved to the spreadsheet)");
                }
                text
            }
        }
    }
}

/// 書式に応じたマークアップヘルパー
struct Markup {
    style: ReplyStyle,
}

impl Markup {
    fn bold(&self, text: &str) -> String {
        match self.style {
            ReplyStyle::Rich => format!("<b>{text}</b>"),
            ReplyStyle::Plain => text.to_string(),
        }
    }

    fn code(&self, text: &str) -> String {
        match self.style {
            ReplyStyle::Rich => format!("<code>{}</code>", escape_html(text)),
            ReplyStyle::Plain => text.to_string(),
        }
    }

    fn escape(&self, text: &str) -> String {
        match self.style {
            ReplyStyle::Rich => escape_html(text),
            ReplyStyle::Plain => text.to_string(),
        }
    }
}

/// Telegram HTMLモード用のエスケープ
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amount, Category, SenderId};
    use chrono::NaiveDate;

    fn expense(description: &str) -> NormalizedExpense {
        NormalizedExpense {
            amount: Amount::parse("15000").unwrap(),
            category: Category::Food,
            description: description.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
            sender_id: SenderId::new("42"),
        }
    }

    #[test]
    fn test_recorded_rich() {
        let text = ReplyMessage::Recorded {
            expense: expense("lunch"),
            simulated: false,
        }
        .render(ReplyStyle::Rich);

        assert!(text.contains("<b>Expense recorded</b>"));
        assert!(text.contains("Amount: $15000"));
        assert!(text.contains("Category: Food"));
        assert!(text.contains("Description: lunch"));
        assert!(text.contains("Date: 2025-11-03"));
        assert!(!text.contains("Simulation"));
    }

    #[test]
    fn test_recorded_simulated_has_notice() {
        let message = ReplyMessage::Recorded {
            expense: expense("lunch"),
            simulated: true,
        };
        assert!(message.render(ReplyStyle::Plain).contains("Simulation mode"));
        assert_eq!(message.kind(), "simulated");
    }

    #[test]
    fn test_plain_has_no_markup() {
        let text = ReplyMessage::Welcome.render(ReplyStyle::Plain);
        assert!(!text.contains("<b>"));
        assert!(!text.contains("<code>"));
        assert!(text.contains("/expense <amount> <description>"));
    }

    /// Rich書式ではコード内の山括弧もエスケープされる
    #[test]
    fn test_rich_code_is_escaped() {
        let text = ReplyMessage::FormatError.render(ReplyStyle::Rich);
        assert!(text.contains("<code>/expense &lt;amount&gt; &lt;description&gt;</code>"));
    }

    #[test]
    fn test_user_text_is_escaped_in_rich() {
        let text = ReplyMessage::Recorded {
            expense: expense("<script> & co"),
            simulated: false,
        }
        .render(ReplyStyle::Rich);
        assert!(text.contains("&lt;script&gt; &amp; co"));

        let text = ReplyMessage::InvalidAmount {
            token: "<b>".to_string(),
            extraction_failed: false,
        }
        .render(ReplyStyle::Rich);
        assert!(text.contains("<b>&lt;b&gt;</b>"));
    }

    #[test]
    fn test_invalid_amount_with_extraction_hint() {
        let message = ReplyMessage::InvalidAmount {
            token: "veinte".to_string(),
            extraction_failed: true,
        };
        let text = message.render(ReplyStyle::Plain);
        assert!(text.contains("veinte"));
        assert!(text.contains("try the basic format"));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ReplyMessage::Welcome.kind(), "welcome");
        assert_eq!(ReplyMessage::FormatError.kind(), "format_error");
        assert_eq!(ReplyMessage::PersistenceFailed.kind(), "persistence_failed");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
    }
}
