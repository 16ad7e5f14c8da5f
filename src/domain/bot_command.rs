// ボットコマンドの判定
//
// 受信テキストの先頭トークンからコマンド種別を判定する。
// グループチャットの`/expense@MyBot`形式にも対応する。

/// 支出登録コマンドのキーワード
pub const EXPENSE_KEYWORDS: [&str; 2] = ["/expense", "/gasto"];

/// ボットコマンド種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// `/start`
    Start,
    /// `/help`, `/ayuda`
    Help,
    /// `/expense`, `/gasto`
    Expense,
    /// 上記以外（コマンドでないテキストを含む）
    Unknown,
}

impl BotCommand {
    /// テキストからコマンド種別を判定
    pub fn classify(text: &str) -> Self {
        let Some(first) = text.split_whitespace().next() else {
            return BotCommand::Unknown;
        };

        // `/expense@MyBot` → `/expense`
        let keyword = first.split('@').next().unwrap_or(first).to_lowercase();

        match keyword.as_str() {
            "/start" => BotCommand::Start,
            "/help" | "/ayuda" => BotCommand::Help,
            k if EXPENSE_KEYWORDS.contains(&k) => BotCommand::Expense,
            _ => BotCommand::Unknown,
        }
    }

    /// ログ用の名前
    pub fn as_str(&self) -> &'static str {
        match self {
            BotCommand::Start => "start",
            BotCommand::Help => "help",
            BotCommand::Expense => "expense",
            BotCommand::Unknown => "unknown",
        }
    }
}
