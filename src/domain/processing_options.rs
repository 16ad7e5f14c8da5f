// 処理オプション
//
// 厳密な金額検証・シミュレーション・返信書式などのハンドラーの振る舞いを
// 型安全に保持し、環境変数からの読み込みとデフォルト値を提供するドメイン層コンポーネント。

use tracing::info;

// ===========================================
// 環境変数名定義
// ===========================================

/// 環境変数名: コマンド解析時に金額を検証するか
pub const ENV_STRICT_AMOUNT: &str = "EXPENSE_STRICT_AMOUNT";

/// 環境変数名: シミュレーションモード（スプレッドシートに書き込まない）
pub const ENV_SIMULATION: &str = "EXPENSE_SIMULATION";

/// 環境変数名: 抽出サービスを使うか
pub const ENV_USE_EXTRACTION: &str = "EXPENSE_USE_EXTRACTION";

/// 環境変数名: 返信書式（rich / plain）
pub const ENV_REPLY_STYLE: &str = "EXPENSE_REPLY_STYLE";

// ===========================================
// オプション型
// ===========================================

/// コマンドパーサーの金額検証方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// 金額トークンを検証せずに正規化へ渡す
    #[default]
    Lenient,
    /// パース時点で金額トークンを検証する
    Strict,
}

/// 永続化方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistenceMode {
    /// スプレッドシートに追記する
    #[default]
    Live,
    /// 追記せず、シミュレーションである旨を返信する
    Simulation,
}

/// 返信メッセージの書式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyStyle {
    /// Telegram HTML（太字・コード）
    #[default]
    Rich,
    /// マークアップなし
    Plain,
}

impl ReplyStyle {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rich" | "html" => Some(ReplyStyle::Rich),
            "plain" | "text" => Some(ReplyStyle::Plain),
            _ => None,
        }
    }
}

/// 処理オプション（ドメイン層）
///
/// プロセス起動時に一度だけ初期化される不変データ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingOptions {
    pub parse_mode: ParseMode,
    pub persistence_mode: PersistenceMode,
    /// 抽出サービスを使うか（クライアント未設定なら無視される）
    pub use_extraction: bool,
    pub reply_style: ReplyStyle,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            parse_mode: ParseMode::Lenient,
            persistence_mode: PersistenceMode::Live,
            use_extraction: true,
            reply_style: ReplyStyle::Rich,
        }
    }
}

impl ProcessingOptions {
    /// 環境変数から設定を読み込み
    ///
    /// 未設定またはパースエラーの場合はデフォルト値を使用する。
    ///
    /// # 環境変数
    /// - EXPENSE_STRICT_AMOUNT: true でパース時に金額を検証
    /// - EXPENSE_SIMULATION: true でスプレッドシートへの書き込みを省略
    /// - EXPENSE_USE_EXTRACTION: false で抽出サービスを使わない
    /// - EXPENSE_REPLY_STYLE: rich / plain
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let parse_mode = if parse_env_bool(ENV_STRICT_AMOUNT, false) {
            ParseMode::Strict
        } else {
            ParseMode::Lenient
        };

        let persistence_mode = if parse_env_bool(ENV_SIMULATION, false) {
            PersistenceMode::Simulation
        } else {
            PersistenceMode::Live
        };

        let use_extraction = parse_env_bool(ENV_USE_EXTRACTION, defaults.use_extraction);

        let reply_style = match std::env::var(ENV_REPLY_STYLE) {
            Ok(value) => ReplyStyle::parse(&value).unwrap_or_else(|| {
                info!(
                    key = ENV_REPLY_STYLE,
                    value = %value,
                    "Environment variable parse error, using default"
                );
                defaults.reply_style
            }),
            Err(_) => defaults.reply_style,
        };

        let options = Self {
            parse_mode,
            persistence_mode,
            use_extraction,
            reply_style,
        };

        info!(
            parse_mode = ?options.parse_mode,
            persistence_mode = ?options.persistence_mode,
            use_extraction = options.use_extraction,
            reply_style = ?options.reply_style,
            "ProcessingOptions loaded"
        );

        options
    }
}

/// 環境変数から真偽値を読み込む
///
/// 未設定またはパースエラーの場合はデフォルト値を返す。
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                info!(
                    key,
                    value = %value,
                    default,
                    "Environment variable parse error, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}
