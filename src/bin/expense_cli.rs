/// ローカル実行用CLI
///
/// Webhookと同じパイプラインで1件のテキストを処理し、返信を標準出力に表示する。
/// デフォルトはシミュレーションモードで、スプレッドシートには書き込まない。
///
/// # ローカル実行
/// ```bash
/// # シミュレーション（外部サービス不要）
/// cargo run --bin expense-cli -- /expense 15000 lunch
///
/// # 抽出サービスを使う
/// export OPENAI_API_KEY=sk-...
/// cargo run --bin expense-cli -- "/gasto 20000 pesos almuerzo"
///
/// # 実際に記録する
/// export GOOGLE_SHEET_ID=...
/// export GOOGLE_CREDENTIALS_JSON=...
/// cargo run --bin expense-cli -- --live /expense 15000 lunch
/// ```
use std::process::ExitCode;

use async_trait::async_trait;
use clap::Parser;
use expense_bot::application::IncomingMessage;
use expense_bot::bootstrap::{build_handler_with_notifier, load_config};
use expense_bot::domain::{
    ParseMode, PersistenceMode, ProcessingOptions, ReplyStyle, SenderId,
};
use expense_bot::infrastructure::{DeliveryError, NotificationSender, init_cli_logging};
use tracing::error;

/// コマンドライン引数
#[derive(Parser, Debug)]
#[command(name = "expense-cli")]
#[command(about = "支出コマンドをローカルで処理して返信を表示")]
struct CliArgs {
    /// 処理するテキスト（例: /expense 15000 lunch）
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
    text: Vec<String>,

    /// 送信者ID
    #[arg(long, default_value = "local")]
    chat_id: String,

    /// パース時に金額を検証する
    #[arg(long)]
    strict: bool,

    /// 抽出サービスを使わない
    #[arg(long)]
    no_extract: bool,

    /// スプレッドシートに実際に書き込む
    #[arg(long)]
    live: bool,

    /// マークアップなしで表示する
    #[arg(long)]
    plain: bool,

    /// デバッグログを標準エラーに出力する
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl CliArgs {
    /// 環境変数の設定をコマンドライン引数で上書き
    fn apply(&self, mut options: ProcessingOptions) -> ProcessingOptions {
        if self.strict {
            options.parse_mode = ParseMode::Strict;
        }
        if self.no_extract {
            options.use_extraction = false;
        }
        options.persistence_mode = if self.live {
            PersistenceMode::Live
        } else {
            PersistenceMode::Simulation
        };
        if self.plain {
            options.reply_style = ReplyStyle::Plain;
        }
        options
    }
}

/// 返信を標準出力に書き出す送信実装
#[derive(Debug, Clone, Copy)]
struct StdoutNotificationSender;

#[async_trait]
impl NotificationSender for StdoutNotificationSender {
    async fn send(
        &self,
        recipient: &SenderId,
        text: &str,
        _style: ReplyStyle,
    ) -> Result<(), DeliveryError> {
        println!("[to {recipient}]\n{text}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_cli_logging(args.verbose);

    let config = load_config().await;
    let options = args.apply(ProcessingOptions::from_env());

    let handler = match build_handler_with_notifier(&config, options, Some(StdoutNotificationSender))
    {
        Ok(handler) => handler,
        Err(err) => {
            error!(error = %err, "ハンドラー初期化失敗");
            return ExitCode::FAILURE;
        }
    };

    let message = IncomingMessage {
        sender_id: SenderId::new(args.chat_id.clone()),
        text: args.text.join(" "),
        update_id: None,
    };

    let outcome = handler.handle(&message).await;
    eprintln!(
        "outcome={} persisted={}",
        outcome.reply.kind(),
        outcome.persisted
    );

    match outcome.reply.kind() {
        "recorded" | "simulated" | "welcome" | "help" => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = CliArgs::parse_from(["expense-cli", "/expense", "15000", "lunch"]);
        assert_eq!(args.text.join(" "), "/expense 15000 lunch");
        assert_eq!(args.chat_id, "local");
        assert!(!args.live);
    }

    #[test]
    fn test_apply_defaults_to_simulation() {
        let args = CliArgs::parse_from(["expense-cli", "/expense 1 x"]);
        let options = args.apply(ProcessingOptions::default());
        assert_eq!(options.persistence_mode, PersistenceMode::Simulation);
        assert_eq!(options.parse_mode, ParseMode::Lenient);
        assert!(options.use_extraction);
    }

    #[test]
    fn test_apply_flags() {
        let args = CliArgs::parse_from([
            "expense-cli",
            "--strict",
            "--no-extract",
            "--live",
            "--plain",
            "--chat-id",
            "42",
            "/expense 1 x",
        ]);
        let options = args.apply(ProcessingOptions::default());
        assert_eq!(options.parse_mode, ParseMode::Strict);
        assert!(!options.use_extraction);
        assert_eq!(options.persistence_mode, PersistenceMode::Live);
        assert_eq!(options.reply_style, ReplyStyle::Plain);
        assert_eq!(args.chat_id, "42");
    }

    #[test]
    fn test_negative_amount_is_positional() {
        let args = CliArgs::parse_from(["expense-cli", "/expense", "-5", "coffee"]);
        assert_eq!(args.text, vec!["/expense", "-5", "coffee"]);
    }
}
