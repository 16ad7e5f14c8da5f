/// ハンドラーの組み立て
///
/// 設定から外部サービスのクライアントを作成し、ExpenseHandlerに注入する。
/// Lambdaバイナリとローカル実行用CLIの両方から使う。
use reqwest::Client;
use thiserror::Error;
use tracing::info;

use crate::application::ExpenseHandler;
use crate::domain::ProcessingOptions;
use crate::infrastructure::config::{
    ENV_GOOGLE_CREDENTIALS_PARAM, ENV_OPENAI_API_KEY_PARAM, ENV_TELEGRAM_BOT_TOKEN_PARAM,
};
use crate::infrastructure::{
    AwsParameterStore, BotConfig, GoogleSheetsAppender, GoogleTokenSource, NotificationSender,
    OpenAiCompletionClient, ServiceAccountTokenProvider, SheetsAuth, StaticTokenProvider,
    TelegramNotificationSender, build_http_client,
};

/// 本番構成のSheets追記実装
pub type LiveSheetAppender = GoogleSheetsAppender<GoogleTokenSource>;

/// 本番構成のハンドラー
pub type LiveExpenseHandler<NS = TelegramNotificationSender> =
    ExpenseHandler<LiveSheetAppender, NS, OpenAiCompletionClient>;

/// 組み立てエラー
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// HTTPクライアントの作成に失敗
    #[error("HTTPクライアント作成エラー: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// SSMから解決すべきパラメータが指定されているか
fn ssm_parameters_requested() -> bool {
    [
        ENV_TELEGRAM_BOT_TOKEN_PARAM,
        ENV_GOOGLE_CREDENTIALS_PARAM,
        ENV_OPENAI_API_KEY_PARAM,
    ]
    .iter()
    .any(|key| std::env::var(key).is_ok_and(|value| !value.trim().is_empty()))
}

/// 設定を読み込む
///
/// `*_PARAM`が指定されている場合のみAWS設定を読み込んでSSMを参照する。
/// 取得できなかったパラメータに対応するサービスだけが無効になる。
pub async fn load_config() -> BotConfig {
    if !ssm_parameters_requested() {
        return BotConfig::from_env();
    }

    let store = AwsParameterStore::from_config().await;
    BotConfig::from_env_with_ssm(&store).await
}

/// Telegram送信を使うハンドラーを組み立てる
pub fn build_handler(
    config: &BotConfig,
    options: ProcessingOptions,
) -> Result<LiveExpenseHandler, BootstrapError> {
    let client = build_http_client(config.http_timeout)?;

    let notifier = config.telegram.as_ref().map(|telegram| {
        TelegramNotificationSender::new(
            client.clone(),
            telegram.bot_token.clone(),
            telegram.api_base.clone(),
        )
    });

    Ok(assemble(config, options, client, notifier))
}

/// 返信送信先を差し替えてハンドラーを組み立てる
pub fn build_handler_with_notifier<NS>(
    config: &BotConfig,
    options: ProcessingOptions,
    notifier: Option<NS>,
) -> Result<LiveExpenseHandler<NS>, BootstrapError>
where
    NS: NotificationSender,
{
    let client = build_http_client(config.http_timeout)?;
    Ok(assemble(config, options, client, notifier))
}

/// 1つのHTTPクライアントを全クライアントで共有して組み立てる
fn assemble<NS>(
    config: &BotConfig,
    options: ProcessingOptions,
    client: Client,
    notifier: Option<NS>,
) -> LiveExpenseHandler<NS>
where
    NS: NotificationSender,
{
    let appender = config.sheets.as_ref().map(|sheets| {
        let token_source = match &sheets.auth {
            SheetsAuth::ServiceAccount(key) => GoogleTokenSource::ServiceAccount(
                ServiceAccountTokenProvider::new(key.clone(), client.clone()),
            ),
            SheetsAuth::AccessToken(token) => {
                GoogleTokenSource::Static(StaticTokenProvider::new(token.clone()))
            }
        };
        GoogleSheetsAppender::new(
            client.clone(),
            token_source,
            sheets.spreadsheet_id.clone(),
            sheets.sheet_name.clone(),
        )
    });

    let completion_client = config.openai.as_ref().map(|openai| {
        OpenAiCompletionClient::new(
            client.clone(),
            openai.api_key.clone(),
            openai.model.clone(),
            openai.base_url.clone(),
        )
    });

    info!(
        appender = appender.is_some(),
        notifier = notifier.is_some(),
        extraction = completion_client.is_some() && options.use_extraction,
        "ハンドラー組み立て完了"
    );

    ExpenseHandler::new(appender, notifier, completion_client, options)
}
