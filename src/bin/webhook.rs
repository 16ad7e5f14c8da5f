/// Telegram Webhook Lambda関数
///
/// Function URL / API Gatewayプロキシ経由、または直接呼び出しで
/// Telegramのupdateを受け取り、支出を記録して返信する。
///
/// # 環境変数
/// - TELEGRAM_BOT_TOKEN / TELEGRAM_BOT_TOKEN_PARAM: ボットトークン
/// - GOOGLE_SHEET_ID, GOOGLE_SHEET_NAME: 記録先スプレッドシート
/// - GOOGLE_CREDENTIALS_JSON / GOOGLE_CREDENTIALS_PARAM: サービスアカウント鍵
/// - OPENAI_API_KEY / OPENAI_API_KEY_PARAM: 抽出サービスのAPIキー（任意）
/// - EXPENSE_STRICT_AMOUNT, EXPENSE_SIMULATION, EXPENSE_USE_EXTRACTION, EXPENSE_REPLY_STYLE
use expense_bot::application::{HandlerOutcome, WebhookError, WebhookParser};
use expense_bot::bootstrap::{LiveExpenseHandler, build_handler, load_config};
use expense_bot::domain::ProcessingOptions;
use expense_bot::infrastructure::init_logging;
use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

/// ハンドラーの静的インスタンス
///
/// warm start時に設定とHTTPコネクションを再利用する。
static HANDLER: OnceCell<LiveExpenseHandler> = OnceCell::const_new();

/// ハンドラーを取得（初期化されていなければ初期化）
async fn get_handler() -> Result<&'static LiveExpenseHandler, Error> {
    HANDLER
        .get_or_try_init(|| async {
            let config = load_config().await;
            let options = ProcessingOptions::from_env();
            let handler = build_handler(&config, options)?;
            Ok::<_, Error>(handler)
        })
        .await
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    let func = service_fn(handler);
    lambda_runtime::run(func).await?;
    Ok(())
}

/// Lambda関数のメインハンドラー
///
/// # 処理フロー
/// 1. イベントから受信メッセージを取り出す（不正なら400）
/// 2. ExpenseHandlerで処理する
/// 3. 処理結果を200で返す（返信送信の失敗はステータスに影響しない）
async fn handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let request_id = event.context.request_id.clone();

    let message = match WebhookParser::parse(&event.payload) {
        Ok(message) => message,
        Err(err) => {
            warn!(request_id = %request_id, error = %err, "不正なWebhookイベント");
            return Ok(error_response(&err));
        }
    };

    info!(
        request_id = %request_id,
        sender_id = %message.sender_id,
        update_id = message.update_id,
        "Webhook受信"
    );

    let handler = match get_handler().await {
        Ok(handler) => handler,
        Err(err) => {
            error!(request_id = %request_id, error = %err, "ハンドラー初期化失敗");
            return Ok(json_response(500, &json!({"error": "Internal server error"})));
        }
    };

    let outcome = handler.handle(&message).await;
    Ok(success_response(&outcome))
}

/// プロキシ形式のレスポンスを作成
fn json_response(status_code: u16, body: &Value) -> Value {
    json!({
        "statusCode": status_code,
        "headers": {"Content-Type": "application/json"},
        "body": body.to_string(),
    })
}

/// 処理結果のレスポンス
fn success_response(outcome: &HandlerOutcome) -> Value {
    json_response(
        200,
        &json!({
            "status": "success",
            "outcome": outcome.reply.kind(),
            "delivered": outcome.delivered,
        }),
    )
}

/// 不正なイベントのレスポンス（400）
fn error_response(err: &WebhookError) -> Value {
    json_response(400, &json!({"error": err.to_string()}))
}
