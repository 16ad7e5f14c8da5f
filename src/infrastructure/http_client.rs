// 外部API呼び出し用の共通HTTPクライアント設定
//
// Telegram / Google Sheets / OpenAI すべての呼び出しは単発で、自動再試行しない。
// タイムアウトのみ上限を設ける。

use std::time::Duration;

use reqwest::Client;

/// リクエストタイムアウト（秒）のデフォルト
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// 接続タイムアウト（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// タイムアウト付きのHTTPクライアントを作成
///
/// 接続タイムアウトはリクエストタイムアウトを超えないように丸める。
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let connect_timeout = timeout.min(Duration::from_secs(CONNECT_TIMEOUT_SECS));

    Client::builder()
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .build()
}

/// エラーレスポンス本文をログ・エラーメッセージ用に切り詰める
pub fn truncate_body(body: &str) -> String {
    const MAX_CHARS: usize = 300;
    if body.chars().count() <= MAX_CHARS {
        body.to_string()
    } else {
        let truncated: String = body.chars().take(MAX_CHARS).collect();
        format!("{truncated}...")
    }
}
