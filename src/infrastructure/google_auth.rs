// Google APIアクセストークン取得
//
// サービスアカウント鍵でJWTを署名し、OAuth2 JWT-bearerフローで
// アクセストークンに交換する。事前発行済みトークンを使う構成にも対応する。

use std::fmt;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument};

use super::http_client::truncate_body;

/// Sheets APIのOAuthスコープ
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// トークンURIが鍵に含まれない場合のデフォルト
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// JWT-bearerグラントタイプ
const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// 署名するJWTの有効期間（秒）
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// 認証エラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// サービスアカウント鍵が不正
    #[error("サービスアカウント鍵が不正です: {0}")]
    InvalidCredentials(String),

    /// JWT署名に失敗
    #[error("JWT署名エラー: {0}")]
    SigningError(String),

    /// ネットワークエラー
    #[error("ネットワークエラー: {0}")]
    NetworkError(String),

    /// トークンエンドポイントのエラーレスポンス
    #[error("トークン取得エラー: status={status}, message={message}")]
    HttpError { status: u16, message: String },

    /// レスポンスの形式が不正
    #[error("不正なトークンレスポンス: {0}")]
    InvalidResponse(String),
}

/// サービスアカウント鍵（Google Cloudが発行するJSON）
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// JSON文字列またはbase64エンコードされたJSONから鍵を読み込む
    pub fn from_encoded(encoded: &str) -> Result<Self, AuthError> {
        let trimmed = encoded.trim();

        let json = if trimmed.starts_with('{') {
            trimmed.to_string()
        } else {
            let bytes = STANDARD
                .decode(trimmed)
                .map_err(|e| AuthError::InvalidCredentials(format!("base64デコード失敗: {e}")))?;
            String::from_utf8(bytes)
                .map_err(|e| AuthError::InvalidCredentials(format!("UTF-8でない: {e}")))?
        };

        let key: Self = serde_json::from_str(&json)
            .map_err(|e| AuthError::InvalidCredentials(format!("JSONパース失敗: {e}")))?;

        if key.client_email.is_empty() || key.private_key.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "client_emailまたはprivate_keyが空です".to_string(),
            ));
        }

        Ok(key)
    }
}

/// JWTクレーム
#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// トークンエンドポイントのレスポンス
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// アクセストークン取得トレイト
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// サービスアカウント鍵によるトークン取得
///
/// 呼び出しごとにトークンを交換し、キャッシュしない。
#[derive(Clone)]
pub struct ServiceAccountTokenProvider {
    key: ServiceAccountKey,
    client: Client,
    scope: String,
}

impl fmt::Debug for ServiceAccountTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountTokenProvider")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountTokenProvider {
    pub fn new(key: ServiceAccountKey, client: Client) -> Self {
        Self {
            key,
            client,
            scope: SHEETS_SCOPE.to_string(),
        }
    }

    /// 指定時刻で署名済みアサーションを作成
    fn signed_assertion(&self, issued_at: i64) -> Result<String, AuthError> {
        let claims = Claims {
            iss: self.key.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.key.token_uri.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| AuthError::InvalidCredentials(format!("秘密鍵が不正: {e}")))?;

        jsonwebtoken::encode(&header, &claims, &encoding_key)
            .map_err(|e| AuthError::SigningError(e.to_string()))
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountTokenProvider {
    #[instrument(skip(self), fields(client_email = %self.key.client_email))]
    async fn access_token(&self) -> Result<String, AuthError> {
        let assertion = self.signed_assertion(Utc::now().timestamp())?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT_TYPE),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "トークンリクエスト失敗");
                AuthError::NetworkError(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %truncate_body(&body), "トークン取得エラー");
            return Err(AuthError::HttpError {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        debug!("アクセストークン取得完了");
        Ok(token.access_token)
    }
}

/// 事前発行済みのアクセストークン
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}

/// 設定に応じたトークン取得手段
#[derive(Debug, Clone)]
pub enum GoogleTokenSource {
    ServiceAccount(ServiceAccountTokenProvider),
    Static(StaticTokenProvider),
}

#[async_trait]
impl AccessTokenProvider for GoogleTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        match self {
            GoogleTokenSource::ServiceAccount(provider) => provider.access_token().await,
            GoogleTokenSource::Static(provider) => provider.access_token().await,
        }
    }
}
