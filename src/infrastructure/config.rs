/// ボット設定
///
/// 環境変数（および任意でSSM Parameter Store）から外部サービスの接続設定を読み込む。
/// 設定が欠けているサービスは`None`になり、ハンドラーはそのサービスなしで動作する。
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use super::google_auth::ServiceAccountKey;
use super::http_client::DEFAULT_REQUEST_TIMEOUT_SECS;
use super::openai_client::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use super::parameter_store::ParameterStore;
use super::telegram_sender::DEFAULT_TELEGRAM_API_BASE;

// ===========================================
// 環境変数名定義
// ===========================================

pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_BOT_TOKEN_PARAM: &str = "TELEGRAM_BOT_TOKEN_PARAM";
pub const ENV_TELEGRAM_API_BASE: &str = "TELEGRAM_API_BASE";

pub const ENV_GOOGLE_SHEET_ID: &str = "GOOGLE_SHEET_ID";
pub const ENV_GOOGLE_SHEET_NAME: &str = "GOOGLE_SHEET_NAME";
pub const ENV_GOOGLE_CREDENTIALS_JSON: &str = "GOOGLE_CREDENTIALS_JSON";
/// 旧名（GOOGLE_CREDENTIALS_JSONが未設定の場合のみ参照）
pub const ENV_GOOGLE_CREDS_JSON_LEGACY: &str = "GOOGLE_CREDS_JSON";
pub const ENV_GOOGLE_CREDENTIALS_PARAM: &str = "GOOGLE_CREDENTIALS_PARAM";
pub const ENV_GOOGLE_SHEETS_ACCESS_TOKEN: &str = "GOOGLE_SHEETS_ACCESS_TOKEN";

pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_API_KEY_PARAM: &str = "OPENAI_API_KEY_PARAM";
pub const ENV_OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";

pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";

/// デフォルトのシート名
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// SSMから解決する (パラメータ名を持つ環境変数, 値を格納する環境変数) の組
const SSM_BACKED_KEYS: [(&str, &str); 3] = [
    (ENV_TELEGRAM_BOT_TOKEN_PARAM, ENV_TELEGRAM_BOT_TOKEN),
    (ENV_GOOGLE_CREDENTIALS_PARAM, ENV_GOOGLE_CREDENTIALS_JSON),
    (ENV_OPENAI_API_KEY_PARAM, ENV_OPENAI_API_KEY),
];

/// Telegram接続設定
#[derive(Clone, PartialEq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Sheets認証方式
#[derive(Clone)]
pub enum SheetsAuth {
    /// サービスアカウント鍵でトークンを発行
    ServiceAccount(ServiceAccountKey),
    /// 事前発行済みのアクセストークン
    AccessToken(String),
}

impl fmt::Debug for SheetsAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetsAuth::ServiceAccount(key) => f.debug_tuple("ServiceAccount").field(key).finish(),
            SheetsAuth::AccessToken(_) => f.debug_tuple("AccessToken").field(&"<redacted>").finish(),
        }
    }
}

/// Google Sheets接続設定
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub auth: SheetsAuth,
}

/// OpenAI接続設定
#[derive(Clone, PartialEq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// ボット全体の設定
///
/// プロセス起動時に一度だけ読み込まれる不変データ。
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram: Option<TelegramConfig>,
    pub sheets: Option<SheetsConfig>,
    pub openai: Option<OpenAiConfig>,
    pub http_timeout: Duration,
}

impl BotConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 環境変数から設定を読み込み、`*_PARAM`で指定されたSSMパラメータを解決する
    ///
    /// 値そのものが環境変数に設定されている場合はSSMを参照しない。
    /// 取得に失敗したパラメータは未設定として扱い、他のサービスの設定には影響しない。
    pub async fn from_env_with_ssm<S: ParameterStore>(store: &S) -> Self {
        let resolved = resolve_ssm_parameters(|key| std::env::var(key).ok(), store).await;

        Self::from_lookup(|key| {
            resolved
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        })
    }

    /// 任意のキー参照関数から設定を組み立てる
    ///
    /// 空文字列は未設定として扱う。
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let telegram = match get(ENV_TELEGRAM_BOT_TOKEN) {
            Some(bot_token) => Some(TelegramConfig {
                bot_token,
                api_base: get(ENV_TELEGRAM_API_BASE)
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string()),
            }),
            None => {
                warn!(key = ENV_TELEGRAM_BOT_TOKEN, "ボットトークン未設定のため返信を送信しません");
                None
            }
        };

        let sheets = Self::sheets_from(&get);

        let openai = match get(ENV_OPENAI_API_KEY) {
            Some(api_key) => Some(OpenAiConfig {
                api_key,
                model: get(ENV_OPENAI_MODEL).unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                base_url: get(ENV_OPENAI_BASE_URL)
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            }),
            None => {
                info!(key = ENV_OPENAI_API_KEY, "APIキー未設定のため抽出サービスを使用しません");
                None
            }
        };

        let http_timeout = match get(ENV_HTTP_TIMEOUT_SECS) {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    info!(
                        key = ENV_HTTP_TIMEOUT_SECS,
                        value = %value,
                        default = DEFAULT_REQUEST_TIMEOUT_SECS,
                        "Environment variable parse error, using default"
                    );
                    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
                }
            },
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let config = Self {
            telegram,
            sheets,
            openai,
            http_timeout,
        };

        info!(
            telegram = config.telegram.is_some(),
            sheets = config.sheets.is_some(),
            openai = config.openai.is_some(),
            http_timeout_secs = config.http_timeout.as_secs(),
            "BotConfig loaded"
        );

        config
    }

    fn sheets_from<G>(get: &G) -> Option<SheetsConfig>
    where
        G: Fn(&str) -> Option<String>,
    {
        let Some(spreadsheet_id) = get(ENV_GOOGLE_SHEET_ID) else {
            warn!(key = ENV_GOOGLE_SHEET_ID, "スプレッドシートID未設定のため記録できません");
            return None;
        };

        let credentials =
            get(ENV_GOOGLE_CREDENTIALS_JSON).or_else(|| get(ENV_GOOGLE_CREDS_JSON_LEGACY));

        let auth = match credentials {
            Some(encoded) => match ServiceAccountKey::from_encoded(&encoded) {
                Ok(key) => SheetsAuth::ServiceAccount(key),
                Err(e) => {
                    warn!(error = %e, "サービスアカウント鍵が不正なため記録できません");
                    return None;
                }
            },
            None => match get(ENV_GOOGLE_SHEETS_ACCESS_TOKEN) {
                Some(token) => SheetsAuth::AccessToken(token),
                None => {
                    warn!(
                        key = ENV_GOOGLE_CREDENTIALS_JSON,
                        "Google認証情報未設定のため記録できません"
                    );
                    return None;
                }
            },
        };

        Some(SheetsConfig {
            spreadsheet_id,
            sheet_name: get(ENV_GOOGLE_SHEET_NAME).unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
            auth,
        })
    }
}

/// `*_PARAM`環境変数が指すSSMパラメータを取得し、値用のキーで返す
///
/// パラメータごとに独立して解決する。失敗したものは警告を出して結果から除く。
async fn resolve_ssm_parameters<F, S>(lookup: F, store: &S) -> HashMap<String, String>
where
    F: Fn(&str) -> Option<String>,
    S: ParameterStore,
{
    let mut resolved = HashMap::new();

    for (param_key, value_key) in SSM_BACKED_KEYS {
        let has_value = lookup(value_key).is_some_and(|value| !value.trim().is_empty());
        if has_value {
            continue;
        }

        let Some(parameter_name) = lookup(param_key).filter(|name| !name.trim().is_empty()) else {
            continue;
        };

        let parameter_name = parameter_name.trim();
        match store.get_secure_parameter(parameter_name).await {
            Ok(value) => {
                info!(key = value_key, parameter = %parameter_name, "SSMから設定を解決");
                resolved.insert(value_key.to_string(), value);
            }
            Err(e) => {
                warn!(
                    key = param_key,
                    parameter = %parameter_name,
                    error = %e,
                    "SSMパラメータ取得失敗、このキーは未設定として扱います"
                );
            }
        }
    }

    resolved
}
