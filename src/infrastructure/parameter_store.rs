//! SSM Parameter Store操作モジュール
//!
//! ボットトークン・APIキー・サービスアカウント鍵などの秘密情報を
//! SecureStringパラメータから取得する。

use async_trait::async_trait;
use aws_sdk_ssm::Client as SsmClient;
use thiserror::Error;
use tracing::{debug, warn};

/// Parameter Store操作のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParameterStoreError {
    /// AWS SDK エラー
    #[error("AWS SSM APIエラー: {0}")]
    AwsSdkError(String),
    /// パラメータに値がない
    #[error("パラメータの値が空です: {0}")]
    EmptyValue(String),
}

/// Parameter Store操作トレイト（テスト用の抽象化）
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// 復号済みのパラメータ値を取得する
    ///
    /// # 引数
    /// * `name` - パラメータ名（例: "/expense-bot/telegram-token"）
    async fn get_secure_parameter(&self, name: &str) -> Result<String, ParameterStoreError>;
}

/// 実際のAWS SSM SDKを使用したParameter Store実装
#[derive(Debug, Clone)]
pub struct AwsParameterStore {
    client: SsmClient,
}

impl AwsParameterStore {
    pub fn new(client: SsmClient) -> Self {
        Self { client }
    }

    /// AWS設定からデフォルトのクライアントを作成
    pub async fn from_config() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(SsmClient::new(&config))
    }
}

#[async_trait]
impl ParameterStore for AwsParameterStore {
    async fn get_secure_parameter(&self, name: &str) -> Result<String, ParameterStoreError> {
        debug!(parameter = %name, "SSMパラメータ取得");

        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|err| {
                let service_error = err.into_service_error();
                warn!(parameter = %name, error = %service_error, "SSMパラメータ取得失敗");
                ParameterStoreError::AwsSdkError(service_error.to_string())
            })?;

        output
            .parameter()
            .and_then(|parameter| parameter.value())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ParameterStoreError::EmptyValue(name.to_string()))
    }
}
