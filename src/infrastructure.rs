// Infrastructure layer modules
pub mod config;
pub mod google_auth;
pub mod http_client;
pub mod logging;
pub mod openai_client;
pub mod parameter_store;
pub mod sheets_appender;
pub mod telegram_sender;

#[cfg(test)]
pub(crate) mod stub_http;

// Re-exports
pub use config::{BotConfig, OpenAiConfig, SheetsAuth, SheetsConfig, TelegramConfig};
pub use google_auth::{
    AccessTokenProvider, AuthError, GoogleTokenSource, ServiceAccountKey,
    ServiceAccountTokenProvider, StaticTokenProvider,
};
pub use http_client::build_http_client;
pub use logging::{init_cli_logging, init_logging};
pub use openai_client::{
    CompletionClient, CompletionError, CompletionRequest, OpenAiCompletionClient,
};
pub use parameter_store::{AwsParameterStore, ParameterStore, ParameterStoreError};
pub use sheets_appender::{GoogleSheetsAppender, PersistenceError, SheetAppender};
pub use telegram_sender::{DeliveryError, NotificationSender, TelegramNotificationSender};
