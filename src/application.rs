// アプリケーション層モジュール
pub mod expense_handler;
pub mod field_extractor;
pub mod webhook_parser;

// 再エクスポート
pub use expense_handler::{ExpenseHandler, HandlerOutcome};
pub use field_extractor::{ExtractionError, FieldExtractor};
pub use webhook_parser::{IncomingMessage, WebhookError, WebhookParser};
