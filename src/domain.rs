// Domain layer modules
pub mod amount;
pub mod bot_command;
pub mod category;
pub mod command_parser;
pub mod expense;
pub mod expense_normalizer;
pub mod processing_options;
pub mod reply;

// Re-exports
pub use amount::{Amount, AmountError};
pub use bot_command::BotCommand;
pub use category::Category;
pub use command_parser::{CommandError, CommandParser};
pub use expense::{
    ExpenseCommand, ExpenseDraft, ExtractedExpense, NormalizedExpense, ParsedAmountDescription,
    SenderId,
};
pub use expense_normalizer::{ExpenseNormalizer, ValidationError};
pub use processing_options::{ParseMode, PersistenceMode, ProcessingOptions, ReplyStyle};
pub use reply::ReplyMessage;
