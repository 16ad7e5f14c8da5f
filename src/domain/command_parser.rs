// 支出コマンドパーサー
//
// `/expense <amount> <description>` を空白で分割し、
// 金額トークンと説明文に分ける。

use thiserror::Error;

use super::{Amount, AmountError, ParseMode, ParsedAmountDescription};

/// 最低限必要なトークン数（キーワード・金額・説明1語以上）
const MIN_TOKENS: usize = 3;

/// コマンドパースエラー
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    /// トークン数が不足している
    #[error("invalid format, expected: /expense <amount> <description>")]
    Format,

    /// 金額トークンが数値でない（strictモードのみ）
    #[error("invalid amount: {token}")]
    InvalidAmount {
        token: String,
        #[source]
        source: AmountError,
    },
}

/// 支出コマンドパーサー
///
/// 保持するのは不変の`ParseMode`のみで、同じ入力には常に同じ結果を返す。
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandParser {
    mode: ParseMode,
}

impl CommandParser {
    pub fn new(mode: ParseMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// コマンドテキストをパース
    ///
    /// # 戻り値
    /// * `Ok(ParsedAmountDescription)` - 3トークン以上の場合
    /// * `Err(CommandError::Format)` - トークン不足
    /// * `Err(CommandError::InvalidAmount)` - strictモードで金額が数値でない
    ///
    /// # 例
    /// ```
    /// use expense_bot::domain::{CommandParser, ParseMode};
    ///
    /// let parsed = CommandParser::new(ParseMode::Lenient)
    ///     .parse("/expense 15000 lunch with team")
    ///     .unwrap();
    /// assert_eq!(parsed.amount_token, "15000");
    /// assert_eq!(parsed.description, "lunch with team");
    /// ```
    pub fn parse(&self, raw_text: &str) -> Result<ParsedAmountDescription, CommandError> {
        let tokens: Vec<&str> = raw_text.split_whitespace().collect();
        if tokens.len() < MIN_TOKENS {
            return Err(CommandError::Format);
        }

        let amount_token = tokens[1].to_string();

        if self.mode == ParseMode::Strict {
            Amount::parse(&amount_token).map_err(|source| CommandError::InvalidAmount {
                token: amount_token.clone(),
                source,
            })?;
        }

        let description = tokens[2..].join(" ");

        Ok(ParsedAmountDescription {
            amount_token,
            description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lenient() -> CommandParser {
        CommandParser::new(ParseMode::Lenient)
    }

    fn strict() -> CommandParser {
        CommandParser::new(ParseMode::Strict)
    }

    #[test]
    fn test_parse_basic_command() {
        let parsed = lenient().parse("/expense 15000 lunch").unwrap();
        assert_eq!(parsed.amount_token, "15000");
        assert_eq!(parsed.description, "lunch");
    }

    /// 3トークン未満はすべてFormatエラー
    #[test]
    fn test_parse_too_few_tokens() {
        for input in ["", "   ", "/expense", "/expense 100", "  /expense\t100  "] {
            assert_eq!(lenient().parse(input), Err(CommandError::Format), "input: {input:?}");
            assert_eq!(strict().parse(input), Err(CommandError::Format), "input: {input:?}");
        }
    }

    /// 説明文は3番目以降のトークンを単一スペースで連結したもの
    #[test]
    fn test_parse_description_is_single_space_joined() {
        let parsed = lenient()
            .parse("/gasto   25000\tcena  con\namigos ")
            .unwrap();
        assert_eq!(parsed.amount_token, "25000");
        assert_eq!(parsed.description, "cena con amigos");
    }

    #[test]
    fn test_parse_lenient_keeps_non_numeric_token() {
        let parsed = lenient().parse("/expense abc coffee").unwrap();
        assert_eq!(parsed.amount_token, "abc");
        assert_eq!(parsed.description, "coffee");
    }

    #[test]
    fn test_parse_strict_rejects_non_numeric_token() {
        let result = strict().parse("/expense abc coffee");
        match result {
            Err(CommandError::InvalidAmount { token, source }) => {
                assert_eq!(token, "abc");
                assert_eq!(source, AmountError::NotNumeric("abc".to_string()));
            }
            other => panic!("Expected InvalidAmount, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_strict_accepts_formatted_amount() {
        let parsed = strict().parse("/expense $20,000 groceries").unwrap();
        // トークン自体は加工しない
        assert_eq!(parsed.amount_token, "$20,000");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = lenient();
        let first = parser.parse("/expense 100 coffee and cake");
        let second = parser.parse("/expense 100 coffee and cake");
        assert_eq!(first, second);
    }

    #[test]
    fn test_format_error_message_describes_expected_form() {
        assert_eq!(
            CommandError::Format.to_string(),
            "invalid format, expected: /expense <amount> <description>"
        );
    }
}
