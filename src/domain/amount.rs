// 金額値オブジェクト
//
// コマンドのトークンや抽出サービスの文字列値を数値に変換する。
// 桁区切りと通貨記号は取り除き、数値にならないものはゼロに丸めずエラーにする。

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// 除去する通貨記号
const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

/// 金額変換エラー
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AmountError {
    /// 数値として解釈できない
    #[error("amount must be numeric: {0}")]
    NotNumeric(String),

    /// 負の値
    #[error("amount must not be negative: {0}")]
    Negative(String),
}

/// 非負かつ有限の金額
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Amount(f64);

impl Amount {
    /// 数値から金額を作成
    pub fn new(value: f64) -> Result<Self, AmountError> {
        if !value.is_finite() {
            return Err(AmountError::NotNumeric(value.to_string()));
        }
        if value < 0.0 {
            return Err(AmountError::Negative(value.to_string()));
        }
        // -0.0を0.0に揃える
        Ok(Self(value + 0.0))
    }

    /// 文字列から金額を解釈する
    ///
    /// `"20,000"`, `"$20000"`, `" 1 500 "` などを受け付ける。
    /// `"abc"`, `"NaN"`, `"inf"` は`NotNumeric`になる。
    ///
    /// # 例
    /// ```
    /// use expense_bot::domain::Amount;
    ///
    /// assert_eq!(Amount::parse("$20,000").unwrap().value(), 20000.0);
    /// assert!(Amount::parse("abc").is_err());
    /// ```
    pub fn parse(token: &str) -> Result<Self, AmountError> {
        let cleaned: String = token
            .trim()
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
            .collect();

        if cleaned.is_empty() {
            return Err(AmountError::NotNumeric(token.to_string()));
        }

        let value = cleaned
            .parse::<f64>()
            .map_err(|_| AmountError::NotNumeric(token.to_string()))?;

        if !value.is_finite() {
            return Err(AmountError::NotNumeric(token.to_string()));
        }
        if value < 0.0 {
            return Err(AmountError::Negative(token.to_string()));
        }

        Ok(Self(value + 0.0))
    }

    /// JSON値（数値または文字列）から金額を解釈する
    pub fn from_json(value: &Value) -> Result<Self, AmountError> {
        match value {
            Value::Number(number) => match number.as_f64() {
                Some(v) => Self::new(v),
                None => Err(AmountError::NotNumeric(number.to_string())),
            },
            Value::String(text) => Self::parse(text),
            other => Err(AmountError::NotNumeric(other.to_string())),
        }
    }

    /// 数値を取得
    pub fn value(&self) -> f64 {
        self.0
    }

    /// スプレッドシートに書き込むJSON値
    ///
    /// 整数値は整数として、それ以外は小数として出力する。
    pub fn to_json_value(&self) -> Value {
        // 2^53未満なら整数として正確に表現できる
        if self.0.fract() == 0.0 && self.0 < 9_007_199_254_740_992.0 {
            Value::from(self.0 as i64)
        } else {
            Value::from(self.0)
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_integer() {
        assert_eq!(Amount::parse("15000").unwrap().value(), 15000.0);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(Amount::parse("12.50").unwrap().value(), 12.5);
    }

    #[test]
    fn test_parse_strips_thousands_separator_and_currency() {
        assert_eq!(Amount::parse("20,000").unwrap().value(), 20000.0);
        assert_eq!(Amount::parse("$20000").unwrap().value(), 20000.0);
        assert_eq!(Amount::parse(" € 1 500 ").unwrap().value(), 1500.0);
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert_eq!(
            Amount::parse("abc"),
            Err(AmountError::NotNumeric("abc".to_string()))
        );
        assert!(matches!(Amount::parse(""), Err(AmountError::NotNumeric(_))));
        assert!(matches!(Amount::parse("$"), Err(AmountError::NotNumeric(_))));
        assert!(matches!(Amount::parse("12abc"), Err(AmountError::NotNumeric(_))));
    }

    /// f64のパーサーが受け付けるNaN/無限大も数値扱いしない
    #[test]
    fn test_parse_rejects_nan_and_infinity() {
        assert!(matches!(Amount::parse("NaN"), Err(AmountError::NotNumeric(_))));
        assert!(matches!(Amount::parse("inf"), Err(AmountError::NotNumeric(_))));
        assert!(matches!(Amount::parse("-infinity"), Err(AmountError::NotNumeric(_))));
    }

    #[test]
    fn test_parse_rejects_negative() {
        assert_eq!(
            Amount::parse("-5"),
            Err(AmountError::Negative("-5".to_string()))
        );
    }

    #[test]
    fn test_negative_zero_is_zero() {
        let amount = Amount::parse("-0").unwrap();
        assert_eq!(amount.value(), 0.0);
        assert!(amount.value().is_sign_positive());
    }

    #[test]
    fn test_from_json_number_and_string() {
        assert_eq!(Amount::from_json(&json!(20000)).unwrap().value(), 20000.0);
        assert_eq!(Amount::from_json(&json!(12.75)).unwrap().value(), 12.75);
        assert_eq!(Amount::from_json(&json!("20,000")).unwrap().value(), 20000.0);
        assert!(Amount::from_json(&json!(null)).is_err());
        assert!(Amount::from_json(&json!(true)).is_err());
        assert!(Amount::from_json(&json!(-3)).is_err());
    }

    #[test]
    fn test_display_omits_trailing_zero() {
        assert_eq!(Amount::parse("15000").unwrap().to_string(), "15000");
        assert_eq!(Amount::parse("12.5").unwrap().to_string(), "12.5");
    }

    #[test]
    fn test_to_json_value() {
        assert_eq!(Amount::parse("15000").unwrap().to_json_value(), json!(15000));
        assert_eq!(Amount::parse("12.5").unwrap().to_json_value(), json!(12.5));
    }
}
