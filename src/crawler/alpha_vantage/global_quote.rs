use rust_decimal::{prelude::FromPrimitive, Decimal, RoundingStrategy};
use serde_json::{Map, Value};

use crate::error::IngestError;

const GLOBAL_QUOTE: &str = "Global Quote";
const PRICE: &str = "05. price";
const VOLUME: &str = "06. volume";
/// 超過呼叫頻率或金鑰錯誤時，API 以這些欄位說明原因而不回傳報價
const NOTICE_KEYS: [&str; 3] = ["Note", "Information", "Error Message"];

/// 尚未轉型的報價欄位
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuote {
    pub price: Value,
    pub volume: Value,
}

/// 轉型後的報價
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    /// 四捨五入至小數兩位，對應 DECIMAL(10, 2)
    pub price: Decimal,
    pub volume: i32,
}

/// 解析回應並取出價格與成交量
pub fn parse(body: &str) -> Result<RawQuote, IngestError> {
    extract(&decode(body)?)
}

/// 回應內容必須是 JSON 物件
pub fn decode(body: &str) -> Result<Map<String, Value>, IngestError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(IngestError::Parse(format!(
            "expected a JSON object but got {}",
            json_kind(&other)
        ))),
        Err(why) => Err(IngestError::Parse(format!(
            "Failed to parse API response: {}",
            why
        ))),
    }
}

/// 取出 "Global Quote" 內的價格與成交量。
///
/// 沒有 "Global Quote" 時視同空物件；欄位不存在或為空值時回傳 [`IngestError::DataMissing`]。
pub fn extract(data: &Map<String, Value>) -> Result<RawQuote, IngestError> {
    let empty = Map::new();
    let quote = match data.get(GLOBAL_QUOTE) {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(quote)) => quote,
        Some(other) => {
            return Err(IngestError::Parse(format!(
                "'{}' should be an object but got {}",
                GLOBAL_QUOTE,
                json_kind(other)
            )))
        }
    };

    let price = quote.get(PRICE).filter(|v| is_truthy(v));
    let volume = quote.get(VOLUME).filter(|v| is_truthy(v));

    match (price, volume) {
        (Some(price), Some(volume)) => Ok(RawQuote {
            price: price.clone(),
            volume: volume.clone(),
        }),
        _ => {
            let mut msg = "Missing 'price' or 'volume' in API response".to_string();
            if let Some(notice) = NOTICE_KEYS
                .iter()
                .find_map(|key| data.get(*key).map(|v| (key, raw_text(v))))
            {
                msg.push_str(&format!(" ({}: {})", notice.0, notice.1));
            }
            Err(IngestError::DataMissing(msg))
        }
    }
}

impl RawQuote {
    /// 價格轉為浮點數後再轉 Decimal，成交量轉為整數。
    pub fn convert(&self) -> Result<Quote, IngestError> {
        let price_text = raw_text(&self.price);
        let volume_text = raw_text(&self.volume);
        let failed = |reason: String| IngestError::TypeConversion {
            reason,
            price: price_text.clone(),
            volume: volume_text.clone(),
        };

        let price = price_text
            .trim()
            .parse::<f64>()
            .map_err(|why| failed(format!("price: {}", why)))?;
        if !price.is_finite() {
            return Err(failed("price is not a finite number".to_string()));
        }
        let price = Decimal::from_f64(price)
            .ok_or_else(|| failed("price is out of range".to_string()))?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        let volume = volume_text
            .trim()
            .parse::<i64>()
            .map_err(|why| failed(format!("volume: {}", why)))?;
        let volume = i32::try_from(volume)
            .ok()
            .filter(|v| *v >= 0)
            .ok_or_else(|| failed("volume must be between 0 and 2147483647".to_string()))?;

        Ok(Quote { price, volume })
    }
}

/// null、空字串、false、0、空陣列與空物件都視為沒有值
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_and_convert() {
        let body = r#"{"Global Quote": {"01. symbol": "AAPL", "05. price": "150.23", "06. volume": "1000000"}}"#;

        let quote = parse(body).unwrap().convert().unwrap();

        assert_eq!(quote.price, dec!(150.23));
        assert_eq!(quote.volume, 1_000_000);
    }

    #[test]
    fn test_price_rounds_to_two_places() {
        let raw = RawQuote {
            price: json!("189.9876"),
            volume: json!(" 42 "),
        };

        let quote = raw.convert().unwrap();

        assert_eq!(quote.price, dec!(189.99));
        assert_eq!(quote.volume, 42);
    }

    #[test]
    fn test_numeric_json_values() {
        let raw = RawQuote {
            price: json!(12.5),
            volume: json!(300),
        };

        let quote = raw.convert().unwrap();

        assert_eq!(quote.price, dec!(12.5));
        assert_eq!(quote.volume, 300);
    }

    #[test]
    fn test_invalid_body_is_parse_error() {
        assert!(matches!(parse("<html>busy</html>"), Err(IngestError::Parse(_))));
        assert!(matches!(parse("[1, 2]"), Err(IngestError::Parse(_))));
        assert!(matches!(
            parse(r#"{"Global Quote": "n/a"}"#),
            Err(IngestError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_global_quote_is_data_missing() {
        assert!(matches!(
            parse(r#"{"Global Quote": {}}"#),
            Err(IngestError::DataMissing(_))
        ));
    }

    #[test]
    fn test_missing_global_quote_is_data_missing() {
        let result = parse(r#"{"Note": "Thank you for using Alpha Vantage!"}"#);

        match result {
            Err(IngestError::DataMissing(msg)) => {
                assert!(msg.contains("Note: Thank you for using Alpha Vantage!"))
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_falsy_fields_are_data_missing() {
        for quote in [
            json!({"05. price": "", "06. volume": "100"}),
            json!({"05. price": "1.00", "06. volume": null}),
            json!({"05. price": "1.00", "06. volume": 0}),
            json!({"05. price": "1.00"}),
        ] {
            let mut data = Map::new();
            data.insert(GLOBAL_QUOTE.to_string(), quote);
            assert!(matches!(extract(&data), Err(IngestError::DataMissing(_))));
        }
    }

    #[test]
    fn test_zero_string_is_not_missing() {
        let raw = parse(r#"{"Global Quote": {"05. price": "0", "06. volume": "0"}}"#).unwrap();

        let quote = raw.convert().unwrap();

        assert_eq!(quote.price, Decimal::ZERO);
        assert_eq!(quote.volume, 0);
    }

    #[test]
    fn test_non_numeric_values_keep_raw_data() {
        let raw = RawQuote {
            price: json!("abc"),
            volume: json!("1000"),
        };

        match raw.convert() {
            Err(IngestError::TypeConversion { price, volume, .. }) => {
                assert_eq!(price, "abc");
                assert_eq!(volume, "1000");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_volume_out_of_range() {
        for volume in ["-5", "1.5", "3000000000"] {
            let raw = RawQuote {
                price: json!("10"),
                volume: json!(volume),
            };
            assert!(matches!(
                raw.convert(),
                Err(IngestError::TypeConversion { .. })
            ));
        }
    }

    #[test]
    fn test_non_finite_price() {
        let raw = RawQuote {
            price: json!("NaN"),
            volume: json!("10"),
        };

        assert!(matches!(
            raw.convert(),
            Err(IngestError::TypeConversion { .. })
        ));
    }
}
