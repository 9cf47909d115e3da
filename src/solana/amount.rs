use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Largest decimal count we scale to. `10^38` still fits in an `i128`.
const MAX_DECIMALS: u8 = 38;

/// A numeric amount exactly as an upstream provider encoded it.
///
/// Providers mix integers (lamports, raw token units), floats (UI amounts)
/// and strings (raw amounts, UI amount strings, occasionally scientific
/// notation). Everything is funneled through [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub enum RawAmount {
    Int(i128),
    Float(f64),
    Text(String),
}

impl RawAmount {
    /// Interpret a JSON value as an amount. Objects, arrays, booleans and
    /// nulls are not amounts.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => {
                if let Some(v) = number.as_i64() {
                    Some(Self::Int(v as i128))
                } else if let Some(v) = number.as_u64() {
                    Some(Self::Int(v as i128))
                } else {
                    number.as_f64().map(Self::Float)
                }
            }
            Value::String(text) => Some(Self::Text(text.clone())),
            _ => None,
        }
    }
}

/// Convert a provider amount to an exact integer scaled by `10^decimals`.
///
/// Fractional digits beyond `decimals` are truncated. Anything that cannot
/// be parsed, or that overflows `i128`, resolves to zero: amount fields are
/// frequently missing or malformed upstream and must not abort a parse.
pub fn normalize(value: &RawAmount, decimals: u8) -> i128 {
    match value {
        RawAmount::Int(v) => pow10(decimals)
            .and_then(|scale| v.checked_mul(scale))
            .unwrap_or(0),
        RawAmount::Float(v) => {
            if !v.is_finite() {
                return 0;
            }
            // Display for f64 yields the shortest exact decimal expansion,
            // never an exponent, so the string path stays float-free.
            normalize_str(&v.to_string(), decimals)
        }
        RawAmount::Text(text) => normalize_str(text, decimals),
    }
}

/// String form of [`normalize`]; accepts `"12"`, `"-0.5"`, `"1.23e-7"`, `"4E+3"`.
pub fn normalize_str(input: &str, decimals: u8) -> i128 {
    parse_scaled(input.trim(), decimals).unwrap_or(0)
}

fn parse_scaled(input: &str, decimals: u8) -> Option<i128> {
    if decimals > MAX_DECIMALS {
        return None;
    }

    let (negative, unsigned) = match input.as_bytes().first()? {
        b'-' => (true, &input[1..]),
        b'+' => (false, &input[1..]),
        _ => (false, input),
    };

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(pos) => {
            let exponent: i64 = unsigned[pos + 1..].parse().ok()?;
            (&unsigned[..pos], exponent)
        }
        None => (unsigned, 0),
    };

    let (whole, fraction) = match mantissa.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (mantissa, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    // Anything shifted further than this is either zero or an overflow.
    if exponent.unsigned_abs() > 4096 {
        return None;
    }

    let digits: Vec<u8> = whole.bytes().chain(fraction.bytes()).collect();
    let point = whole.len() as i64 + exponent;

    // Integer digits left of the shifted point, fractional digits right of it.
    let mut scaled = String::with_capacity(digits.len() + decimals as usize);
    if point > 0 {
        for i in 0..point {
            scaled.push(*digits.get(i as usize).unwrap_or(&b'0') as char);
        }
    }
    for k in 0..decimals as i64 {
        let index = point + k;
        let digit = if index >= 0 {
            *digits.get(index as usize).unwrap_or(&b'0')
        } else {
            b'0'
        };
        scaled.push(digit as char);
    }

    let significant = scaled.trim_start_matches('0');
    if significant.is_empty() {
        return Some(0);
    }
    let magnitude: i128 = significant.parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// `10^decimals` as an `i128`, if it fits.
pub fn pow10(decimals: u8) -> Option<i128> {
    10i128.checked_pow(decimals as u32)
}

/// An exact amount together with the decimal count it is scaled by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScaledAmount {
    pub raw: i128,
    pub decimals: u8,
}

impl ScaledAmount {
    pub fn new(raw: i128, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub fn zero(decimals: u8) -> Self {
        Self { raw: 0, decimals }
    }

    pub fn parse(value: &RawAmount, decimals: u8) -> Self {
        Self::new(normalize(value, decimals), decimals)
    }

    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    pub fn abs(&self) -> Self {
        Self::new(self.raw.saturating_abs(), self.decimals)
    }

    /// Lossy conversion for the USD display boundary only.
    pub fn to_f64(&self) -> f64 {
        match pow10(self.decimals) {
            Some(scale) => {
                let whole = (self.raw / scale) as f64;
                let fraction = (self.raw % scale) as f64 / scale as f64;
                whole + fraction
            }
            None => 0.0,
        }
    }
}

impl fmt::Display for ScaledAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.raw.unsigned_abs().to_string();
        let decimals = self.decimals as usize;
        let sign = if self.raw < 0 { "-" } else { "" };

        if decimals == 0 {
            return write!(f, "{}{}", sign, digits);
        }

        let padded = format!("{:0>width$}", digits, width = decimals + 1);
        let (whole, fraction) = padded.split_at(padded.len() - decimals);
        let fraction = fraction.trim_end_matches('0');
        if fraction.is_empty() {
            write!(f, "{}{}", sign, whole)
        } else {
            write!(f, "{}{}.{}", sign, whole, fraction)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawAmount {
        RawAmount::Text(s.to_string())
    }

    #[test]
    fn plain_decimal_strings_scale_exactly() {
        assert_eq!(normalize(&text("1.5"), 6), 1_500_000);
        assert_eq!(normalize(&text("0.000001"), 6), 1);
        assert_eq!(normalize(&text("42"), 9), 42_000_000_000);
        assert_eq!(normalize(&text(".25"), 2), 25);
    }

    #[test]
    fn extra_fraction_digits_are_truncated() {
        assert_eq!(normalize(&text("1.23456789"), 4), 12_345);
        assert_eq!(normalize(&text("-1.23456789"), 4), -12_345);
    }

    #[test]
    fn scientific_notation_shifts_the_point() {
        assert_eq!(normalize(&text("1.23e-7"), 9), 123);
        assert_eq!(normalize(&text("1.5e-6"), 9), 1_500);
        assert_eq!(normalize(&text("4E+3"), 2), 400_000);
        assert_eq!(normalize(&text("-2.5e1"), 0), -25);
    }

    #[test]
    fn sign_does_not_disturb_padding() {
        assert_eq!(normalize(&text("-0.05"), 3), -50);
        assert_eq!(normalize(&text("+0.05"), 3), 50);
        assert_eq!(normalize(&text("-0"), 3), 0);
    }

    #[test]
    fn eighteen_decimals_do_not_drift() {
        let value = normalize(&text("123456789.123456789123456789"), 18);
        assert_eq!(value, 123_456_789_123_456_789_123_456_789);
    }

    #[test]
    fn floats_take_the_string_path() {
        assert_eq!(normalize(&RawAmount::Float(0.1), 9), 100_000_000);
        assert_eq!(normalize(&RawAmount::Float(1.23e-7), 9), 123);
        assert_eq!(normalize(&RawAmount::Float(f64::NAN), 9), 0);
    }

    #[test]
    fn integers_are_scaled() {
        assert_eq!(normalize(&RawAmount::Int(-7), 3), -7_000);
        assert_eq!(normalize(&RawAmount::Int(i128::MAX), 3), 0);
    }

    #[test]
    fn garbage_resolves_to_zero() {
        for input in ["", "abc", "1.2.3", "1e", "e5", "--1", "1,5", "."] {
            assert_eq!(normalize(&text(input), 6), 0, "input {:?}", input);
        }
    }

    #[test]
    fn normalized_values_render_back_to_the_input() {
        let cases = [
            ("1.5", 6, "1.5"),
            ("0.000123", 6, "0.000123"),
            ("-12.3400", 4, "-12.34"),
            ("1.5e-6", 9, "0.0000015"),
            ("7", 0, "7"),
            ("0.999999999999999999", 18, "0.999999999999999999"),
        ];
        for (input, decimals, expected) in cases {
            let amount = ScaledAmount::parse(&text(input), decimals);
            assert_eq!(amount.to_string(), expected, "input {}", input);
        }
    }

    #[test]
    fn json_numbers_and_strings_are_amounts() {
        assert_eq!(
            RawAmount::from_json(&serde_json::json!(5000)),
            Some(RawAmount::Int(5000))
        );
        assert_eq!(
            RawAmount::from_json(&serde_json::json!("1e-3")),
            Some(text("1e-3"))
        );
        assert_eq!(RawAmount::from_json(&serde_json::json!(null)), None);
    }
}
