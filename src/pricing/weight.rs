//! First-class item weight.
//!
//! Bucket weights arrive as strings with an embedded unit ("1 oz", "10 g").
//! Parsing happens once, here, into a `Weight { value, unit }` pair with a
//! single conversion to troy ounces.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;

/// Supported weight units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightUnit {
    TroyOunce,
    Gram,
    Kilogram,
    Pound,
}

impl WeightUnit {
    /// Fixed conversion factor to troy ounces
    pub fn troy_oz_factor(&self) -> Decimal {
        match self {
            WeightUnit::TroyOunce => Decimal::ONE,
            WeightUnit::Gram => dec!(0.0321507),
            WeightUnit::Kilogram => dec!(32.1507),
            WeightUnit::Pound => dec!(14.5833),
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "" | "oz" | "ozt" | "toz" => Some(WeightUnit::TroyOunce),
            "g" | "gram" | "grams" => Some(WeightUnit::Gram),
            "kg" | "kilo" | "kilogram" | "kilograms" => Some(WeightUnit::Kilogram),
            "lb" | "lbs" | "pound" | "pounds" => Some(WeightUnit::Pound),
            _ => None,
        }
    }
}

/// A parsed item weight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weight {
    pub value: Decimal,
    pub unit: WeightUnit,
}

impl Weight {
    /// One troy ounce, the fallback for unparsable bucket weights
    pub fn one_troy_oz() -> Self {
        Self {
            value: Decimal::ONE,
            unit: WeightUnit::TroyOunce,
        }
    }

    /// Parse a weight string: numeric value followed by an optional unit
    /// token. A bare number is read as troy ounces.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        let split = normalized
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(normalized.len());
        let (number, unit_token) = normalized.split_at(split);

        let value = Decimal::from_str(number).ok()?;
        if value <= Decimal::ZERO {
            return None;
        }

        let unit = WeightUnit::from_token(unit_token.trim())?;
        Some(Self { value, unit })
    }

    /// Convert to troy ounces
    pub fn troy_oz(&self) -> Decimal {
        self.value * self.unit.troy_oz_factor()
    }
}
