use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Price currently charged.
    pub price: Decimal,
    /// Pre-discount price, present only while a discount is applied.
    pub original_price: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Price fields after applying (or removing) a discount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceChange {
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
}

impl Product {
    /// The undiscounted price; discounts always compute from this.
    pub fn base_price(&self) -> Decimal {
        self.original_price.unwrap_or(self.price)
    }

    /// A zero percent discount restores the base price.
    pub fn with_discount(&self, percent: Decimal) -> PriceChange {
        let base = self.base_price();
        if percent.is_zero() {
            return self.restored();
        }
        PriceChange {
            price: discounted_price(base, percent),
            original_price: Some(base),
            discount_percent: Some(percent),
        }
    }

    pub fn restored(&self) -> PriceChange {
        PriceChange {
            price: self.base_price(),
            original_price: None,
            discount_percent: None,
        }
    }
}

/// `base * (100 - percent) / 100`, rounded half away from zero to cents.
pub fn discounted_price(base: Decimal, percent: Decimal) -> Decimal {
    let hundred = Decimal::ONE_HUNDRED;
    (base * (hundred - percent) / hundred)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Accepted discount range is `[0, 100)`.
pub fn is_valid_discount(percent: Decimal) -> bool {
    percent >= Decimal::ZERO && percent < Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(price: Decimal) -> Product {
        Product {
            id: "p1".into(),
            name: "Mug".into(),
            price,
            original_price: None,
            discount_percent: None,
            active: true,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn twenty_percent_off_one_hundred() {
        let change = product(dec!(100)).with_discount(dec!(20));
        assert_eq!(change.price, dec!(80));
        assert_eq!(change.original_price, Some(dec!(100)));
        assert_eq!(change.discount_percent, Some(dec!(20)));
    }

    #[test]
    fn rediscount_computes_from_original_price() {
        let mut p = product(dec!(100));
        let first = p.with_discount(dec!(20));
        p.price = first.price;
        p.original_price = first.original_price;

        let second = p.with_discount(dec!(50));
        assert_eq!(second.price, dec!(50));
        assert_eq!(second.original_price, Some(dec!(100)));
    }

    #[test]
    fn zero_percent_restores_exactly() {
        let mut p = product(dec!(100));
        let discounted = p.with_discount(dec!(20));
        p.price = discounted.price;
        p.original_price = discounted.original_price;

        let restored = p.with_discount(Decimal::ZERO);
        assert_eq!(restored.price, dec!(100));
        assert_eq!(restored.original_price, None);
        assert_eq!(restored, p.restored());
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(discounted_price(dec!(9.99), dec!(15)), dec!(8.49));
        assert_eq!(discounted_price(dec!(0.05), dec!(50)), dec!(0.03));
    }

    #[test]
    fn discount_range() {
        assert!(is_valid_discount(dec!(0)));
        assert!(is_valid_discount(dec!(99.5)));
        assert!(!is_valid_discount(dec!(100)));
        assert!(!is_valid_discount(dec!(-1)));
    }
}
