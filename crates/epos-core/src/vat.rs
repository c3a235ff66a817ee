//! # VAT Calculator
//!
//! UK VAT rates as published by HMRC, and the lookup that turns a price and
//! a rate id into a VAT amount.
//!
//! ```text
//! ┌──────────────┬─────────────────┬────────┬─────────┐
//! │ id           │ name            │ rate   │ default │
//! ├──────────────┼─────────────────┼────────┼─────────┤
//! │ standard     │ Standard Rate   │ 20%    │   ✓     │
//! │ reduced      │ Reduced Rate    │  5%    │         │
//! │ zero         │ Zero Rate       │  0%    │         │
//! │ exempt       │ VAT Exempt      │  0%    │         │
//! └──────────────┴─────────────────┴────────┴─────────┘
//! ```
//!
//! A change in UK VAT policy is a change to [`UK_VAT_RATES`] only.

use serde::Serialize;
use ts_rs::TS;

use crate::money::Money;
use crate::types::TaxRate;

/// One row of the VAT rate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct VatRate {
    #[ts(type = "string")]
    pub id: &'static str,
    #[ts(type = "string")]
    pub name: &'static str,
    pub rate: TaxRate,
    pub is_default: bool,
}

/// The UK VAT rate table. Exactly one row is the default.
pub const UK_VAT_RATES: [VatRate; 4] = [
    VatRate {
        id: "standard",
        name: "Standard Rate",
        rate: TaxRate::from_percent(20),
        is_default: true,
    },
    VatRate {
        id: "reduced",
        name: "Reduced Rate",
        rate: TaxRate::from_percent(5),
        is_default: false,
    },
    VatRate {
        id: "zero",
        name: "Zero Rate",
        rate: TaxRate::zero(),
        is_default: false,
    },
    VatRate {
        id: "exempt",
        name: "VAT Exempt",
        rate: TaxRate::zero(),
        is_default: false,
    },
];

/// Looks up a rate by id.
pub fn find_rate(rate_id: &str) -> Option<&'static VatRate> {
    UK_VAT_RATES.iter().find(|r| r.id == rate_id)
}

/// The default-flagged rate.
pub fn default_rate() -> &'static VatRate {
    UK_VAT_RATES
        .iter()
        .find(|r| r.is_default)
        .unwrap_or(&UK_VAT_RATES[0])
}

/// Looks up a rate by id, falling back to the default rate. Never fails.
///
/// ## Example
/// ```rust
/// use epos_core::vat::resolve_rate;
///
/// assert_eq!(resolve_rate("reduced").name, "Reduced Rate");
/// // the product grid still uses the legacy "std" id
/// assert_eq!(resolve_rate("std").id, "standard");
/// ```
pub fn resolve_rate(rate_id: &str) -> &'static VatRate {
    find_rate(rate_id).unwrap_or_else(default_rate)
}

/// VAT due on `price` at the rate named by `rate_id`, rounded to the penny.
///
/// ## Example
/// ```rust
/// use epos_core::money::Money;
/// use epos_core::vat::vat_amount;
///
/// assert_eq!(vat_amount(Money::from_pence(999), "standard").pence(), 200);
/// assert_eq!(vat_amount(Money::from_pence(999), "zero").pence(), 0);
/// ```
pub fn vat_amount(price: Money, rate_id: &str) -> Money {
    price.calculate_vat(resolve_rate(rate_id).rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_tax_rate;

    #[test]
    fn test_rate_table_shape_matches_bindings() {
        let decl = VatRate::decl();
        for field in ["id: string", "name: string", "rate: TaxRate", "isDefault: boolean"] {
            assert!(decl.contains(field), "{field} missing from {decl}");
        }

        let json = serde_json::to_value(default_rate()).unwrap();
        assert_eq!(json["id"], "standard");
        assert_eq!(json["isDefault"], true);
    }

    #[test]
    fn test_exactly_one_default_rate() {
        let defaults = UK_VAT_RATES.iter().filter(|r| r.is_default).count();
        assert_eq!(defaults, 1);
        assert_eq!(default_rate().id, "standard");
    }

    #[test]
    fn test_rates_within_bounds() {
        for rate in &UK_VAT_RATES {
            assert!(validate_tax_rate(rate.rate).is_ok(), "{} out of range", rate.id);
        }
    }

    #[test]
    fn test_rate_ids_unique() {
        for (i, a) in UK_VAT_RATES.iter().enumerate() {
            for b in &UK_VAT_RATES[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn test_vat_amount_per_rate() {
        let price = Money::from_pence(1000);
        assert_eq!(vat_amount(price, "standard").pence(), 200);
        assert_eq!(vat_amount(price, "reduced").pence(), 50);
        assert_eq!(vat_amount(price, "zero").pence(), 0);
        assert_eq!(vat_amount(price, "exempt").pence(), 0);
    }

    #[test]
    fn test_unknown_rate_falls_back_to_standard() {
        let price = Money::from_pence(1999);
        assert_eq!(vat_amount(price, "std"), vat_amount(price, "standard"));
        assert_eq!(vat_amount(price, ""), Money::from_pence(400));
    }
}
