//! Loyalty points policy: earning formula, tier thresholds and benefits,
//! redemption rules. Everything here is pure so it can be exercised without
//! a database.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::models::MembershipTier;

/// Points earned per currency unit spent.
pub const POINTS_PER_UNIT: i64 = 10;

/// Minimum number of points that can be redeemed in one go.
pub const MIN_POINTS_REDEMPTION: i64 = 100;

/// Currency value of a single point.
pub const POINT_VALUE: Decimal = dec!(0.01);

/// Flat tax surcharge applied once to an order subtotal.
pub const TAX_RATE: Decimal = dec!(0.02);

/// Points-earning multiplier for a membership tier.
pub fn tier_multiplier(tier: MembershipTier) -> Decimal {
    match tier {
        MembershipTier::Bronze => dec!(1.0),
        MembershipTier::Silver => dec!(1.2),
        MembershipTier::Gold => dec!(1.5),
        MembershipTier::Platinum => dec!(2.0),
    }
}

/// Lifetime-spend threshold at which a tier is reached (boundary inclusive).
pub fn tier_threshold(tier: MembershipTier) -> Decimal {
    match tier {
        MembershipTier::Bronze => dec!(0),
        MembershipTier::Silver => dec!(100),
        MembershipTier::Gold => dec!(500),
        MembershipTier::Platinum => dec!(1000),
    }
}

/// Maps lifetime delivered spend to a membership tier.
pub fn tier_for_spend(total_spent: Decimal) -> MembershipTier {
    if total_spent >= tier_threshold(MembershipTier::Platinum) {
        MembershipTier::Platinum
    } else if total_spent >= tier_threshold(MembershipTier::Gold) {
        MembershipTier::Gold
    } else if total_spent >= tier_threshold(MembershipTier::Silver) {
        MembershipTier::Silver
    } else {
        MembershipTier::Bronze
    }
}

/// Points earned for an order: `floor(floor(amount * 10) * multiplier)`.
/// Both truncations are deliberate; partial points are never awarded.
pub fn points_earned(order_amount: Decimal, tier: MembershipTier) -> i64 {
    let base = (order_amount * Decimal::from(POINTS_PER_UNIT))
        .floor()
        .to_i64()
        .unwrap_or(0);
    (Decimal::from(base) * tier_multiplier(tier))
        .floor()
        .to_i64()
        .unwrap_or(0)
}

/// Currency value of a points balance (1 point = 0.01).
pub fn points_value(points: i64) -> Decimal {
    Decimal::from(points) * POINT_VALUE
}

/// A redemption is valid when it meets the minimum and fits the balance.
pub fn can_redeem(balance: i64, requested: i64) -> bool {
    requested >= MIN_POINTS_REDEMPTION && balance >= requested
}

/// Order total including tax: `subtotal + floor(subtotal * 0.02)`. The tax
/// component truncates to a whole currency unit and is applied once to the
/// summed subtotal, on every payment path.
pub fn order_total_with_tax(subtotal: Decimal) -> Decimal {
    subtotal + (subtotal * TAX_RATE).floor()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierBenefits {
    pub points_multiplier: &'static str,
    pub description: &'static str,
    pub perks: &'static [&'static str],
}

pub fn tier_benefits(tier: MembershipTier) -> TierBenefits {
    match tier {
        MembershipTier::Bronze => TierBenefits {
            points_multiplier: "1x",
            description: "Earn 10 points per $1 spent",
            perks: &["Basic rewards program"],
        },
        MembershipTier::Silver => TierBenefits {
            points_multiplier: "1.2x",
            description: "Earn 12 points per $1 spent",
            perks: &["20% bonus points", "Priority customer support"],
        },
        MembershipTier::Gold => TierBenefits {
            points_multiplier: "1.5x",
            description: "Earn 15 points per $1 spent",
            perks: &["50% bonus points", "Free delivery", "Exclusive offers"],
        },
        MembershipTier::Platinum => TierBenefits {
            points_multiplier: "2x",
            description: "Earn 20 points per $1 spent",
            perks: &[
                "100% bonus points",
                "Free delivery",
                "VIP support",
                "Early access to sales",
            ],
        },
    }
}

/// Formats a points count with thousands separators, e.g. `1,250`.
pub fn format_points(points: i64) -> String {
    let digits = points.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if points < 0 {
        format!("-{out}")
    } else {
        out
    }
}

/// Formats a currency amount as `$x.yy`.
pub fn format_currency(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_are_inclusive() {
        assert_eq!(tier_for_spend(dec!(0)), MembershipTier::Bronze);
        assert_eq!(tier_for_spend(dec!(99.99)), MembershipTier::Bronze);
        assert_eq!(tier_for_spend(dec!(100)), MembershipTier::Silver);
        assert_eq!(tier_for_spend(dec!(499.99)), MembershipTier::Silver);
        assert_eq!(tier_for_spend(dec!(500)), MembershipTier::Gold);
        assert_eq!(tier_for_spend(dec!(1000)), MembershipTier::Platinum);
        assert_eq!(tier_for_spend(dec!(25000)), MembershipTier::Platinum);
    }

    #[test]
    fn points_earned_truncates_at_both_steps() {
        // floor(97 * 10) = 970 base points
        assert_eq!(points_earned(dec!(97), MembershipTier::Bronze), 970);
        // floor(970 * 1.2) = 1164
        assert_eq!(points_earned(dec!(97), MembershipTier::Silver), 1164);
        // floor(floor(10.57 * 10) * 1.5) = floor(105 * 1.5) = 157
        assert_eq!(points_earned(dec!(10.57), MembershipTier::Gold), 157);
        assert_eq!(points_earned(dec!(97), MembershipTier::Platinum), 1940);
    }

    #[test]
    fn tax_truncates_on_the_summed_total() {
        // floor(97 * 0.02) = 1
        assert_eq!(order_total_with_tax(dec!(97)), dec!(98));
        // floor(150 * 0.02) = 3
        assert_eq!(order_total_with_tax(dec!(150)), dec!(153));
        // floor(49 * 0.02) = 0, no tax on small totals
        assert_eq!(order_total_with_tax(dec!(49)), dec!(49));
    }

    #[test]
    fn redemption_rules() {
        assert!(!can_redeem(500, 99));
        assert!(can_redeem(500, 100));
        assert!(can_redeem(500, 500));
        assert!(!can_redeem(500, 501));
        assert!(!can_redeem(0, 100));
    }

    #[test]
    fn point_values() {
        assert_eq!(points_value(100), dec!(1.00));
        assert_eq!(points_value(1000), dec!(10.00));
    }

    #[test]
    fn formatting() {
        assert_eq!(format_points(950), "950");
        assert_eq!(format_points(1250), "1,250");
        assert_eq!(format_points(1234567), "1,234,567");
        assert_eq!(format_points(-1500), "-1,500");
        assert_eq!(format_currency(dec!(2.5)), "$2.50");
        assert_eq!(format_currency(dec!(98)), "$98.00");
    }
}
