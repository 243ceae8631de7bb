//! Points award and redemption service.
//!
//! The ledger mutations are pure functions over an in-memory [`User`] so the
//! idempotency and balance invariants are testable without a database; the
//! service wraps them with row-locked loads and a single write-back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{MembershipTier, PointsEntry, TransactionType, User};
use crate::points::{
    can_redeem, format_currency, format_points, points_earned, points_value, tier_benefits,
    tier_for_spend, TierBenefits, MIN_POINTS_REDEMPTION,
};
use crate::repo::{OrderRepo, UserRepo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardOutcome {
    pub points_earned: i64,
    pub new_tier: Option<MembershipTier>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemOutcome {
    pub points_redeemed: i64,
    pub discount_amount: Decimal,
    pub remaining_points: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsSnapshot {
    pub points: i64,
    pub total_points_earned: i64,
    pub total_points_redeemed: i64,
    pub membership_tier: MembershipTier,
    pub tier_benefits: TierBenefits,
    pub points_value: Decimal,
    pub can_redeem: bool,
    pub min_points_for_redemption: i64,
    pub total_spent: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsHistory {
    pub points_history: Vec<PointsEntry>,
    pub total_points_earned: i64,
    pub total_points_redeemed: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionOption {
    pub points: i64,
    pub value: Decimal,
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionOptions {
    pub available_points: i64,
    pub redemption_options: Vec<RedemptionOption>,
    pub min_points_required: i64,
}

/// Credits an order's points to the user in memory. Returns `None` when the
/// ledger already holds an earned entry for this order (the idempotency
/// guard), leaving the user untouched.
pub fn apply_award(
    user: &mut User,
    order_id: Uuid,
    order_amount: Decimal,
    lifetime_spend: Decimal,
    now: DateTime<Utc>,
) -> Option<AwardOutcome> {
    let already_awarded = user.points_history.iter().any(|entry| {
        entry.transaction_type == TransactionType::Earned && entry.order_id == Some(order_id)
    });
    if already_awarded {
        return None;
    }

    let earned = points_earned(order_amount, user.membership_tier);
    user.points += earned;
    user.total_points_earned += earned;
    user.points_history.push(PointsEntry {
        transaction_type: TransactionType::Earned,
        amount: earned,
        description: format!(
            "Earned {} points from order #{order_id}",
            format_points(earned)
        ),
        order_id: Some(order_id),
        created_at: now,
    });

    let computed = tier_for_spend(lifetime_spend);
    let mut new_tier = None;
    if computed != user.membership_tier {
        user.membership_tier = computed;
        user.points_history.push(PointsEntry {
            transaction_type: TransactionType::Earned,
            amount: 0,
            description: format!("Upgraded to {computed} membership tier!"),
            order_id: None,
            created_at: now,
        });
        new_tier = Some(computed);
    }

    Some(AwardOutcome {
        points_earned: earned,
        new_tier,
    })
}

/// Debits a redemption from the user in memory, validating the minimum and
/// the balance first. On error the user is unchanged.
pub fn apply_redemption(
    user: &mut User,
    points_to_redeem: i64,
    now: DateTime<Utc>,
) -> Result<RedeemOutcome, ApiError> {
    if points_to_redeem <= 0 {
        return Err(ApiError::Validation(
            "Please specify a valid number of points to redeem".into(),
        ));
    }
    if !can_redeem(user.points, points_to_redeem) {
        return Err(ApiError::Validation(format!(
            "You need at least {MIN_POINTS_REDEMPTION} points to redeem. You have {} points.",
            user.points
        )));
    }

    let discount = points_value(points_to_redeem);
    user.points -= points_to_redeem;
    user.total_points_redeemed += points_to_redeem;
    user.points_history.push(PointsEntry {
        transaction_type: TransactionType::Redeemed,
        amount: -points_to_redeem,
        description: format!(
            "Redeemed {} points for {} discount",
            format_points(points_to_redeem),
            format_currency(discount)
        ),
        order_id: None,
        created_at: now,
    });

    Ok(RedeemOutcome {
        points_redeemed: points_to_redeem,
        discount_amount: discount,
        remaining_points: user.points,
    })
}

#[derive(Clone)]
pub struct PointsService {
    users: UserRepo,
    orders: OrderRepo,
}

impl PointsService {
    pub fn new(users: UserRepo, orders: OrderRepo) -> Self {
        Self { users, orders }
    }

    /// Idempotently awards points for a delivered order. Runs on the caller's
    /// connection so the lifecycle manager can scope it to the same
    /// transaction as the status update.
    pub async fn award_points_for_order(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        order_id: Uuid,
        order_amount: Decimal,
    ) -> Result<Option<AwardOutcome>, ApiError> {
        if order_amount <= Decimal::ZERO {
            return Err(ApiError::Validation(
                "order amount must be positive for a points award".into(),
            ));
        }

        let mut user = self
            .users
            .find_for_update(conn, user_id)
            .await
            .map_err(|e| ApiError::not_found_as(e, "User"))?;

        let lifetime_spend = self
            .orders
            .delivered_total_for_user(conn, user_id)
            .await?;

        let Some(outcome) = apply_award(&mut user, order_id, order_amount, lifetime_spend, Utc::now())
        else {
            tracing::info!(%order_id, %user_id, "points already awarded for order");
            return Ok(None);
        };

        self.users
            .save_points(
                conn,
                user.id,
                user.points,
                user.total_points_earned,
                user.total_points_redeemed,
                &user.points_history,
                user.membership_tier,
            )
            .await?;

        tracing::info!(
            %order_id,
            %user_id,
            points = outcome.points_earned,
            "awarded points for delivered order"
        );
        Ok(Some(outcome))
    }

    /// Redeems points for a discount. The discount is returned to the caller;
    /// applying it to a later order is outside this service.
    pub async fn redeem_points(
        &self,
        user_id: Uuid,
        points_to_redeem: i64,
    ) -> Result<RedeemOutcome, ApiError> {
        let mut tx = self.users.pool().begin().await?;

        let mut user = self
            .users
            .find_for_update(&mut tx, user_id)
            .await
            .map_err(|e| ApiError::not_found_as(e, "User"))?;

        let outcome = apply_redemption(&mut user, points_to_redeem, Utc::now())?;

        self.users
            .save_points(
                &mut tx,
                user.id,
                user.points,
                user.total_points_earned,
                user.total_points_redeemed,
                &user.points_history,
                user.membership_tier,
            )
            .await?;
        tx.commit().await?;

        Ok(outcome)
    }

    pub async fn snapshot(&self, user_id: Uuid) -> Result<PointsSnapshot, ApiError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| ApiError::not_found_as(e, "User"))?;
        let total_spent = self.orders.delivered_total(user_id).await?;

        Ok(PointsSnapshot {
            points: user.points,
            total_points_earned: user.total_points_earned,
            total_points_redeemed: user.total_points_redeemed,
            membership_tier: user.membership_tier,
            tier_benefits: tier_benefits(user.membership_tier),
            points_value: points_value(user.points),
            can_redeem: user.points >= MIN_POINTS_REDEMPTION,
            min_points_for_redemption: MIN_POINTS_REDEMPTION,
            total_spent,
        })
    }

    pub async fn history(&self, user_id: Uuid) -> Result<PointsHistory, ApiError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| ApiError::not_found_as(e, "User"))?;
        Ok(PointsHistory {
            points_history: user.points_history.0,
            total_points_earned: user.total_points_earned,
            total_points_redeemed: user.total_points_redeemed,
        })
    }

    pub async fn redemption_options(&self, user_id: Uuid) -> Result<RedemptionOptions, ApiError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| ApiError::not_found_as(e, "User"))?;

        let options = [100, 250, 500, 1000]
            .into_iter()
            .filter(|points| user.points >= *points)
            .map(|points| {
                let value = points_value(points);
                RedemptionOption {
                    points,
                    value,
                    description: format!("Get {} off your order", format_currency(value)),
                }
            })
            .collect();

        Ok(RedemptionOptions {
            available_points: user.points,
            redemption_options: options,
            min_points_required: MIN_POINTS_REDEMPTION,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, TransactionType};
    use rust_decimal_macros::dec;
    use sqlx::types::Json;
    use std::collections::HashMap;

    fn test_user(points: i64, tier: MembershipTier) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test Customer".into(),
            email: "customer@example.com".into(),
            password_hash: String::new(),
            role: Role::Customer,
            cart_items: Json(HashMap::new()),
            points,
            total_points_earned: points,
            total_points_redeemed: 0,
            points_history: Json(Vec::new()),
            membership_tier: tier,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ledger_balance(user: &User) -> i64 {
        user.total_points_earned - user.total_points_redeemed
    }

    #[test]
    fn award_credits_points_and_ledger() {
        let mut user = test_user(0, MembershipTier::Bronze);
        let order_id = Uuid::new_v4();

        let outcome =
            apply_award(&mut user, order_id, dec!(97), dec!(98), Utc::now()).expect("first award");

        assert_eq!(outcome.points_earned, 970);
        assert_eq!(user.points, 970);
        assert_eq!(user.total_points_earned, 970);
        assert_eq!(user.points, ledger_balance(&user));

        let entry = &user.points_history[0];
        assert_eq!(entry.transaction_type, TransactionType::Earned);
        assert_eq!(entry.amount, 970);
        assert_eq!(entry.order_id, Some(order_id));
    }

    #[test]
    fn award_is_idempotent_per_order() {
        let mut user = test_user(0, MembershipTier::Bronze);
        let order_id = Uuid::new_v4();

        apply_award(&mut user, order_id, dec!(50), dec!(51), Utc::now()).expect("first award");
        let before_points = user.points;
        let before_len = user.points_history.len();

        let second = apply_award(&mut user, order_id, dec!(50), dec!(51), Utc::now());
        assert!(second.is_none());
        assert_eq!(user.points, before_points);
        assert_eq!(user.points_history.len(), before_len);
    }

    #[test]
    fn different_orders_both_award() {
        let mut user = test_user(0, MembershipTier::Bronze);
        apply_award(&mut user, Uuid::new_v4(), dec!(10), dec!(10), Utc::now()).unwrap();
        apply_award(&mut user, Uuid::new_v4(), dec!(10), dec!(20), Utc::now()).unwrap();
        assert_eq!(user.points, 200);
        assert_eq!(user.points, ledger_balance(&user));
    }

    #[test]
    fn tier_upgrade_appends_zero_amount_entry() {
        let mut user = test_user(0, MembershipTier::Bronze);
        let outcome = apply_award(
            &mut user,
            Uuid::new_v4(),
            dec!(120),
            dec!(120),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(outcome.new_tier, Some(MembershipTier::Silver));
        assert_eq!(user.membership_tier, MembershipTier::Silver);

        let note = user.points_history.last().unwrap();
        assert_eq!(note.amount, 0);
        assert!(note.description.contains("Silver"));
        assert!(note.order_id.is_none());
        // Points were computed with the tier held before the upgrade.
        assert_eq!(outcome.points_earned, 1200);
    }

    #[test]
    fn delivered_97_dollar_order_scenario() {
        use crate::points::order_total_with_tax;

        // $97 subtotal picks up floor(97 * 0.02) = $1 tax.
        let amount = order_total_with_tax(dec!(97));
        assert_eq!(amount, dec!(98));

        // Delivery awards points on the stored (tax-inclusive) amount,
        // exactly once.
        let mut user = test_user(0, MembershipTier::Bronze);
        let order_id = Uuid::new_v4();
        let outcome = apply_award(&mut user, order_id, amount, amount, Utc::now()).unwrap();
        assert_eq!(outcome.points_earned, 980);
        assert!(apply_award(&mut user, order_id, amount, amount, Utc::now()).is_none());
        assert_eq!(user.points, 980);
    }

    #[test]
    fn redemption_happy_path() {
        let mut user = test_user(1000, MembershipTier::Silver);
        let outcome = apply_redemption(&mut user, 250, Utc::now()).unwrap();

        assert_eq!(outcome.points_redeemed, 250);
        assert_eq!(outcome.discount_amount, dec!(2.50));
        assert_eq!(outcome.remaining_points, 750);
        assert_eq!(user.points, 750);
        assert_eq!(user.total_points_redeemed, 250);
        assert_eq!(user.points, ledger_balance(&user));

        let entry = user.points_history.last().unwrap();
        assert_eq!(entry.transaction_type, TransactionType::Redeemed);
        assert_eq!(entry.amount, -250);
    }

    #[test]
    fn redemption_rejects_below_minimum_and_overdraw() {
        let mut user = test_user(500, MembershipTier::Bronze);

        assert!(apply_redemption(&mut user, 0, Utc::now()).is_err());
        assert!(apply_redemption(&mut user, 99, Utc::now()).is_err());
        assert!(apply_redemption(&mut user, 501, Utc::now()).is_err());

        // Balance and ledger unchanged after the rejected attempts.
        assert_eq!(user.points, 500);
        assert_eq!(user.total_points_redeemed, 0);
        assert!(user.points_history.is_empty());
    }
}
