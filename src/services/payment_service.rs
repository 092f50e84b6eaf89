use std::collections::HashSet;

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Balances, CustomPaymentRequest, FeeInstance, FeeStatus, Payment, PaymentMethod,
    PaymentStatus, SettlementResponse,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceBucket {
    Cash,
    Bank,
}

impl BalanceBucket {
    /// Онлайн-оплата картой зачисляется на банковский счёт
    pub fn for_method(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Cash => Self::Cash,
            PaymentMethod::Check
            | PaymentMethod::Transfer
            | PaymentMethod::BankTransfer
            | PaymentMethod::OnlineCard => Self::Bank,
        }
    }
}

/// Суммы завершённых платежей по корзинам; остальные статусы не учитываются
pub fn aggregate_balances<I>(payments: I) -> Balances
where
    I: IntoIterator<Item = (PaymentMethod, PaymentStatus, Decimal)>,
{
    payments
        .into_iter()
        .filter(|(_, status, _)| *status == PaymentStatus::Completed)
        .fold(Balances::default(), |mut acc, (method, _, amount)| {
            match BalanceBucket::for_method(method) {
                BalanceBucket::Cash => acc.cash_on_hand += amount,
                BalanceBucket::Bank => acc.bank_balance += amount,
            }
            acc
        })
}

/// Убирает повторы, сохраняя порядок
pub fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Все запрошенные взносы найдены и ни один ещё не оплачен
pub fn check_settleable(requested: &[Uuid], fees: &[FeeInstance]) -> AppResult<()> {
    if requested.is_empty() {
        return Err(AppError::validation("fee_ids", "Выберите хотя бы один взнос"));
    }

    let found: HashSet<Uuid> = fees.iter().map(|fee| fee.id).collect();
    if let Some(missing) = requested.iter().find(|id| !found.contains(*id)) {
        return Err(AppError::NotFound(format!("Взнос {} не найден", missing)));
    }

    if let Some(paid) = fees.iter().find(|fee| fee.status == FeeStatus::Paid) {
        return Err(AppError::AlreadySettled(format!(
            "Взнос «{}» уже оплачен",
            paid.title
        )));
    }

    Ok(())
}

/// Завершённый платёж нельзя менять, кроме исправления статуса
pub fn check_status_correction(current: PaymentStatus, next: PaymentStatus) -> AppResult<()> {
    if current == next {
        return Err(AppError::BadRequest("Статус платежа уже установлен".to_string()));
    }
    Ok(())
}

/// Во что переводится связанный взнос при исправлении статуса платежа.
/// Оплаченным взнос считается только при завершённом платеже.
pub fn fee_status_after_correction(
    current: PaymentStatus,
    next: PaymentStatus,
) -> Option<FeeStatus> {
    match (current, next) {
        (PaymentStatus::Completed, PaymentStatus::Completed) => None,
        (PaymentStatus::Completed, _) => Some(FeeStatus::Unpaid),
        (_, PaymentStatus::Completed) => Some(FeeStatus::Paid),
        _ => None,
    }
}

pub struct PaymentService;

impl PaymentService {
    /// Отметка взносов оплаченными: один платёж на взнос, всё или ничего.
    /// UPDATE ... WHERE status <> 'paid' не даёт оплатить взнос дважды при гонке.
    pub async fn settle_fees(
        pool: &PgPool,
        residence_id: Uuid,
        verified_by: Uuid,
        fee_ids: &[Uuid],
        method: PaymentMethod,
    ) -> AppResult<SettlementResponse> {
        let fee_ids = dedup_ids(fee_ids);
        let mut tx = pool.begin().await?;

        let fees = sqlx::query_as::<_, FeeInstance>(
            "SELECT * FROM fees WHERE id = ANY($1) AND residence_id = $2 FOR UPDATE",
        )
        .bind(&fee_ids)
        .bind(residence_id)
        .fetch_all(&mut *tx)
        .await?;

        check_settleable(&fee_ids, &fees)?;

        let settled = sqlx::query_as::<_, FeeInstance>(
            r#"
            UPDATE fees
            SET status = 'paid', paid_at = NOW()
            WHERE id = ANY($1) AND residence_id = $2 AND status <> 'paid'
            RETURNING *
            "#,
        )
        .bind(&fee_ids)
        .bind(residence_id)
        .fetch_all(&mut *tx)
        .await?;

        if settled.len() != fee_ids.len() {
            // Транзакция откатывается при drop
            return Err(AppError::AlreadySettled(
                "Часть взносов уже оплачена".to_string(),
            ));
        }

        let mut payments = Vec::with_capacity(settled.len());
        for fee in &settled {
            let payment = sqlx::query_as::<_, Payment>(
                r#"
                INSERT INTO payments
                    (user_id, residence_id, fee_id, amount, method, status, verified_by)
                VALUES ($1, $2, $3, $4, $5, 'completed', $6)
                RETURNING *
                "#,
            )
            .bind(fee.user_id)
            .bind(residence_id)
            .bind(fee.id)
            .bind(fee.amount)
            .bind(method)
            .bind(verified_by)
            .fetch_one(&mut *tx)
            .await?;
            payments.push(payment);
        }

        tx.commit().await?;

        let total: Decimal = payments.iter().map(|p| p.amount).sum();
        tracing::info!(
            %residence_id,
            count = payments.len(),
            %total,
            ?method,
            "Fees settled"
        );

        let receipts = if method == PaymentMethod::Cash {
            payments
                .iter()
                .map(|p| format!("/api/v1/payments/{}/receipt", p.id))
                .collect()
        } else {
            Vec::new()
        };

        Ok(SettlementResponse {
            success: true,
            payments,
            total,
            receipts,
        })
    }

    /// Отдельный платёж без привязки к взносам
    pub async fn record_custom(
        pool: &PgPool,
        residence_id: Uuid,
        verified_by: Uuid,
        request: &CustomPaymentRequest,
    ) -> AppResult<Payment> {
        if request.amount <= Decimal::ZERO {
            return Err(AppError::validation("amount", "Сумма должна быть больше нуля"));
        }

        let member: Option<(Uuid,)> = sqlx::query_as(
            "SELECT profile_id FROM profile_residences WHERE profile_id = $1 AND residence_id = $2",
        )
        .bind(request.user_id)
        .bind(residence_id)
        .fetch_optional(pool)
        .await?;
        if member.is_none() {
            return Err(AppError::NotFound("Житель не найден".to_string()));
        }

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (user_id, residence_id, amount, method, status, note, verified_by)
            VALUES ($1, $2, $3, $4, 'completed', $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(residence_id)
        .bind(request.amount)
        .bind(request.method)
        .bind(&request.note)
        .bind(verified_by)
        .fetch_one(pool)
        .await?;

        tracing::info!(payment_id = %payment.id, %residence_id, "Custom payment recorded");
        Ok(payment)
    }

    /// Исправление статуса вместе со связанным взносом в одной транзакции
    pub async fn correct_status(
        pool: &PgPool,
        payment_id: Uuid,
        next: PaymentStatus,
    ) -> AppResult<Payment> {
        let mut tx = pool.begin().await?;

        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Платёж не найден".to_string()))?;

        check_status_correction(payment.status, next)?;

        if let (Some(fee_id), Some(fee_status)) = (
            payment.fee_id,
            fee_status_after_correction(payment.status, next),
        ) {
            let fee = sqlx::query_as::<_, FeeInstance>("SELECT * FROM fees WHERE id = $1 FOR UPDATE")
                .bind(fee_id)
                .fetch_optional(&mut *tx)
                .await?;

            match (fee, fee_status) {
                (Some(_), FeeStatus::Unpaid) => {
                    sqlx::query("UPDATE fees SET status = 'unpaid', paid_at = NULL WHERE id = $1")
                        .bind(fee_id)
                        .execute(&mut *tx)
                        .await?;
                }
                (Some(fee), _) => {
                    // Взнос мог быть оплачен другим платежом, пока этот был отклонён
                    check_settleable(&[fee.id], std::slice::from_ref(&fee))?;
                    sqlx::query("UPDATE fees SET status = 'paid', paid_at = NOW() WHERE id = $1")
                        .bind(fee_id)
                        .execute(&mut *tx)
                        .await?;
                }
                (None, _) => {}
            }
        }

        let updated = sqlx::query_as::<_, Payment>(
            "UPDATE payments SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(payment_id)
        .bind(next)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            %payment_id,
            from = ?payment.status,
            to = ?updated.status,
            fee_id = ?payment.fee_id,
            "Payment status corrected"
        );
        Ok(updated)
    }

    pub async fn balances(pool: &PgPool, residence_id: Uuid) -> AppResult<Balances> {
        let rows = sqlx::query_as::<_, (PaymentMethod, PaymentStatus, Decimal)>(
            "SELECT method, status, amount FROM payments WHERE residence_id = $1 AND status = 'completed'",
        )
        .bind(residence_id)
        .fetch_all(pool)
        .await?;

        Ok(aggregate_balances(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn fee(status: FeeStatus) -> FeeInstance {
        FeeInstance {
            id: Uuid::new_v4(),
            rule_id: None,
            user_id: Uuid::new_v4(),
            residence_id: Uuid::new_v4(),
            title: "Charges".to_string(),
            amount: Decimal::new(100, 0),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            status,
            paid_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_balances_split_by_bucket() {
        let balances = aggregate_balances(vec![
            (PaymentMethod::Cash, PaymentStatus::Completed, Decimal::new(100, 0)),
            (PaymentMethod::Cash, PaymentStatus::Completed, Decimal::new(50, 0)),
            (PaymentMethod::Check, PaymentStatus::Completed, Decimal::new(200, 0)),
            (PaymentMethod::Transfer, PaymentStatus::Completed, Decimal::new(10, 0)),
            (PaymentMethod::BankTransfer, PaymentStatus::Completed, Decimal::new(5, 0)),
        ]);

        assert_eq!(balances.cash_on_hand, Decimal::new(150, 0));
        assert_eq!(balances.bank_balance, Decimal::new(215, 0));
    }

    #[test]
    fn test_balances_ignore_pending_and_rejected() {
        let balances = aggregate_balances(vec![
            (PaymentMethod::Cash, PaymentStatus::Pending, Decimal::new(100, 0)),
            (PaymentMethod::Check, PaymentStatus::Rejected, Decimal::new(200, 0)),
        ]);

        assert_eq!(balances, Balances::default());
    }

    #[test]
    fn test_buckets_are_exhaustive_over_completed_payments() {
        let methods = [
            PaymentMethod::Cash,
            PaymentMethod::Check,
            PaymentMethod::Transfer,
            PaymentMethod::BankTransfer,
            PaymentMethod::OnlineCard,
        ];
        let payments: Vec<_> = methods
            .iter()
            .map(|m| (*m, PaymentStatus::Completed, Decimal::new(7, 0)))
            .collect();

        let balances = aggregate_balances(payments);
        assert_eq!(
            balances.cash_on_hand + balances.bank_balance,
            Decimal::new(35, 0)
        );
    }

    #[test]
    fn test_paid_fee_cannot_be_settled_again() {
        let paid = fee(FeeStatus::Paid);
        let unpaid = fee(FeeStatus::Unpaid);

        let result = check_settleable(&[unpaid.id, paid.id], &[unpaid, paid]);
        assert!(matches!(result, Err(AppError::AlreadySettled(_))));
    }

    #[test]
    fn test_settlement_requires_known_fees() {
        let unpaid = fee(FeeStatus::Unpaid);
        assert!(matches!(
            check_settleable(&[unpaid.id, Uuid::new_v4()], &[unpaid]),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            check_settleable(&[], &[]),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn test_overdue_fee_is_still_settleable() {
        let overdue = fee(FeeStatus::Unpaid);
        assert!(check_settleable(&[overdue.id], &[overdue]).is_ok());
    }

    #[test]
    fn test_dedup_keeps_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(dedup_ids(&[a, b, a]), vec![a, b]);
    }

    #[test]
    fn test_rejected_payment_reopens_its_fee() {
        assert_eq!(
            fee_status_after_correction(PaymentStatus::Completed, PaymentStatus::Rejected),
            Some(FeeStatus::Unpaid)
        );
        assert_eq!(
            fee_status_after_correction(PaymentStatus::Completed, PaymentStatus::Pending),
            Some(FeeStatus::Unpaid)
        );
        assert_eq!(
            fee_status_after_correction(PaymentStatus::Rejected, PaymentStatus::Completed),
            Some(FeeStatus::Paid)
        );
        assert_eq!(
            fee_status_after_correction(PaymentStatus::Pending, PaymentStatus::Rejected),
            None
        );
    }

    #[test]
    fn test_reopened_fee_can_be_settled_again() {
        let mut settled = fee(FeeStatus::Paid);
        assert!(check_settleable(&[settled.id], &[settled.clone()]).is_err());

        if let Some(status) =
            fee_status_after_correction(PaymentStatus::Completed, PaymentStatus::Rejected)
        {
            settled.status = status;
        }
        assert!(check_settleable(&[settled.id], &[settled]).is_ok());

        let balances = aggregate_balances(vec![
            (PaymentMethod::Cash, PaymentStatus::Rejected, Decimal::new(100, 0)),
        ]);
        assert_eq!(balances.cash_on_hand, Decimal::ZERO);
    }

    #[test]
    fn test_same_status_correction_is_rejected() {
        assert!(check_status_correction(PaymentStatus::Completed, PaymentStatus::Completed).is_err());
        assert!(check_status_correction(PaymentStatus::Completed, PaymentStatus::Rejected).is_ok());
    }
}
