use std::collections::HashSet;

use chrono::{Days, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    CoveragePeriod, CoveragePeriodType, CreateFeeRuleRequest, DeletionAction, FeeInstance,
    FeeRule, FeeStatus, FeeSummary, GenerationReport, NewFeeRule, UpdateFeeRuleRequest,
};

const DEFAULT_REMINDER_DAYS: i32 = 3;
const MAX_REMINDER_DAYS: i32 = 60;
// Защита от бесконечной прокрутки при повреждённых данных
const MAX_ROLL_STEPS: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BillingPeriod {
    /// Срок попадает в период (start, end]
    pub fn covers(&self, due_date: NaiveDate) -> bool {
        due_date > self.start && due_date <= self.end
    }
}

/// Жители, у которых уже есть экземпляр со сроком внутри периода.
/// Сдвиг next_due_date не даёт выставить тот же период повторно.
pub fn billed_in_period(existing: &[(Uuid, NaiveDate)], period: BillingPeriod) -> HashSet<Uuid> {
    existing
        .iter()
        .filter(|(_, due_date)| period.covers(*due_date))
        .map(|(user_id, _)| *user_id)
        .collect()
}

/// Экземпляр взноса, который нужно создать
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFee {
    pub rule_id: Uuid,
    pub user_id: Uuid,
    pub residence_id: Uuid,
    pub title: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

/// Сдвиг даты на `steps` периодов покрытия (steps может быть отрицательным)
pub fn shift_by_periods(base: NaiveDate, coverage: CoveragePeriod, steps: i64) -> Option<NaiveDate> {
    let units = (coverage.value as i64).checked_mul(steps)?;
    let magnitude = u32::try_from(units.unsigned_abs()).ok()?;

    match coverage.kind {
        CoveragePeriodType::Week => {
            let days = Days::new(magnitude as u64 * 7);
            if units >= 0 {
                base.checked_add_days(days)
            } else {
                base.checked_sub_days(days)
            }
        }
        CoveragePeriodType::Month | CoveragePeriodType::Year => {
            let months = if coverage.kind == CoveragePeriodType::Year {
                magnitude.checked_mul(12)?
            } else {
                magnitude
            };
            if units >= 0 {
                base.checked_add_months(Months::new(months))
            } else {
                base.checked_sub_months(Months::new(months))
            }
        }
    }
}

/// Текущий период: срок прокручивается вперёд целыми периодами, пока не станет >= anchor.
/// Каждый шаг считается от исходной даты, чтобы конец месяца не "уплывал".
pub fn current_period(
    next_due_date: NaiveDate,
    coverage: CoveragePeriod,
    anchor: NaiveDate,
) -> AppResult<BillingPeriod> {
    if coverage.value < 1 {
        return Err(AppError::validation(
            "coverage_period_value",
            "Период покрытия должен быть не меньше 1",
        ));
    }

    let overflow = || AppError::Internal("Переполнение даты при расчёте периода".to_string());

    let mut step = 0;
    let end = loop {
        let candidate = shift_by_periods(next_due_date, coverage, step).ok_or_else(overflow)?;
        if candidate >= anchor {
            break candidate;
        }
        step += 1;
        if step > MAX_ROLL_STEPS {
            return Err(overflow());
        }
    };

    let start = shift_by_periods(next_due_date, coverage, step - 1).ok_or_else(overflow)?;

    Ok(BillingPeriod { start, end })
}

/// Жители без экземпляра за этот период; повторный вызов ничего не добавит
pub fn plan_generation(
    rule: &FeeRule,
    period: BillingPeriod,
    residents: &[Uuid],
    already_billed: &HashSet<Uuid>,
) -> Vec<PlannedFee> {
    let mut seen = HashSet::new();

    residents
        .iter()
        .filter(|user_id| !already_billed.contains(*user_id) && seen.insert(**user_id))
        .map(|user_id| PlannedFee {
            rule_id: rule.id,
            user_id: *user_id,
            residence_id: rule.residence_id,
            title: rule.title.clone(),
            amount: rule.amount,
            due_date: period.end,
        })
        .collect()
}

fn validate_amount(amount: Decimal) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::validation("amount", "Сумма должна быть больше нуля"));
    }
    Ok(())
}

fn validate_reminder_days(days: i32) -> AppResult<()> {
    if !(0..=MAX_REMINDER_DAYS).contains(&days) {
        return Err(AppError::validation(
            "reminder_days_before",
            format!("Напоминание допускается за 0-{} дней", MAX_REMINDER_DAYS),
        ));
    }
    Ok(())
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title", "Укажите название"));
    }
    Ok(title.to_string())
}

/// Канонический период: coverage_period_type + value, либо старое поле frequency
fn resolve_coverage(request: &CreateFeeRuleRequest) -> AppResult<CoveragePeriod> {
    let coverage = match (
        request.coverage_period_type,
        request.coverage_period_value,
        request.frequency,
    ) {
        (Some(kind), value, _) => CoveragePeriod {
            value: value.unwrap_or(1),
            kind,
        },
        (None, Some(_), _) => {
            return Err(AppError::validation(
                "coverage_period_type",
                "Укажите тип периода",
            ))
        }
        (None, None, Some(frequency)) => CoveragePeriod::from(frequency),
        (None, None, None) => {
            return Err(AppError::validation(
                "coverage_period_type",
                "Укажите период покрытия",
            ))
        }
    };

    if coverage.value < 1 {
        return Err(AppError::validation(
            "coverage_period_value",
            "Период покрытия должен быть не меньше 1",
        ));
    }

    Ok(coverage)
}

pub fn prepare_rule(request: &CreateFeeRuleRequest) -> AppResult<NewFeeRule> {
    let title = validate_title(&request.title)?;
    validate_amount(request.amount)?;
    let coverage = resolve_coverage(request)?;

    let start_date = request
        .start_date
        .ok_or_else(|| AppError::validation("start_date", "Укажите дату начала"))?;

    let next_due_date = match request.next_due_date {
        Some(date) if date < start_date => {
            return Err(AppError::validation(
                "next_due_date",
                "Срок оплаты не может быть раньше даты начала",
            ))
        }
        Some(date) => date,
        None => shift_by_periods(start_date, coverage, 1)
            .ok_or_else(|| AppError::validation("start_date", "Недопустимая дата начала"))?,
    };

    let reminder_days_before = request.reminder_days_before.unwrap_or(DEFAULT_REMINDER_DAYS);
    validate_reminder_days(reminder_days_before)?;

    Ok(NewFeeRule {
        title,
        amount: request.amount,
        coverage,
        start_date,
        next_due_date,
        reminder_enabled: request.reminder_enabled,
        reminder_days_before,
    })
}

/// Частичное обновление с той же валидацией, что и при создании
pub fn apply_rule_update(rule: &FeeRule, update: &UpdateFeeRuleRequest) -> AppResult<FeeRule> {
    let mut merged = rule.clone();

    if let Some(title) = &update.title {
        merged.title = validate_title(title)?;
    }
    if let Some(amount) = update.amount {
        validate_amount(amount)?;
        merged.amount = amount;
    }
    if let Some(value) = update.coverage_period_value {
        if value < 1 {
            return Err(AppError::validation(
                "coverage_period_value",
                "Период покрытия должен быть не меньше 1",
            ));
        }
        merged.coverage_period_value = value;
    }
    if let Some(kind) = update.coverage_period_type {
        merged.coverage_period_type = kind;
    }
    if let Some(date) = update.next_due_date {
        if date < merged.start_date {
            return Err(AppError::validation(
                "next_due_date",
                "Срок оплаты не может быть раньше даты начала",
            ));
        }
        merged.next_due_date = date;
    }
    if let Some(is_active) = update.is_active {
        merged.is_active = is_active;
    }
    if let Some(enabled) = update.reminder_enabled {
        merged.reminder_enabled = enabled;
    }
    if let Some(days) = update.reminder_days_before {
        validate_reminder_days(days)?;
        merged.reminder_days_before = days;
    }

    Ok(merged)
}

/// Правило с экземплярами не удаляется, а деактивируется
pub fn rule_deletion_action(dependent_fees: i64) -> DeletionAction {
    if dependent_fees > 0 {
        DeletionAction::Deactivated
    } else {
        DeletionAction::Deleted
    }
}

/// Итоги по взносам жителя на дату `today`
pub fn summarize_fees(fees: &[FeeInstance], today: NaiveDate) -> FeeSummary {
    fees.iter().fold(FeeSummary::default(), |mut summary, fee| {
        match fee.effective_status(today) {
            FeeStatus::Paid => summary.paid_total += fee.amount,
            FeeStatus::Overdue => {
                summary.total_due += fee.amount;
                summary.overdue_count += 1;
            }
            FeeStatus::Unpaid => summary.total_due += fee.amount,
        }
        summary
    })
}

/// Оплаченный взнос или взнос с платежом удалить нельзя
pub fn check_fee_deletable(fee: &FeeInstance, linked_payments: i64) -> AppResult<()> {
    if fee.status == FeeStatus::Paid || linked_payments > 0 {
        return Err(AppError::HasDependents(
            "По взносу есть платежи, удаление невозможно".to_string(),
        ));
    }
    Ok(())
}

pub struct BillingService;

impl BillingService {
    pub async fn get_rule(pool: &PgPool, rule_id: Uuid) -> AppResult<FeeRule> {
        sqlx::query_as::<_, FeeRule>("SELECT * FROM fee_rules WHERE id = $1")
            .bind(rule_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Правило взноса не найдено".to_string()))
    }

    pub async fn create_rule(
        pool: &PgPool,
        residence_id: Uuid,
        rule: &NewFeeRule,
    ) -> AppResult<FeeRule> {
        let created = sqlx::query_as::<_, FeeRule>(
            r#"
            INSERT INTO fee_rules
                (residence_id, title, amount, coverage_period_value, coverage_period_type,
                 start_date, next_due_date, reminder_enabled, reminder_days_before)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(residence_id)
        .bind(&rule.title)
        .bind(rule.amount)
        .bind(rule.coverage.value)
        .bind(rule.coverage.kind)
        .bind(rule.start_date)
        .bind(rule.next_due_date)
        .bind(rule.reminder_enabled)
        .bind(rule.reminder_days_before)
        .fetch_one(pool)
        .await?;

        tracing::info!(rule_id = %created.id, %residence_id, "Fee rule created");
        Ok(created)
    }

    pub async fn save_rule(pool: &PgPool, rule: &FeeRule) -> AppResult<FeeRule> {
        let updated = sqlx::query_as::<_, FeeRule>(
            r#"
            UPDATE fee_rules SET
                title = $2,
                amount = $3,
                coverage_period_value = $4,
                coverage_period_type = $5,
                next_due_date = $6,
                is_active = $7,
                reminder_enabled = $8,
                reminder_days_before = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(rule.id)
        .bind(&rule.title)
        .bind(rule.amount)
        .bind(rule.coverage_period_value)
        .bind(rule.coverage_period_type)
        .bind(rule.next_due_date)
        .bind(rule.is_active)
        .bind(rule.reminder_enabled)
        .bind(rule.reminder_days_before)
        .fetch_one(pool)
        .await?;

        Ok(updated)
    }

    /// Проверка зависимых экземпляров и удаление/деактивация в одной транзакции
    pub async fn delete_rule(pool: &PgPool, rule_id: Uuid) -> AppResult<(DeletionAction, i64)> {
        let mut tx = pool.begin().await?;

        let locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM fee_rules WHERE id = $1 FOR UPDATE")
                .bind(rule_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(AppError::NotFound("Правило взноса не найдено".to_string()));
        }

        let (dependents,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM fees WHERE rule_id = $1")
            .bind(rule_id)
            .fetch_one(&mut *tx)
            .await?;

        let action = rule_deletion_action(dependents);
        match action {
            DeletionAction::Deleted => {
                sqlx::query("DELETE FROM fee_rules WHERE id = $1")
                    .bind(rule_id)
                    .execute(&mut *tx)
                    .await?;
            }
            DeletionAction::Deactivated => {
                sqlx::query(
                    "UPDATE fee_rules SET is_active = false, updated_at = NOW() WHERE id = $1",
                )
                .bind(rule_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        tracing::info!(%rule_id, ?action, dependents, "Fee rule removed");
        Ok((action, dependents))
    }

    /// Создание экземпляров за текущий период.
    /// Строка правила блокируется, а уникальный индекс (rule_id, user_id, due_date)
    /// не даёт задвоить экземпляры при гонке.
    pub async fn generate(
        pool: &PgPool,
        rule_id: Uuid,
        anchor: Option<NaiveDate>,
    ) -> AppResult<GenerationReport> {
        let mut tx = pool.begin().await?;

        let rule = sqlx::query_as::<_, FeeRule>("SELECT * FROM fee_rules WHERE id = $1 FOR UPDATE")
            .bind(rule_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Правило взноса не найдено".to_string()))?;

        if !rule.is_active {
            return Err(AppError::BadRequest(
                "Правило деактивировано, генерация невозможна".to_string(),
            ));
        }

        let anchor = anchor.unwrap_or_else(|| Utc::now().date_naive());
        let period = current_period(rule.next_due_date, rule.coverage(), anchor)?;

        let residents: Vec<Uuid> = sqlx::query_as::<_, (Uuid,)>(
            r#"
            SELECT pr.profile_id
            FROM profile_residences pr
            JOIN profiles p ON p.id = pr.profile_id
            WHERE pr.residence_id = $1
              AND p.role = 'resident'
              AND p.verified = true
              AND pr.apartment_number <> '0'
            ORDER BY pr.apartment_number
            "#,
        )
        .bind(rule.residence_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(id,)| id)
        .collect();

        let existing: Vec<(Uuid, NaiveDate)> = sqlx::query_as(
            "SELECT user_id, due_date FROM fees WHERE rule_id = $1 AND due_date > $2 AND due_date <= $3",
        )
        .bind(rule.id)
        .bind(period.start)
        .bind(period.end)
        .fetch_all(&mut *tx)
        .await?;
        let already_billed = billed_in_period(&existing, period);

        let planned = plan_generation(&rule, period, &residents, &already_billed);

        let mut created = 0;
        for fee in &planned {
            let result = sqlx::query(
                r#"
                INSERT INTO fees (rule_id, user_id, residence_id, title, amount, due_date, status)
                VALUES ($1, $2, $3, $4, $5, $6, 'unpaid')
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(fee.rule_id)
            .bind(fee.user_id)
            .bind(fee.residence_id)
            .bind(&fee.title)
            .bind(fee.amount)
            .bind(fee.due_date)
            .execute(&mut *tx)
            .await?;
            created += result.rows_affected();
        }

        sqlx::query("UPDATE fee_rules SET next_due_date = $2, updated_at = NOW() WHERE id = $1")
            .bind(rule.id)
            .bind(period.end)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let skipped = residents.len() as u64 - created;
        tracing::info!(
            %rule_id,
            period_end = %period.end,
            created,
            skipped,
            "Fee generation finished"
        );

        Ok(GenerationReport {
            rule_id,
            period_start: period.start,
            period_end: period.end,
            created,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LegacyFrequency;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monthly() -> CoveragePeriod {
        CoveragePeriod {
            value: 1,
            kind: CoveragePeriodType::Month,
        }
    }

    fn sample_rule() -> FeeRule {
        FeeRule {
            id: Uuid::new_v4(),
            residence_id: Uuid::new_v4(),
            title: "Charges communes".to_string(),
            amount: Decimal::new(25000, 2),
            coverage_period_value: 1,
            coverage_period_type: CoveragePeriodType::Month,
            start_date: date(2024, 1, 1),
            next_due_date: date(2024, 2, 1),
            is_active: true,
            reminder_enabled: false,
            reminder_days_before: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn create_request() -> CreateFeeRuleRequest {
        CreateFeeRuleRequest {
            title: "Syndic".to_string(),
            amount: Decimal::new(300, 0),
            coverage_period_value: Some(1),
            coverage_period_type: Some(CoveragePeriodType::Month),
            frequency: None,
            start_date: Some(date(2024, 1, 1)),
            next_due_date: None,
            reminder_enabled: true,
            reminder_days_before: None,
        }
    }

    #[test]
    fn test_period_not_rolled_when_due_date_is_ahead() {
        let period = current_period(date(2024, 3, 1), monthly(), date(2024, 2, 10)).unwrap();
        assert_eq!(period.end, date(2024, 3, 1));
        assert_eq!(period.start, date(2024, 2, 1));
    }

    #[test]
    fn test_period_rolls_forward_past_anchor() {
        let quarter = CoveragePeriod {
            value: 3,
            kind: CoveragePeriodType::Month,
        };
        let period = current_period(date(2024, 1, 15), quarter, date(2024, 8, 1)).unwrap();
        assert_eq!(period.end, date(2024, 10, 15));
        assert_eq!(period.start, date(2024, 7, 15));
    }

    #[test]
    fn test_due_date_equal_to_anchor_is_current() {
        let period = current_period(date(2024, 5, 1), monthly(), date(2024, 5, 1)).unwrap();
        assert_eq!(period.end, date(2024, 5, 1));
    }

    #[test]
    fn test_month_end_does_not_drift() {
        let period = current_period(date(2024, 1, 31), monthly(), date(2024, 3, 30)).unwrap();
        assert_eq!(period.end, date(2024, 3, 31));
        assert_eq!(period.start, date(2024, 2, 29));
    }

    #[test]
    fn test_weekly_and_yearly_spans() {
        let biweekly = CoveragePeriod {
            value: 2,
            kind: CoveragePeriodType::Week,
        };
        let period = current_period(date(2024, 1, 1), biweekly, date(2024, 1, 20)).unwrap();
        assert_eq!(period.end, date(2024, 1, 29));
        assert_eq!(period.start, date(2024, 1, 15));

        let yearly = CoveragePeriod {
            value: 1,
            kind: CoveragePeriodType::Year,
        };
        let period = current_period(date(2022, 6, 30), yearly, date(2024, 7, 1)).unwrap();
        assert_eq!(period.end, date(2025, 6, 30));
    }

    #[test]
    fn test_generation_plan_is_idempotent() {
        let rule = sample_rule();
        let period = current_period(rule.next_due_date, rule.coverage(), date(2024, 1, 20)).unwrap();
        let residents: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

        let mut ledger: HashSet<(Uuid, Uuid, NaiveDate)> = HashSet::new();
        let mut billed = HashSet::new();

        let first = plan_generation(&rule, period, &residents, &billed);
        assert_eq!(first.len(), 4);
        for fee in &first {
            ledger.insert((fee.rule_id, fee.user_id, fee.due_date));
            billed.insert(fee.user_id);
        }

        let second = plan_generation(&rule, period, &residents, &billed);
        assert!(second.is_empty());
        assert_eq!(ledger.len(), 4);
    }

    #[test]
    fn test_generation_skips_billed_and_duplicate_residents() {
        let rule = sample_rule();
        let period = BillingPeriod {
            start: date(2024, 1, 1),
            end: date(2024, 2, 1),
        };
        let billed_user = Uuid::new_v4();
        let new_user = Uuid::new_v4();
        let billed: HashSet<Uuid> = [billed_user].into_iter().collect();

        let planned = plan_generation(&rule, period, &[billed_user, new_user, new_user], &billed);

        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].user_id, new_user);
        assert_eq!(planned[0].amount, rule.amount);
        assert_eq!(planned[0].due_date, period.end);
    }

    #[test]
    fn test_moved_due_date_does_not_rebill_overlapping_period() {
        let mut rule = sample_rule();
        let residents: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();

        let first_period =
            current_period(rule.next_due_date, rule.coverage(), date(2024, 1, 20)).unwrap();
        let first = plan_generation(&rule, first_period, &residents, &HashSet::new());
        let ledger: Vec<(Uuid, NaiveDate)> =
            first.iter().map(|fee| (fee.user_id, fee.due_date)).collect();
        assert_eq!(ledger.len(), 2);

        // Синдик сдвинул срок на несколько дней после генерации
        rule.next_due_date = date(2024, 2, 5);
        let moved = current_period(rule.next_due_date, rule.coverage(), date(2024, 1, 20)).unwrap();
        assert_eq!(moved.start, date(2024, 1, 5));
        assert_eq!(moved.end, date(2024, 2, 5));

        let billed = billed_in_period(&ledger, moved);
        assert!(plan_generation(&rule, moved, &residents, &billed).is_empty());

        let next = current_period(rule.next_due_date, rule.coverage(), date(2024, 2, 20)).unwrap();
        let billed = billed_in_period(&ledger, next);
        assert!(billed.is_empty());
        assert_eq!(plan_generation(&rule, next, &residents, &billed).len(), 2);
    }

    #[test]
    fn test_period_bounds_exclude_start() {
        let period = BillingPeriod {
            start: date(2024, 1, 1),
            end: date(2024, 2, 1),
        };
        assert!(!period.covers(date(2024, 1, 1)));
        assert!(period.covers(date(2024, 1, 2)));
        assert!(period.covers(date(2024, 2, 1)));
        assert!(!period.covers(date(2024, 2, 2)));
    }

    #[test]
    fn test_prepare_rule_defaults_next_due_date_to_one_span() {
        let rule = prepare_rule(&create_request()).unwrap();
        assert_eq!(rule.next_due_date, date(2024, 2, 1));
        assert_eq!(rule.reminder_days_before, DEFAULT_REMINDER_DAYS);
    }

    #[test]
    fn test_prepare_rule_rejects_invalid_fields() {
        let mut request = create_request();
        request.amount = Decimal::ZERO;
        assert!(matches!(
            prepare_rule(&request),
            Err(AppError::Validation { field, .. }) if field == "amount"
        ));

        let mut request = create_request();
        request.coverage_period_value = Some(0);
        assert!(matches!(
            prepare_rule(&request),
            Err(AppError::Validation { field, .. }) if field == "coverage_period_value"
        ));

        let mut request = create_request();
        request.start_date = None;
        assert!(matches!(
            prepare_rule(&request),
            Err(AppError::Validation { field, .. }) if field == "start_date"
        ));
    }

    #[test]
    fn test_legacy_frequency_is_normalized() {
        let mut request = create_request();
        request.coverage_period_type = None;
        request.coverage_period_value = None;
        request.frequency = Some(LegacyFrequency::Quarterly);

        let rule = prepare_rule(&request).unwrap();
        assert_eq!(rule.coverage.value, 3);
        assert_eq!(rule.coverage.kind, CoveragePeriodType::Month);
        assert_eq!(rule.next_due_date, date(2024, 4, 1));
    }

    #[test]
    fn test_rule_update_keeps_invariants() {
        let rule = sample_rule();
        let update = UpdateFeeRuleRequest {
            amount: Some(Decimal::new(-1, 0)),
            ..Default::default()
        };
        assert!(apply_rule_update(&rule, &update).is_err());

        let update = UpdateFeeRuleRequest {
            title: Some("  Ascenseur ".to_string()),
            coverage_period_value: Some(2),
            ..Default::default()
        };
        let merged = apply_rule_update(&rule, &update).unwrap();
        assert_eq!(merged.title, "Ascenseur");
        assert_eq!(merged.coverage_period_value, 2);
        assert_eq!(merged.amount, rule.amount);
    }

    #[test]
    fn test_rule_with_instances_is_deactivated_not_deleted() {
        assert_eq!(rule_deletion_action(0), DeletionAction::Deleted);
        assert_eq!(rule_deletion_action(3), DeletionAction::Deactivated);
    }

    fn fee_instance(amount: i64, due_date: NaiveDate, status: FeeStatus) -> FeeInstance {
        FeeInstance {
            id: Uuid::new_v4(),
            rule_id: None,
            user_id: Uuid::new_v4(),
            residence_id: Uuid::new_v4(),
            title: "Charges".to_string(),
            amount: Decimal::new(amount, 0),
            due_date,
            status,
            paid_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_counts_overdue_in_total_due() {
        let today = date(2024, 3, 10);
        let fees = vec![
            fee_instance(100, date(2024, 3, 1), FeeStatus::Unpaid),
            fee_instance(200, date(2024, 4, 1), FeeStatus::Unpaid),
            fee_instance(300, date(2024, 2, 1), FeeStatus::Paid),
        ];

        let summary = summarize_fees(&fees, today);
        assert_eq!(summary.total_due, Decimal::new(300, 0));
        assert_eq!(summary.overdue_count, 1);
        assert_eq!(summary.paid_total, Decimal::new(300, 0));
    }

    #[test]
    fn test_fee_with_payment_cannot_be_deleted() {
        let unpaid = fee_instance(100, date(2024, 3, 1), FeeStatus::Unpaid);
        assert!(check_fee_deletable(&unpaid, 0).is_ok());
        assert!(matches!(
            check_fee_deletable(&unpaid, 1),
            Err(AppError::HasDependents(_))
        ));

        let paid = fee_instance(100, date(2024, 3, 1), FeeStatus::Paid);
        assert!(check_fee_deletable(&paid, 0).is_err());
    }
}
