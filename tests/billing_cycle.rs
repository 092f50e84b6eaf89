use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use syndic_backend::models::{
    CoveragePeriodType, CreateFeeRuleRequest, FeeInstance, FeeRule, FeeStatus, LegacyFrequency,
    PaymentMethod, PaymentStatus,
};
use syndic_backend::services::billing_service::{
    billed_in_period, current_period, plan_generation, prepare_rule, summarize_fees,
};
use syndic_backend::services::payment_service::{
    aggregate_balances, check_settleable, fee_status_after_correction,
};
use syndic_backend::AppError;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn quarterly_rule() -> FeeRule {
    let request = CreateFeeRuleRequest {
        title: "Charges trimestrielles".to_string(),
        amount: Decimal::new(900, 0),
        coverage_period_value: None,
        coverage_period_type: None,
        frequency: Some(LegacyFrequency::Quarterly),
        start_date: Some(date(2024, 1, 1)),
        next_due_date: None,
        reminder_enabled: true,
        reminder_days_before: None,
    };
    let prepared = prepare_rule(&request).unwrap();

    FeeRule {
        id: Uuid::new_v4(),
        residence_id: Uuid::new_v4(),
        title: prepared.title,
        amount: prepared.amount,
        coverage_period_value: prepared.coverage.value,
        coverage_period_type: prepared.coverage.kind,
        start_date: prepared.start_date,
        next_due_date: prepared.next_due_date,
        is_active: true,
        reminder_enabled: prepared.reminder_enabled,
        reminder_days_before: prepared.reminder_days_before,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn instance(rule: &FeeRule, user_id: Uuid, due_date: NaiveDate, status: FeeStatus) -> FeeInstance {
    FeeInstance {
        id: Uuid::new_v4(),
        rule_id: Some(rule.id),
        user_id,
        residence_id: rule.residence_id,
        title: rule.title.clone(),
        amount: rule.amount,
        due_date,
        status,
        paid_at: None,
        created_at: Utc::now(),
    }
}

#[test]
fn legacy_quarterly_rule_bills_each_resident_once_per_period() {
    let rule = quarterly_rule();
    assert_eq!(rule.coverage_period_type, CoveragePeriodType::Month);
    assert_eq!(rule.coverage_period_value, 3);
    assert_eq!(rule.next_due_date, date(2024, 4, 1));

    let period = current_period(rule.next_due_date, rule.coverage(), date(2024, 8, 15)).unwrap();
    assert_eq!(period.start, date(2024, 7, 1));
    assert_eq!(period.end, date(2024, 10, 1));

    let residents: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    let first = plan_generation(&rule, period, &residents, &HashSet::new());
    assert_eq!(first.len(), 3);
    assert!(first.iter().all(|fee| fee.due_date == period.end));

    let billed: HashSet<Uuid> = first.iter().map(|fee| fee.user_id).collect();
    let second = plan_generation(&rule, period, &residents, &billed);
    assert!(second.is_empty());
}

#[test]
fn settlement_is_refused_when_any_fee_is_already_paid() {
    let rule = quarterly_rule();
    let resident = Uuid::new_v4();
    let open = instance(&rule, resident, date(2024, 4, 1), FeeStatus::Unpaid);
    let paid = instance(&rule, resident, date(2024, 7, 1), FeeStatus::Paid);

    assert!(check_settleable(&[open.id], &[open.clone()]).is_ok());
    assert!(matches!(
        check_settleable(&[open.id, paid.id], &[open.clone(), paid]),
        Err(AppError::AlreadySettled(_))
    ));
    assert!(matches!(
        check_settleable(&[open.id, Uuid::new_v4()], &[open]),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn resident_summary_and_residence_balances_agree_on_paid_money() {
    let rule = quarterly_rule();
    let resident = Uuid::new_v4();
    let fees = vec![
        instance(&rule, resident, date(2024, 4, 1), FeeStatus::Paid),
        instance(&rule, resident, date(2024, 7, 1), FeeStatus::Unpaid),
        instance(&rule, resident, date(2024, 10, 1), FeeStatus::Unpaid),
    ];

    let summary = summarize_fees(&fees, date(2024, 8, 15));
    assert_eq!(summary.paid_total, Decimal::new(900, 0));
    assert_eq!(summary.total_due, Decimal::new(1800, 0));
    assert_eq!(summary.overdue_count, 1);

    let balances = aggregate_balances(vec![
        (PaymentMethod::Cash, PaymentStatus::Completed, Decimal::new(900, 0)),
        (PaymentMethod::OnlineCard, PaymentStatus::Completed, Decimal::new(250, 0)),
        (PaymentMethod::Check, PaymentStatus::Rejected, Decimal::new(900, 0)),
        (PaymentMethod::BankTransfer, PaymentStatus::Pending, Decimal::new(100, 0)),
    ]);
    assert_eq!(balances.cash_on_hand, Decimal::new(900, 0));
    assert_eq!(balances.bank_balance, Decimal::new(250, 0));
}

#[test]
fn shifted_schedule_does_not_bill_the_same_quarter_twice() {
    let mut rule = quarterly_rule();
    let residents: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

    let period = current_period(rule.next_due_date, rule.coverage(), date(2024, 2, 1)).unwrap();
    let ledger: Vec<(Uuid, NaiveDate)> = plan_generation(&rule, period, &residents, &HashSet::new())
        .iter()
        .map(|fee| (fee.user_id, fee.due_date))
        .collect();
    assert_eq!(ledger.len(), 3);

    rule.next_due_date = date(2024, 4, 10);
    let shifted = current_period(rule.next_due_date, rule.coverage(), date(2024, 2, 1)).unwrap();
    assert_eq!(shifted.start, date(2024, 1, 10));

    let billed = billed_in_period(&ledger, shifted);
    assert!(plan_generation(&rule, shifted, &residents, &billed).is_empty());
}

#[test]
fn rejected_payment_returns_fee_to_the_unpaid_ledger() {
    let rule = quarterly_rule();
    let resident = Uuid::new_v4();
    let mut fee = instance(&rule, resident, date(2024, 4, 1), FeeStatus::Paid);
    assert!(check_settleable(&[fee.id], &[fee.clone()]).is_err());

    let reverted = fee_status_after_correction(PaymentStatus::Completed, PaymentStatus::Rejected);
    assert_eq!(reverted, Some(FeeStatus::Unpaid));
    fee.status = FeeStatus::Unpaid;

    let summary = summarize_fees(&[fee.clone()], date(2024, 3, 1));
    assert_eq!(summary.paid_total, Decimal::ZERO);
    assert_eq!(summary.total_due, Decimal::new(900, 0));
    assert!(check_settleable(&[fee.id], &[fee]).is_ok());

    let balances = aggregate_balances(vec![(
        PaymentMethod::Cash,
        PaymentStatus::Rejected,
        Decimal::new(900, 0),
    )]);
    assert_eq!(balances.cash_on_hand, Decimal::ZERO);
}
