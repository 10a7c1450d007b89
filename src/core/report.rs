//! Report aggregation business logic.
//!
//! `generate_short_report` turns a user's backlog of unreported transactions
//! into one SHORT report: the numeric snapshot is the durable contract and is
//! persisted synchronously; the AI narrative and the LIFE-report fold run as
//! background tasks whose failures are logged and never surfaced to the
//! caller. LIFE numeric fields are always the element-wise sum of every SHORT
//! report folded in so far; `period_from` never changes once set and
//! `period_to` only extends forward.

use std::collections::BTreeMap;

use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use tracing::{info, warn};

use crate::{
    core::{Services, message, prompts, transaction, user},
    entities::{Report, report, transaction as transaction_entity},
    errors::{Error, Result},
    providers::CompletionRequest,
};

/// Category name mapped to summed absolute amount.
pub type CategoryBreakdown = BTreeMap<String, f64>;

/// Numeric snapshot of one aggregation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortReportSummary {
    /// Number of transactions covered
    pub total_transactions: i32,
    /// Sum of absolute amounts
    pub total_amount: f64,
    /// Signed sum of CREDIT amounts
    pub credit_amount: f64,
    /// Sum of absolute DEBIT amounts
    pub debit_amount: f64,
    /// Per-category sums of absolute amounts
    pub category_breakdown: CategoryBreakdown,
    /// Earliest transaction date in the set
    pub period_from: chrono::DateTime<chrono::Utc>,
    /// Latest transaction date in the set
    pub period_to: chrono::DateTime<chrono::Utc>,
}

/// Computes the numeric summary over a non-empty transaction set.
///
/// Returns None for an empty slice; the caller decides how to surface that.
#[must_use]
pub fn summarize_transactions(
    transactions: &[transaction_entity::Model],
) -> Option<ShortReportSummary> {
    let first = transactions.first()?;

    let mut total_amount = 0.0;
    let mut credit_amount = 0.0;
    let mut debit_amount = 0.0;
    let mut category_breakdown = CategoryBreakdown::new();
    let mut period_from = first.date;
    let mut period_to = first.date;

    for transaction in transactions {
        let absolute = transaction.amount.abs();
        total_amount += absolute;
        match transaction.transaction_type {
            transaction_entity::TransactionType::Credit => credit_amount += transaction.amount,
            transaction_entity::TransactionType::Debit => debit_amount += absolute,
        }
        *category_breakdown
            .entry(transaction.category.as_str().to_string())
            .or_insert(0.0) += absolute;
        if transaction.date < period_from {
            period_from = transaction.date;
        }
        if transaction.date > period_to {
            period_to = transaction.date;
        }
    }

    Some(ShortReportSummary {
        total_transactions: i32::try_from(transactions.len()).unwrap_or(i32::MAX),
        total_amount,
        credit_amount,
        debit_amount,
        category_breakdown,
        period_from,
        period_to,
    })
}

/// Adds every per-category sum of `add` into `into`.
pub fn fold_breakdown(into: &mut CategoryBreakdown, add: &CategoryBreakdown) {
    for (category, amount) in add {
        *into.entry(category.clone()).or_insert(0.0) += amount;
    }
}

/// Parses a stored JSON category breakdown.
pub fn parse_breakdown(raw: &str) -> Result<CategoryBreakdown> {
    serde_json::from_str(raw).map_err(|e| Error::Config {
        message: format!("malformed category breakdown: {e}"),
    })
}

fn breakdown_to_json(breakdown: &CategoryBreakdown) -> Result<String> {
    serde_json::to_string(breakdown).map_err(|e| Error::Config {
        message: format!("failed to serialize category breakdown: {e}"),
    })
}

/// Generates one SHORT report over the user's unreported transactions and
/// kicks off the background narrative and LIFE-fold steps.
///
/// Fails with `NoUnreportedTransactions` when there is nothing to do. Exactly
/// the snapshotted transactions are marked reported.
pub async fn generate_short_report(
    services: &Services,
    user_id: i64,
) -> Result<report::Model> {
    user::require_user(&services.db, user_id).await?;

    let unreported = transaction::get_unreported_transactions(&services.db, user_id).await?;
    let summary = summarize_transactions(&unreported)
        .ok_or(Error::NoUnreportedTransactions { user_id })?;

    let model = report::ActiveModel {
        user_id: Set(user_id),
        report_type: Set(report::ReportType::Short),
        total_transactions: Set(summary.total_transactions),
        total_amount: Set(summary.total_amount),
        credit_amount: Set(summary.credit_amount),
        debit_amount: Set(summary.debit_amount),
        category_breakdown: Set(breakdown_to_json(&summary.category_breakdown)?),
        period_from: Set(summary.period_from),
        period_to: Set(summary.period_to),
        context: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let short_report = model.insert(&services.db).await?;

    let snapshot_ids: Vec<i64> = unreported.iter().map(|t| t.id).collect();
    transaction::mark_transactions_reported(&services.db, &snapshot_ids).await?;

    info!(
        user_id,
        report_id = short_report.id,
        transactions = summary.total_transactions,
        "short report generated"
    );

    spawn_background_steps(services, short_report.clone(), unreported);

    Ok(short_report)
}

/// Launches the best-effort narrative and LIFE-fold tasks.
///
/// Both run detached with a log-only error boundary; neither can fail the
/// triggering call.
fn spawn_background_steps(
    services: &Services,
    short_report: report::Model,
    transactions: Vec<transaction_entity::Model>,
) {
    let annotate_services = services.clone();
    let annotate_report = short_report.clone();
    tokio::spawn(async move {
        if let Err(err) =
            annotate_short_report(&annotate_services, &annotate_report, &transactions).await
        {
            warn!(
                report_id = annotate_report.id,
                error = %err,
                "short report narrative generation failed"
            );
        }
    });

    let life_services = services.clone();
    tokio::spawn(async move {
        if let Err(err) = update_life_report(&life_services, &short_report).await {
            warn!(
                user_id = short_report.user_id,
                error = %err,
                "life report update failed"
            );
        }
    });
}

/// Requests a narrative for a SHORT report, persists it, and pushes it to the
/// user as an outbound message.
pub async fn annotate_short_report(
    services: &Services,
    short_report: &report::Model,
    transactions: &[transaction_entity::Model],
) -> Result<()> {
    let report_user = user::require_user(&services.db, short_report.user_id).await?;
    let (system, user_prompt) = prompts::report_narrative(short_report, &report_user, transactions);
    let completion = services
        .completion
        .complete(CompletionRequest {
            system,
            user: user_prompt,
            previous_response_id: None,
            temperature: prompts::REPORT_TEMPERATURE,
        })
        .await?;

    set_report_context(&services.db, short_report.id, &completion.text).await?;

    message::log_outbound(&services.db, report_user.id, &completion.text, &[]).await?;
    if let (Some(messenger), Some(whatsapp_id)) =
        (&services.messenger, &report_user.whatsapp_id)
    {
        messenger.send_text(whatsapp_id, &completion.text).await?;
    }

    Ok(())
}

/// Folds a SHORT report into the user's LIFE report, creating it on first
/// aggregation, then refreshes the LIFE narrative from the 10 most recent
/// SHORT reports.
pub async fn update_life_report(
    services: &Services,
    short_report: &report::Model,
) -> Result<()> {
    let user_id = short_report.user_id;

    let life_report = match get_life_report(&services.db, user_id).await? {
        None => {
            // First-ever aggregation: LIFE starts as a copy of the SHORT numbers
            let model = report::ActiveModel {
                user_id: Set(user_id),
                report_type: Set(report::ReportType::Life),
                total_transactions: Set(short_report.total_transactions),
                total_amount: Set(short_report.total_amount),
                credit_amount: Set(short_report.credit_amount),
                debit_amount: Set(short_report.debit_amount),
                category_breakdown: Set(short_report.category_breakdown.clone()),
                period_from: Set(short_report.period_from),
                period_to: Set(short_report.period_to),
                context: Set(None),
                created_at: Set(chrono::Utc::now()),
                ..Default::default()
            };
            model.insert(&services.db).await?
        }
        Some(existing) => {
            let mut breakdown = parse_breakdown(&existing.category_breakdown)?;
            fold_breakdown(&mut breakdown, &parse_breakdown(&short_report.category_breakdown)?);

            let period_to = existing.period_to.max(short_report.period_to);
            let mut active: report::ActiveModel = existing.clone().into();
            active.total_transactions =
                Set(existing.total_transactions + short_report.total_transactions);
            active.total_amount = Set(existing.total_amount + short_report.total_amount);
            active.credit_amount = Set(existing.credit_amount + short_report.credit_amount);
            active.debit_amount = Set(existing.debit_amount + short_report.debit_amount);
            active.category_breakdown = Set(breakdown_to_json(&breakdown)?);
            active.period_to = Set(period_to);
            active.update(&services.db).await?
        }
    };

    let recent_shorts = recent_short_reports(&services.db, user_id, 10).await?;
    let (system, user_prompt) = prompts::life_narrative(&life_report, &recent_shorts);
    let completion = services
        .completion
        .complete(CompletionRequest {
            system,
            user: user_prompt,
            previous_response_id: None,
            temperature: prompts::LIFE_TEMPERATURE,
        })
        .await?;
    set_report_context(&services.db, life_report.id, &completion.text).await?;

    Ok(())
}

async fn set_report_context(
    db: &DatabaseConnection,
    report_id: i64,
    context: &str,
) -> Result<report::Model> {
    let found = Report::find_by_id(report_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::Config {
            message: format!("report {report_id} not found"),
        })?;
    let mut active: report::ActiveModel = found.into();
    active.context = Set(Some(context.to_string()));
    active.update(db).await.map_err(Into::into)
}

/// The user's LIFE report, if one exists yet.
pub async fn get_life_report(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Option<report::Model>> {
    Report::find()
        .filter(report::Column::UserId.eq(user_id))
        .filter(report::Column::ReportType.eq(report::ReportType::Life))
        .one(db)
        .await
        .map_err(Into::into)
}

/// The user's most recent SHORT reports, newest first.
pub async fn recent_short_reports(
    db: &DatabaseConnection,
    user_id: i64,
    limit: u64,
) -> Result<Vec<report::Model>> {
    Report::find()
        .filter(report::Column::UserId.eq(user_id))
        .filter(report::Column::ReportType.eq(report::ReportType::Short))
        .order_by_desc(report::Column::CreatedAt)
        .order_by_desc(report::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::entities::transaction::{Category, TransactionType};
    use crate::test_utils::*;

    fn breakdown(entries: &[(&str, f64)]) -> CategoryBreakdown {
        entries
            .iter()
            .map(|(category, amount)| ((*category).to_string(), *amount))
            .collect()
    }

    /// Inserts a SHORT report row directly, bypassing the aggregator.
    async fn insert_short_report(
        db: &DatabaseConnection,
        user_id: i64,
        summary: &ShortReportSummary,
    ) -> Result<report::Model> {
        let model = report::ActiveModel {
            user_id: Set(user_id),
            report_type: Set(report::ReportType::Short),
            total_transactions: Set(summary.total_transactions),
            total_amount: Set(summary.total_amount),
            credit_amount: Set(summary.credit_amount),
            debit_amount: Set(summary.debit_amount),
            category_breakdown: Set(serde_json::to_string(&summary.category_breakdown).unwrap()),
            period_from: Set(summary.period_from),
            period_to: Set(summary.period_to),
            context: Set(None),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };
        model.insert(db).await.map_err(Into::into)
    }

    fn summary(
        total_transactions: i32,
        total_amount: f64,
        credit_amount: f64,
        debit_amount: f64,
        entries: &[(&str, f64)],
        from_secs: i64,
        to_secs: i64,
    ) -> ShortReportSummary {
        ShortReportSummary {
            total_transactions,
            total_amount,
            credit_amount,
            debit_amount,
            category_breakdown: breakdown(entries),
            period_from: chrono::DateTime::from_timestamp(from_secs, 0).unwrap(),
            period_to: chrono::DateTime::from_timestamp(to_secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_summarize_empty_set() {
        assert!(summarize_transactions(&[]).is_none());
    }

    #[test]
    fn test_summarize_scenario_totals() {
        let transactions = vec![
            sample_typed_transaction(1, 1, 10.0, Category::Food, TransactionType::Debit, 100),
            sample_typed_transaction(2, 1, 20.0, Category::Food, TransactionType::Debit, 200),
            sample_typed_transaction(3, 1, 100.0, Category::Other, TransactionType::Credit, 300),
        ];

        let summary = summarize_transactions(&transactions).unwrap();
        assert_eq!(summary.total_transactions, 3);
        assert_eq!(summary.total_amount, 130.0);
        assert_eq!(summary.credit_amount, 100.0);
        assert_eq!(summary.debit_amount, 30.0);
        assert_eq!(
            summary.category_breakdown,
            breakdown(&[("food", 30.0), ("other", 100.0)])
        );
        // Breakdown values always sum back to the total
        assert_eq!(summary.category_breakdown.values().sum::<f64>(), 130.0);
        assert_eq!(
            summary.period_from,
            chrono::DateTime::from_timestamp(100, 0).unwrap()
        );
        assert_eq!(
            summary.period_to,
            chrono::DateTime::from_timestamp(300, 0).unwrap()
        );
    }

    #[test]
    fn test_summarize_signed_debit_uses_absolute() {
        let transactions = vec![sample_typed_transaction(
            1,
            1,
            -25.0,
            Category::Bills,
            TransactionType::Debit,
            100,
        )];
        let summary = summarize_transactions(&transactions).unwrap();
        assert_eq!(summary.total_amount, 25.0);
        assert_eq!(summary.debit_amount, 25.0);
        assert_eq!(summary.category_breakdown, breakdown(&[("bills", 25.0)]));
    }

    #[test]
    fn test_fold_breakdown_is_associative_and_commutative() {
        let a = breakdown(&[("food", 30.0), ("travel", 5.0)]);
        let b = breakdown(&[("food", 10.0), ("other", 100.0)]);
        let c = breakdown(&[("bills", 7.5)]);

        // (a+b)+c
        let mut left = a.clone();
        fold_breakdown(&mut left, &b);
        fold_breakdown(&mut left, &c);

        // a+(b+c)
        let mut right_inner = b.clone();
        fold_breakdown(&mut right_inner, &c);
        let mut right = a.clone();
        fold_breakdown(&mut right, &right_inner);
        assert_eq!(left, right);

        // b+a == a+b
        let mut ab = a.clone();
        fold_breakdown(&mut ab, &b);
        let mut ba = b;
        fold_breakdown(&mut ba, &a);
        assert_eq!(ab, ba);
    }

    #[tokio::test]
    async fn test_generate_short_report_requires_backlog() -> Result<()> {
        let (services, _completion, _messenger) = setup_services().await?;
        let user = create_test_user(&services.db).await?;

        let result = generate_short_report(&services, user.id).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::NoUnreportedTransactions { user_id: _ }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_generate_short_report_unknown_user() -> Result<()> {
        let (services, _completion, _messenger) = setup_services().await?;
        let result = generate_short_report(&services, 999).await;
        assert!(matches!(result.unwrap_err(), Error::UserNotFound { id: _ }));
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_short_report_scenario() -> Result<()> {
        let (services, _completion, _messenger) = setup_services().await?;
        let user = create_test_user(&services.db).await?;
        crate::core::transaction::create_transaction(
            &services.db,
            user.id,
            10.0,
            Category::Food,
            TransactionType::Debit,
            None,
        )
        .await?;
        crate::core::transaction::create_transaction(
            &services.db,
            user.id,
            20.0,
            Category::Food,
            TransactionType::Debit,
            None,
        )
        .await?;
        crate::core::transaction::create_transaction(
            &services.db,
            user.id,
            100.0,
            Category::Other,
            TransactionType::Credit,
            None,
        )
        .await?;

        let report = generate_short_report(&services, user.id).await?;
        assert_eq!(report.report_type, report::ReportType::Short);
        assert_eq!(report.total_transactions, 3);
        assert_eq!(report.total_amount, 130.0);
        assert_eq!(report.credit_amount, 100.0);
        assert_eq!(report.debit_amount, 30.0);
        assert_eq!(
            parse_breakdown(&report.category_breakdown)?,
            breakdown(&[("food", 30.0), ("other", 100.0)])
        );

        // All three are now reported; a second run has nothing to do
        let unreported =
            crate::core::transaction::get_unreported_transactions(&services.db, user.id).await?;
        assert!(unreported.is_empty());
        let second = generate_short_report(&services, user.id).await;
        assert!(matches!(
            second.unwrap_err(),
            Error::NoUnreportedTransactions { user_id: _ }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_annotate_short_report_persists_and_delivers() -> Result<()> {
        let (services, completion, messenger) = setup_services().await?;
        let user = create_test_user(&services.db).await?;
        let short = insert_short_report(
            &services.db,
            user.id,
            &summary(2, 30.0, 0.0, 30.0, &[("food", 30.0)], 100, 200),
        )
        .await?;

        completion.push_text("Your food spending held steady this week.", "resp_report");
        annotate_short_report(&services, &short, &[]).await?;

        let stored = Report::find_by_id(short.id).one(&services.db).await?.unwrap();
        assert_eq!(
            stored.context.as_deref(),
            Some("Your food spending held steady this week.")
        );

        let history = message::get_messages_by_user(&services.db, user.id).await?;
        assert_eq!(history.len(), 1);
        assert!(history[0].is_from_ai);

        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "Your food spending held steady this week.");
        assert!(sent[0].options.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_annotate_failure_leaves_report_untouched() -> Result<()> {
        let (services, completion, messenger) = setup_services().await?;
        let user = create_test_user(&services.db).await?;
        let short = insert_short_report(
            &services.db,
            user.id,
            &summary(1, 10.0, 0.0, 10.0, &[("food", 10.0)], 100, 100),
        )
        .await?;

        completion.push_error("provider unavailable");
        let result = annotate_short_report(&services, &short, &[]).await;
        assert!(matches!(result.unwrap_err(), Error::AiGeneration { message: _ }));

        let stored = Report::find_by_id(short.id).one(&services.db).await?.unwrap();
        assert_eq!(stored.context, None);
        assert!(messenger.sent().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_first_fold_creates_life_as_copy() -> Result<()> {
        let (services, completion, _messenger) = setup_services().await?;
        let user = create_test_user(&services.db).await?;
        let short = insert_short_report(
            &services.db,
            user.id,
            &summary(3, 130.0, 100.0, 30.0, &[("food", 30.0), ("other", 100.0)], 100, 300),
        )
        .await?;

        completion.push_text("First lifetime summary.", "resp_life");
        update_life_report(&services, &short).await?;

        let life = get_life_report(&services.db, user.id).await?.unwrap();
        assert_eq!(life.report_type, report::ReportType::Life);
        assert_eq!(life.total_transactions, short.total_transactions);
        assert_eq!(life.total_amount, short.total_amount);
        assert_eq!(life.credit_amount, short.credit_amount);
        assert_eq!(life.debit_amount, short.debit_amount);
        assert_eq!(life.category_breakdown, short.category_breakdown);
        assert_eq!(life.period_from, short.period_from);
        assert_eq!(life.period_to, short.period_to);
        assert_eq!(life.context.as_deref(), Some("First lifetime summary."));

        Ok(())
    }

    #[tokio::test]
    async fn test_second_fold_accumulates_elementwise() -> Result<()> {
        let (services, completion, _messenger) = setup_services().await?;
        let user = create_test_user(&services.db).await?;

        let first = insert_short_report(
            &services.db,
            user.id,
            &summary(3, 130.0, 100.0, 30.0, &[("food", 30.0), ("other", 100.0)], 100, 300),
        )
        .await?;
        completion.push_text("first life narrative", "resp_1");
        update_life_report(&services, &first).await?;

        let second = insert_short_report(
            &services.db,
            user.id,
            &summary(2, 45.0, 0.0, 45.0, &[("food", 20.0), ("travel", 25.0)], 250, 500),
        )
        .await?;
        completion.push_text("second life narrative", "resp_2");
        update_life_report(&services, &second).await?;

        let life = get_life_report(&services.db, user.id).await?.unwrap();
        assert_eq!(life.total_transactions, 5);
        assert_eq!(life.total_amount, 175.0);
        assert_eq!(life.credit_amount, 100.0);
        assert_eq!(life.debit_amount, 75.0);
        assert_eq!(
            parse_breakdown(&life.category_breakdown)?,
            breakdown(&[("food", 50.0), ("other", 100.0), ("travel", 25.0)])
        );
        // period_from never moves; period_to only extends
        assert_eq!(life.period_from, first.period_from);
        assert_eq!(life.period_to, second.period_to);
        assert_eq!(life.context.as_deref(), Some("second life narrative"));

        Ok(())
    }

    #[tokio::test]
    async fn test_life_narrative_failure_keeps_fold() -> Result<()> {
        let (services, completion, _messenger) = setup_services().await?;
        let user = create_test_user(&services.db).await?;
        let short = insert_short_report(
            &services.db,
            user.id,
            &summary(1, 10.0, 0.0, 10.0, &[("food", 10.0)], 100, 100),
        )
        .await?;

        completion.push_error("provider unavailable");
        let result = update_life_report(&services, &short).await;
        assert!(matches!(result.unwrap_err(), Error::AiGeneration { message: _ }));

        // The numeric fold already committed; only the narrative is missing
        let life = get_life_report(&services.db, user.id).await?.unwrap();
        assert_eq!(life.total_amount, 10.0);
        assert_eq!(life.context, None);

        Ok(())
    }
}
