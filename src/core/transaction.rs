//! Transaction business logic.
//!
//! Transaction creation is the one multi-step operation that must be atomic:
//! the insert and the user balance adjustment commit together or not at all.
//! Creation also closes any still-open prior conversation for the user, so
//! the per-user state machine derived from the most recent transaction never
//! observes two open conversations at once. The reporting flag is flipped by
//! id set, never by filter, so concurrently created transactions cannot be
//! marked reported without being counted.

use crate::{
    entities::{
        Transaction, User,
        transaction::{self, Category, TransactionType},
        user,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};

/// Creates a transaction and adjusts the user's balance in one atomic unit.
///
/// CREDIT adds the amount to the balance; DEBIT subtracts its absolute value.
/// Any prior open conversation for the user is closed inside the same
/// database transaction (most recent wins).
pub async fn create_transaction(
    db: &DatabaseConnection,
    user_id: i64,
    amount: f64,
    category: Category,
    transaction_type: TransactionType,
    store_name: Option<String>,
) -> Result<transaction::Model> {
    if amount == 0.0 || !amount.is_finite() {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;

    User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            id: user_id.to_string(),
        })?;

    // Most recent wins: supersede any conversation still open for this user
    Transaction::update_many()
        .col_expr(transaction::Column::IsConversationClosed, Expr::value(true))
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::IsConversationClosed.eq(false))
        .exec(&txn)
        .await?;

    let model = transaction::ActiveModel {
        user_id: Set(user_id),
        amount: Set(amount),
        category: Set(category),
        transaction_type: Set(transaction_type),
        store_name: Set(store_name),
        date: Set(chrono::Utc::now()),
        context: Set(None),
        is_reported: Set(false),
        is_conversation_closed: Set(false),
        latest_response_id: Set(None),
        ..Default::default()
    };
    let result = model.insert(&txn).await?;

    let delta = match transaction_type {
        TransactionType::Credit => amount,
        TransactionType::Debit => -amount.abs(),
    };
    User::update_many()
        .col_expr(
            user::Column::Balance,
            Expr::col(user::Column::Balance).add(delta),
        )
        .filter(user::Column::Id.eq(user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    Ok(result)
}

/// Retrieves all transactions, newest first.
pub async fn get_transactions(db: &DatabaseConnection) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a user's transactions, newest first.
pub async fn get_transactions_by_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific transaction by id.
pub async fn get_transaction_by_id(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific transaction by id, failing if absent.
pub async fn require_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<transaction::Model> {
    get_transaction_by_id(db, transaction_id)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })
}

/// The user's most recent transaction, which drives the conversation state.
pub async fn latest_transaction(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Option<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// A user's not-yet-reported transactions, newest first.
pub async fn get_unreported_transactions(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::IsReported.eq(false))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Flags exactly the given transactions as reported.
///
/// Takes the snapshot of ids the aggregator summarized; transactions created
/// after the snapshot stay unreported for the next run.
pub async fn mark_transactions_reported(db: &DatabaseConnection, ids: &[i64]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    Transaction::update_many()
        .col_expr(transaction::Column::IsReported, Expr::value(true))
        .filter(transaction::Column::Id.is_in(ids.to_vec()))
        .exec(db)
        .await?;
    Ok(())
}

/// Stores the context extracted from the user's conversation.
pub async fn update_transaction_context(
    db: &DatabaseConnection,
    transaction_id: i64,
    context: &str,
) -> Result<transaction::Model> {
    let found = require_transaction(db, transaction_id).await?;
    let mut active: transaction::ActiveModel = found.into();
    active.context = Set(Some(context.to_string()));
    active.update(db).await.map_err(Into::into)
}

/// Stores the latest completion-provider continuation token.
pub async fn update_transaction_response_id(
    db: &DatabaseConnection,
    transaction_id: i64,
    response_id: &str,
) -> Result<transaction::Model> {
    let found = require_transaction(db, transaction_id).await?;
    let mut active: transaction::ActiveModel = found.into();
    active.latest_response_id = Set(Some(response_id.to_string()));
    active.update(db).await.map_err(Into::into)
}

/// Closes the context conversation for a transaction. Terminal.
pub async fn close_conversation(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<transaction::Model> {
    let found = require_transaction(db, transaction_id).await?;
    let mut active: transaction::ActiveModel = found.into();
    active.is_conversation_closed = Set(true);
    active.update(db).await.map_err(Into::into)
}

/// Recent transactions in the same category, excluding one id.
pub async fn recent_by_category(
    db: &DatabaseConnection,
    user_id: i64,
    category: Category,
    exclude_id: i64,
    limit: u64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::Category.eq(category))
        .filter(transaction::Column::Id.ne(exclude_id))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Recent transactions at the same store, excluding one id.
pub async fn recent_by_store(
    db: &DatabaseConnection,
    user_id: i64,
    store_name: &str,
    exclude_id: i64,
    limit: u64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::StoreName.eq(store_name))
        .filter(transaction::Column::Id.ne(exclude_id))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Most recent transactions overall, excluding one id.
pub async fn recent_overall(
    db: &DatabaseConnection,
    user_id: i64,
    exclude_id: i64,
    limit: u64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::Id.ne(exclude_id))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}
