//! Transaction entity - Represents all financial transactions in the system.
//!
//! Each transaction belongs to one user and carries an amount, a spending
//! category, a type (`CREDIT`/`DEBIT`), an optional store name, and the
//! conversation bookkeeping fields: free-text `context` collected from the
//! user, the `is_conversation_closed` flag driving the per-user conversation
//! state machine, the `is_reported` flag consumed by report aggregation, and
//! the latest completion-provider continuation token.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction direction: money in or money out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TransactionType {
    /// Incoming funds, adds to the balance
    #[sea_orm(string_value = "CREDIT")]
    #[serde(rename = "CREDIT")]
    Credit,
    /// Outgoing funds, subtracts from the balance
    #[sea_orm(string_value = "DEBIT")]
    #[serde(rename = "DEBIT")]
    Debit,
}

/// Fixed set of spending categories.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, EnumIter, DeriveActiveEnum, Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[sea_orm(string_value = "food")]
    Food,
    #[sea_orm(string_value = "transportation")]
    Transportation,
    #[sea_orm(string_value = "entertainment")]
    Entertainment,
    #[sea_orm(string_value = "shopping")]
    Shopping,
    #[sea_orm(string_value = "bills")]
    Bills,
    #[sea_orm(string_value = "health")]
    Health,
    #[sea_orm(string_value = "education")]
    Education,
    #[sea_orm(string_value = "travel")]
    Travel,
    #[sea_orm(string_value = "other")]
    Other,
}

impl Category {
    /// The category name as stored in the database and used as a
    /// category-breakdown key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Transportation => "transportation",
            Self::Entertainment => "entertainment",
            Self::Shopping => "shopping",
            Self::Bills => "bills",
            Self::Health => "health",
            Self::Education => "education",
            Self::Travel => "travel",
            Self::Other => "other",
        }
    }
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the user this transaction belongs to
    pub user_id: i64,
    /// Transaction amount; `total`/`debit` aggregation uses absolute values
    pub amount: f64,
    /// Spending category
    pub category: Category,
    /// Whether this is incoming (`CREDIT`) or outgoing (`DEBIT`) money
    pub transaction_type: TransactionType,
    /// Store or merchant name, if known
    pub store_name: Option<String>,
    /// When the transaction occurred
    pub date: DateTimeUtc,
    /// Free-text context collected through the conversation, None until filled
    pub context: Option<String>,
    /// Whether this transaction has been folded into a SHORT report
    pub is_reported: bool,
    /// Whether the context conversation for this transaction is closed
    pub is_conversation_closed: bool,
    /// Latest completion-provider continuation token for this conversation
    pub latest_response_id: Option<String>,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
