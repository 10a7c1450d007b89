//! Report entity - Aggregated spending summaries.
//!
//! Two variants share this table, tagged by `report_type`: `SHORT` covers one
//! aggregation run over a batch of previously-unreported transactions, `LIFE`
//! is the single running lifetime accumulation per user. The numeric fields
//! of the LIFE report are always the element-wise sum of every SHORT report
//! folded into it so far. The category breakdown is stored as a JSON object
//! mapping category name to summed absolute amount.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Report variant tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ReportType {
    /// One aggregation run over a contiguous batch of transactions
    #[sea_orm(string_value = "SHORT")]
    #[serde(rename = "SHORT")]
    Short,
    /// The single running lifetime accumulation, at most one per user
    #[sea_orm(string_value = "LIFE")]
    #[serde(rename = "LIFE")]
    Life,
}

/// Report database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    /// Unique identifier for the report
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the user this report belongs to
    pub user_id: i64,
    /// `SHORT` or `LIFE`
    pub report_type: ReportType,
    /// Number of transactions covered
    pub total_transactions: i32,
    /// Sum of absolute transaction amounts
    pub total_amount: f64,
    /// Signed sum of CREDIT amounts
    pub credit_amount: f64,
    /// Sum of absolute DEBIT amounts
    pub debit_amount: f64,
    /// JSON object mapping category name to summed absolute amount
    #[sea_orm(column_type = "Text")]
    pub category_breakdown: String,
    /// Earliest transaction date covered; never changes once set for LIFE
    pub period_from: DateTimeUtc,
    /// Latest transaction date covered; monotonically extended for LIFE
    pub period_to: DateTimeUtc,
    /// AI-generated narrative, filled in asynchronously and best-effort
    #[sea_orm(column_type = "Text", nullable)]
    pub context: Option<String>,
    /// When the report row was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Report and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each report belongs to one user
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
