//! User entity - Represents an account holder.
//!
//! Each user has a display name, a running balance, and an optional WhatsApp
//! identity (phone number) that is filled in once the user is linked to the
//! messaging channel. The balance is only ever mutated through transaction
//! creation, never directly.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, taken from the WhatsApp profile on first contact
    pub name: String,
    /// Current account balance
    pub balance: f64,
    /// WhatsApp identity (phone number), None until linked
    pub whatsapp_id: Option<String>,
    /// When the user was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
    /// One user has many messages
    #[sea_orm(has_many = "super::message::Entity")]
    Messages,
    /// One user has many reports
    #[sea_orm(has_many = "super::report::Entity")]
    Reports,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl Related<super::report::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reports.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
