//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod message;
pub mod report;
pub mod transaction;
pub mod user;

// Re-export specific types to avoid conflicts
pub use message::{Column as MessageColumn, Entity as Message, Model as MessageModel};
pub use report::{Column as ReportColumn, Entity as Report, Model as ReportModel, ReportType};
pub use transaction::{
    Category, Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionType,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
