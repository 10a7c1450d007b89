//! Database configuration module.
//!
//! Handles `SQLite` connection setup and table creation using `SeaORM`.
//! Table creation uses `Schema::create_table_from_entity` so the database
//! schema always matches the Rust entity definitions without manual SQL.

use crate::entities::{Message, Report, Transaction, User};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Gets the database URL from the environment or returns the default local
/// `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://data/spendcoach.sqlite?mode=rwc".to_string())
}

/// Establishes a connection to the database given a connection string.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all necessary database tables from the entity definitions.
///
/// Safe to call on an empty database only; existing tables are not migrated.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let user_table = schema.create_table_from_entity(User);
    let transaction_table = schema.create_table_from_entity(Transaction);
    let message_table = schema.create_table_from_entity(Message);
    let report_table = schema.create_table_from_entity(Report);

    db.execute(builder.build(&user_table)).await?;
    db.execute(builder.build(&transaction_table)).await?;
    db.execute(builder.build(&message_table)).await?;
    db.execute(builder.build(&report_table)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        message::Model as MessageModel, report::Model as ReportModel,
        transaction::Model as TransactionModel, user::Model as UserModel,
    };
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Tables exist when they can be queried
        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<TransactionModel> = Transaction::find().limit(1).all(&db).await?;
        let _: Vec<MessageModel> = Message::find().limit(1).all(&db).await?;
        let _: Vec<ReportModel> = Report::find().limit(1).all(&db).await?;

        Ok(())
    }
}
