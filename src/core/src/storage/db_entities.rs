//! SeaORM entity model used by the database storage backend.
//!
//! Maps to the `session_records` table created by `database_storage`.

use sea_orm::entity::prelude::*;

/// Session records table entity model.
///
/// Timestamps are stored as seconds since the epoch so range filters stay
/// numeric.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "session_records")]
pub struct Model {
    /// UUID as string primary key, internal only
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub host: String,
    /// Naive sample time as epoch seconds
    pub time: i64,
    pub user: String,
    pub program: String,
    pub cpu: String,
    pub tty: String,
    /// Remote origin of the login (`from` column of `last`)
    pub origin: String,
    pub login: String,
    pub idle: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
