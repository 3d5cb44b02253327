use std::path::Path;

use log::{debug, error, info};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, Database, DatabaseConnection,
    DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Schema,
    TransactionTrait,
};
use uuid::Uuid;

use crate::error_handling::types::StorageError;
use crate::storage::db_entities as records;
use crate::storage::session_filter::Filter;
use crate::storage::storage_trait::Storage;
use crate::storage::types::{
    from_epoch_seconds, to_epoch_seconds, Field, FieldValue, SessionRecord,
};

// Rows per INSERT statement, well under SQLite's bound-parameter limit.
const INSERT_CHUNK: usize = 500;

fn read_failed(e: DbErr) -> StorageError {
    error!("Database read failed: {}", e);
    StorageError::ReadFailed(e.to_string())
}

fn write_failed(e: DbErr) -> StorageError {
    error!("Database write failed: {}", e);
    StorageError::WriteFailed(e.to_string())
}

fn column(field: Field) -> records::Column {
    match field {
        Field::Host => records::Column::Host,
        Field::Time => records::Column::Time,
        Field::User => records::Column::User,
        Field::Program => records::Column::Program,
        Field::Cpu => records::Column::Cpu,
        Field::Tty => records::Column::Tty,
        Field::From => records::Column::Origin,
        Field::Login => records::Column::Login,
        Field::Idle => records::Column::Idle,
    }
}

fn condition(filter: &Filter) -> Condition {
    let mut cond = Condition::all();
    if let Some(ref prefix) = filter.host {
        // instr() is case-sensitive, unlike LIKE on SQLite
        if !prefix.is_empty() {
            cond = cond.add(Expr::cust_with_values(
                "instr(\"host\", ?) = 1",
                [prefix.clone()],
            ));
        }
    }
    if let Some(window) = filter.time {
        cond = cond.add(records::Column::Time.between(
            to_epoch_seconds(window.start),
            to_epoch_seconds(window.end),
        ));
    }
    if let Some(ref user) = filter.user {
        cond = cond.add(records::Column::User.eq(user.clone()));
    }
    if let Some(ref program) = filter.program {
        cond = cond.add(records::Column::Program.eq(program.clone()));
    }
    cond
}

fn to_active_model(record: &SessionRecord) -> records::ActiveModel {
    records::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        host: Set(record.host.clone()),
        time: Set(to_epoch_seconds(record.time)),
        user: Set(record.user.clone()),
        program: Set(record.program.clone()),
        cpu: Set(record.cpu.clone()),
        tty: Set(record.tty.clone()),
        origin: Set(record.from.clone()),
        login: Set(record.login.clone()),
        idle: Set(record.idle.clone()),
    }
}

fn epoch_to_time(secs: i64) -> Result<chrono::NaiveDateTime, StorageError> {
    from_epoch_seconds(secs)
        .ok_or_else(|| StorageError::ReadFailed(format!("timestamp {} out of range", secs)))
}

impl TryFrom<records::Model> for SessionRecord {
    type Error = StorageError;

    fn try_from(model: records::Model) -> Result<Self, Self::Error> {
        Ok(SessionRecord {
            host: model.host,
            time: epoch_to_time(model.time)?,
            user: model.user,
            program: model.program,
            cpu: model.cpu,
            tty: model.tty,
            from: model.origin,
            login: model.login,
            idle: model.idle,
        })
    }
}

/// SQLite-backed store gateway.
///
/// SeaORM is async; this type owns a current-thread runtime and blocks on it
/// so callers see a plain synchronous API.
pub struct DatabaseStorage {
    db: DatabaseConnection,
    rt: tokio::runtime::Runtime,
}

impl DatabaseStorage {
    pub fn new_file<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
            }
        }
        let url = format!("sqlite://{}?mode=rwc", path_ref.display());
        let db = rt.block_on(async move {
            let db = Database::connect(url.as_str()).await.map_err(|e| {
                error!("Unable to open {}: {}", url, e);
                StorageError::ConnectionFailed(e.to_string())
            })?;
            let backend = db.get_database_backend();
            let schema = Schema::new(backend);
            let mut table = schema.create_table_from_entity(records::Entity);
            table.if_not_exists();
            db.execute(backend.build(&table)).await.map_err(write_failed)?;
            Ok::<_, StorageError>(db)
        })?;
        info!("DatabaseStorage opened at {}", path_ref.display());
        Ok(Self { db, rt })
    }
}

impl Storage for DatabaseStorage {
    fn insert_records(&self, batch: &[SessionRecord]) -> Result<usize, StorageError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let models: Vec<records::ActiveModel> = batch.iter().map(to_active_model).collect();
        self.rt.block_on(async {
            // Dropping the transaction on an early return rolls the batch back.
            let txn = self.db.begin().await.map_err(write_failed)?;
            for chunk in models.chunks(INSERT_CHUNK) {
                records::Entity::insert_many(chunk.iter().cloned())
                    .exec_without_returning(&txn)
                    .await
                    .map_err(write_failed)?;
            }
            txn.commit().await.map_err(write_failed)?;
            Ok::<_, StorageError>(())
        })?;
        info!("Inserted {} record(s)", batch.len());
        Ok(batch.len())
    }

    fn find(
        &self,
        filter: &Filter,
        sort: Option<Field>,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        self.rt.block_on(async {
            let mut query = records::Entity::find().filter(condition(filter));
            if let Some(field) = sort {
                query = query.order_by_asc(column(field));
            }
            let rows = query.all(&self.db).await.map_err(read_failed)?;
            debug!("{} record(s) match {:?}", rows.len(), filter);
            rows.into_iter()
                .map(SessionRecord::try_from)
                .collect::<Result<Vec<_>, StorageError>>()
        })
    }

    fn find_field(
        &self,
        filter: &Filter,
        field: Field,
        sort: Option<Field>,
    ) -> Result<Vec<FieldValue>, StorageError> {
        self.rt.block_on(async {
            let mut query = records::Entity::find()
                .select_only()
                .column(column(field))
                .filter(condition(filter));
            if let Some(sort) = sort {
                query = query.order_by_asc(column(sort));
            }
            let values = if field == Field::Time {
                let secs: Vec<i64> = query.into_tuple().all(&self.db).await.map_err(read_failed)?;
                secs.into_iter()
                    .map(|s| epoch_to_time(s).map(FieldValue::Time))
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                let texts: Vec<String> =
                    query.into_tuple().all(&self.db).await.map_err(read_failed)?;
                texts.into_iter().map(FieldValue::Text).collect()
            };
            debug!("{} {} value(s) match {:?}", values.len(), field, filter);
            Ok::<_, StorageError>(values)
        })
    }

    fn count(&self, filter: &Filter) -> Result<u64, StorageError> {
        self.rt.block_on(async {
            records::Entity::find()
                .filter(condition(filter))
                .count(&self.db)
                .await
                .map_err(read_failed)
        })
    }

    fn distinct(&self, field: Field) -> Result<Vec<FieldValue>, StorageError> {
        self.rt.block_on(async {
            let query = records::Entity::find()
                .select_only()
                .column(column(field))
                .distinct()
                .order_by_asc(column(field));
            if field == Field::Time {
                let secs: Vec<i64> = query.into_tuple().all(&self.db).await.map_err(read_failed)?;
                secs.into_iter()
                    .map(|s| epoch_to_time(s).map(FieldValue::Time))
                    .collect::<Result<Vec<_>, StorageError>>()
            } else {
                let texts: Vec<String> =
                    query.into_tuple().all(&self.db).await.map_err(read_failed)?;
                Ok(texts.into_iter().map(FieldValue::Text).collect())
            }
        })
    }
}
