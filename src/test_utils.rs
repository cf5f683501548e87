use std::sync::Arc;

use sea_orm::Database as SeaDatabase;

use crate::database::Database;

pub async fn test_db() -> Arc<Database> {
    let conn = SeaDatabase::connect("sqlite::memory:?mode=rwc")
        .await
        .unwrap();

    let db = Database::prepare(conn)
        .await
        .unwrap_or_else(|e| panic!("Failed to prepare test database: {:?}", e));

    Arc::new(db)
}
