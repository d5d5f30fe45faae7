use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

/// Metadata of a document pushed to object storage.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "file_uploads")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Name as submitted by the client.
    pub file_name: String,
    /// Object key in the store.
    #[sea_orm(unique)]
    pub storage_key: String,
    pub file_url: String,
    pub file_type: String,
    /// Size in bytes.
    pub file_size: i64,
    pub uploaded_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
