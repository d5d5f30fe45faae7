use sea_orm::entity::prelude::*;

/// Query statistics recorded by the AI backend.
/// Read-only from this service: rows are written downstream.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "top_queries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(column_type = "Text")]
    pub query: String,
    #[sea_orm(column_type = "Text")]
    pub llm_response: String,
    /// Document the answer was drawn from.
    #[sea_orm(column_type = "Text")]
    pub source: String,
    /// Page references inside `source`.
    pub page_no: Json,
    #[sea_orm(column_type = "Text", nullable)]
    pub topic: Option<String>,
    pub count: i32,
    pub user_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
