use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

/// Represents an account able to log in.
/// The username is the account email and is kept in sync with `user_details.email`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    /// PBKDF2 hash in PHC string format.
    pub password_hash: String,
    pub role_id: i32,
    /// Active flag. Inactive users cannot log in.
    #[sea_orm(default_value = "true")]
    pub status: bool,
    /// Set while the account holds a system-generated password.
    #[sea_orm(default_value = "true")]
    pub is_temp_password: bool,
    pub created_by: Option<i32>,
    pub created_date: NaiveDateTime,
    pub modified_by: Option<i32>,
    pub modified_date: Option<NaiveDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::role::Entity",
        from = "Column::RoleId",
        to = "super::role::Column::Id"
    )]
    Role,
    #[sea_orm(has_one = "super::user_detail::Entity")]
    UserDetail,
    #[sea_orm(has_many = "super::session::Entity")]
    Session,
    #[sea_orm(has_many = "super::password_reset_token::Entity")]
    PasswordResetToken,
}

impl Related<super::role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Role.def()
    }
}

impl Related<super::user_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserDetail.def()
    }
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::password_reset_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PasswordResetToken.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
