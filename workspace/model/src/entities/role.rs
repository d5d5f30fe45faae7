use sea_orm::entity::prelude::*;

/// Access role a user is assigned to.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "roles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user::Entity")]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub const ADMIN: &str = "admin";
pub const SYSTEM_ADMIN: &str = "system_admin";
pub const USER: &str = "user";

/// Roles seeded by the migrations and re-ensured at startup.
pub const DEFAULT_ROLES: [&str; 3] = [ADMIN, SYSTEM_ADMIN, USER];

impl Model {
    /// Admin checks are case-insensitive.
    pub fn is_admin(&self) -> bool {
        self.name.eq_ignore_ascii_case(ADMIN)
    }
}
