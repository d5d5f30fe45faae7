//! Root of all SeaORM entity modules.
//! The credential store (users, roles, details, sessions, reset tokens),
//! upload metadata, and the analytics tables filled by the AI backend.

pub mod document_gap;
pub mod file_upload;
pub mod password_reset_token;
pub mod role;
pub mod session;
pub mod top_query;
pub mod user;
pub mod user_detail;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::document_gap::Entity as DocumentGap;
    pub use super::file_upload::Entity as FileUpload;
    pub use super::password_reset_token::Entity as PasswordResetToken;
    pub use super::role::Entity as Role;
    pub use super::session::Entity as Session;
    pub use super::top_query::Entity as TopQuery;
    pub use super::user::Entity as User;
    pub use super::user_detail::Entity as UserDetail;
}
