pub mod initdb;
pub mod migrate_and_serve;
pub mod serve;
pub mod sweep_sessions;

pub use initdb::init_database;
pub use migrate_and_serve::migrate_and_serve;
pub use serve::serve;
pub use sweep_sessions::sweep_sessions;
