//! Database layer: schema initialization, catalog models, and
//! precomputed-summary maintenance

pub mod init;
pub mod models;
pub mod summaries;

pub use init::{create_tables, init_database, open_database_readonly};
pub use models::WorkRecord;
pub use summaries::rebuild_summaries;
