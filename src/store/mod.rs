pub mod bundle;
pub mod csv_export;
pub mod engine;
pub mod manager;
pub mod migration;
pub mod schema;
pub mod transfer;

pub use bundle::ExportBundle;
pub use csv_export::{
    plain_text,
    table_to_csv,
    write_table_csv,
};
pub use manager::{
    StoreManager,
    DATABASE_FILE,
};
pub use migration::Migration;
pub use schema::{
    Column,
    Record,
    TableSchema,
    DEFAULT_TABLE,
};
pub use transfer::{
    plan_transfer,
    ColumnMapping,
    TransferMode,
    TransferReport,
};
