mod sqlite;

pub use sqlite::SqliteDatabase;
