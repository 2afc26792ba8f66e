/*!
 * SQLite persistence for translated records.
 *
 * An alternative to the one-file-per-record progress store, holding every
 * namespace in a single database file.
 */

pub mod connection;
pub mod schema;
pub mod store;

// Re-export main types
pub use connection::DatabaseConnection;
pub use store::SqliteProgressStore;
