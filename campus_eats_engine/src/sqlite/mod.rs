//! SQLite backend for the Campus Eats order engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
