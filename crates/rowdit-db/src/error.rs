use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique constraint rejected the write. Carries the offending field.
    #[error("{0} already taken")]
    Conflict(&'static str),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("DB lock poisoned")]
    Poisoned,
}

/// Map a unique-constraint failure on `users` to the field that caused it.
pub(crate) fn unique_violation(err: &rusqlite::Error) -> Option<&'static str> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            if msg.contains("users.username") {
                Some("username")
            } else if msg.contains("users.email") {
                Some("email")
            } else {
                None
            }
        }
        _ => None,
    }
}
