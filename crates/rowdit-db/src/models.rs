//! Database row types. These map directly to SQLite rows.
//! Distinct from rowdit-types models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub points: i64,
    pub creator_id: i64,
    pub created_at: String,
    pub updated_at: String,
}
