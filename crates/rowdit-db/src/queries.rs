use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::error::unique_violation;
use crate::models::{PostRow, UserRow};
use crate::{Database, DbError};

const USER_COLUMNS: &str = "id, username, email, password, created_at, updated_at";
const POST_COLUMNS: &str = "id, title, points, creator_id, created_at, updated_at";

impl Database {
    // -- Users --

    /// Insert a user. Duplicate usernames or emails surface as
    /// `DbError::Conflict` naming the field.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<UserRow, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password) VALUES (?1, ?2, ?3)",
                (username, email, password_hash),
            )
            .map_err(|e| match unique_violation(&e) {
                Some(field) => DbError::Conflict(field),
                None => DbError::from(e),
            })?;

            let id = conn.last_insert_rowid();
            query_user(conn, "id", &id)?.ok_or(DbError::NotFound("user"))
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>, DbError> {
        self.with_conn(|conn| query_user(conn, "id", &id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, DbError> {
        self.with_conn(|conn| query_user(conn, "username", &username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>, DbError> {
        self.with_conn(|conn| query_user(conn, "email", &email))
    }

    /// Batch-fetch users by id. Ids with no row are simply absent from the map.
    pub fn get_users_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, UserRow>, DbError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id IN ({})",
                placeholders(ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(ids), user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows.into_iter().map(|u| (u.id, u)).collect())
        })
    }

    /// Returns false when the user no longer exists.
    pub fn update_password(&self, user_id: i64, password_hash: &str) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET password = ?1, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                 WHERE id = ?2",
                params![password_hash, user_id],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Posts --

    pub fn create_post(&self, creator_id: i64, title: &str) -> Result<PostRow, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (title, creator_id) VALUES (?1, ?2)",
                params![title, creator_id],
            )?;
            let id = conn.last_insert_rowid();
            query_post(conn, id)?.ok_or(DbError::NotFound("post"))
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>, DbError> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Newest first, ties by id. The cursor is the `created_at` of the last
    /// row seen, plus its id when known so rows sharing that timestamp are
    /// not skipped.
    pub fn list_posts(
        &self,
        limit: u32,
        before: Option<&str>,
        before_id: Option<i64>,
    ) -> Result<Vec<PostRow>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts
                 WHERE ?1 IS NULL
                    OR created_at < ?1
                    OR (created_at = ?1 AND ?2 IS NOT NULL AND id < ?2)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt
                .query_map(params![before, before_id, limit], post_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

pub(crate) fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

fn query_user(
    conn: &Connection,
    column: &str,
    value: &dyn rusqlite::ToSql,
) -> Result<Option<UserRow>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"
    ))?;
    Ok(stmt.query_row([value], user_from_row).optional()?)
}

pub(crate) fn query_post(conn: &Connection, id: i64) -> Result<Option<PostRow>, DbError> {
    let mut stmt = conn.prepare(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"))?;
    Ok(stmt.query_row([id], post_from_row).optional()?)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        points: row.get(2)?,
        creator_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
