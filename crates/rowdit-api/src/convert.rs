use chrono::{DateTime, Utc};
use tracing::warn;

use rowdit_db::models::{PostRow, UserRow};
use rowdit_db::parse_timestamp;
use rowdit_types::models::{Post, User};

pub fn user(row: UserRow) -> User {
    User {
        created_at: timestamp(&row.created_at, "user", row.id),
        updated_at: timestamp(&row.updated_at, "user", row.id),
        id: row.id,
        username: row.username,
        email: row.email,
    }
}

pub fn post(row: PostRow) -> Post {
    Post {
        created_at: timestamp(&row.created_at, "post", row.id),
        updated_at: timestamp(&row.updated_at, "post", row.id),
        id: row.id,
        title: row.title,
        points: row.points,
        creator_id: row.creator_id,
    }
}

fn timestamp(raw: &str, entity: &str, id: i64) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}' on {} {}: {}", raw, entity, id, e);
        DateTime::default()
    })
}
