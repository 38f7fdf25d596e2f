use std::collections::HashMap;

use rowdit_types::api::VoteTransition;
use rowdit_types::models::VoteValue;
use rusqlite::{OptionalExtension, params, params_from_iter};
use tracing::debug;

use crate::{Database, DbError};

/// What a vote did to the post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub transition: VoteTransition,
    /// Change applied to the post's points.
    pub delta: i64,
    /// Points after the vote committed.
    pub points: i64,
    pub value: VoteValue,
}

/// Decide the transition and score delta for a vote given the prior state.
///
/// A flip removes the old contribution and adds the new one, so it moves the
/// score by twice the vote value. Re-casting the same value changes nothing.
pub fn plan_vote(prior: Option<VoteValue>, desired: VoteValue) -> (VoteTransition, i64) {
    match prior {
        None => (VoteTransition::Cast, desired.as_i64()),
        Some(prev) if prev == desired => (VoteTransition::Unchanged, 0),
        Some(_) => (VoteTransition::Flipped, 2 * desired.as_i64()),
    }
}

impl Database {
    /// Record `user_id`'s vote on `post_id` and adjust the post's points.
    ///
    /// The prior-vote lookup, the vote write and the points update share one
    /// IMMEDIATE transaction, so concurrent votes on the same pair serialize.
    pub fn cast_vote(
        &self,
        user_id: i64,
        post_id: i64,
        desired: VoteValue,
    ) -> Result<VoteOutcome, DbError> {
        self.run_atomic(|conn| {
            let points: i64 = conn
                .query_row("SELECT points FROM posts WHERE id = ?1", [post_id], |r| {
                    r.get(0)
                })
                .optional()?
                .ok_or(DbError::NotFound("post"))?;

            let prior = conn
                .query_row(
                    "SELECT value FROM votes WHERE user_id = ?1 AND post_id = ?2",
                    params![user_id, post_id],
                    |r| r.get::<_, i64>(0),
                )
                .optional()?
                .map(VoteValue::try_from)
                .transpose()
                .map_err(|e| DbError::Corrupt(e.to_string()))?;

            let (transition, delta) = plan_vote(prior, desired);

            match transition {
                VoteTransition::Unchanged => {
                    return Ok(VoteOutcome {
                        transition,
                        delta,
                        points,
                        value: desired,
                    });
                }
                VoteTransition::Cast => {
                    conn.execute(
                        "INSERT INTO votes (user_id, post_id, value) VALUES (?1, ?2, ?3)",
                        params![user_id, post_id, desired.as_i64()],
                    )?;
                }
                VoteTransition::Flipped => {
                    conn.execute(
                        "UPDATE votes SET value = ?1 WHERE user_id = ?2 AND post_id = ?3",
                        params![desired.as_i64(), user_id, post_id],
                    )?;
                }
            }

            let points: i64 = conn.query_row(
                "UPDATE posts SET points = points + ?1 WHERE id = ?2 RETURNING points",
                params![delta, post_id],
                |r| r.get(0),
            )?;

            debug!(user_id, post_id, delta, points, ?transition, "vote applied");

            Ok(VoteOutcome {
                transition,
                delta,
                points,
                value: desired,
            })
        })
    }

    /// Batch-fetch votes keyed by (user_id, post_id). Pairs without a vote are
    /// absent from the map.
    pub fn get_votes_by_keys(
        &self,
        keys: &[(i64, i64)],
    ) -> Result<HashMap<(i64, i64), VoteValue>, DbError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let tuples: Vec<String> = (0..keys.len())
                .map(|i| format!("(?{}, ?{})", 2 * i + 1, 2 * i + 2))
                .collect();
            let sql = format!(
                "SELECT user_id, post_id, value FROM votes
                 WHERE (user_id, post_id) IN (VALUES {})",
                tuples.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let flat = keys.iter().flat_map(|(u, p)| [*u, *p]);
            let rows = stmt
                .query_map(params_from_iter(flat), |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(user_id, post_id, value)| {
                    VoteValue::try_from(value)
                        .map(|v| ((user_id, post_id), v))
                        .map_err(|e| DbError::Corrupt(e.to_string()))
                })
                .collect()
        })
    }

    pub fn count_votes(&self, post_id: i64) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM votes WHERE post_id = ?1",
                [post_id],
                |r| r.get(0),
            )?)
        })
    }
}
