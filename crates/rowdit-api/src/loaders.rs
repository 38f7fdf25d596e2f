use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use rowdit_db::{Database, DbError};
use rowdit_types::models::{PostId, User, UserId, VoteValue};

use crate::convert;
use crate::loader::{BatchFn, BatchLoader, LoadError};

pub type UserLoader = BatchLoader<UserId, User, UserBatch>;
pub type VoteLoader = BatchLoader<(UserId, PostId), VoteValue, VoteBatch>;

/// The loaders of one request. Build a fresh set per request.
#[derive(Clone)]
pub struct Loaders {
    pub users: UserLoader,
    /// Keyed by (voter, post).
    pub votes: VoteLoader,
}

impl Loaders {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            users: BatchLoader::new(UserBatch { db: Arc::clone(&db) }),
            votes: BatchLoader::new(VoteBatch { db }),
        }
    }
}

pub struct UserBatch {
    db: Arc<Database>,
}

impl BatchFn<UserId, User> for UserBatch {
    fn fetch(
        &self,
        keys: Vec<UserId>,
    ) -> impl Future<Output = Result<HashMap<UserId, User>, LoadError>> + Send {
        let db = Arc::clone(&self.db);
        async move {
            let rows = blocking(move || db.get_users_by_ids(&keys)).await?;
            Ok(rows
                .into_iter()
                .map(|(id, row)| (id, convert::user(row)))
                .collect())
        }
    }
}

pub struct VoteBatch {
    db: Arc<Database>,
}

impl BatchFn<(UserId, PostId), VoteValue> for VoteBatch {
    fn fetch(
        &self,
        keys: Vec<(UserId, PostId)>,
    ) -> impl Future<Output = Result<HashMap<(UserId, PostId), VoteValue>, LoadError>> + Send
    {
        let db = Arc::clone(&self.db);
        async move { blocking(move || db.get_votes_by_keys(&keys)).await }
    }
}

async fn blocking<F, T>(f: F) -> Result<T, LoadError>
where
    F: FnOnce() -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LoadError::Store(e.to_string()))?
        .map_err(|e| LoadError::Store(e.to_string()))
}
