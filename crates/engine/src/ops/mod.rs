use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use sea_orm::{DatabaseConnection, TransactionTrait};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::{GroupLedger, ResultEngine};

mod balances;
mod expenses;
mod groups;
mod members;

pub use balances::MemberTotals;
pub use expenses::{AddExpenseCmd, UpdateExpenseCmd};
pub use groups::GroupSnapshot;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

type GroupLocks = Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    group_locks: GroupLocks,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Waits until no other mutation runs on `group_id`.
    ///
    /// The ledger itself is not synchronized: two writers loading the same
    /// group would overwrite each other's result.
    async fn lock_group(&self, group_id: Uuid) -> GroupGuard<'_> {
        let lock = {
            let mut locks = self
                .group_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(group_id).or_default())
        };
        GroupGuard {
            locks: &self.group_locks,
            group_id,
            _guard: lock.lock_owned().await,
        }
    }

    /// Runs one ledger mutation on a group: lock, load, `op`, save.
    async fn mutate_group<T, F>(&self, group_id: Uuid, op: F) -> ResultEngine<T>
    where
        F: FnOnce(&mut GroupLedger) -> ResultEngine<T>,
    {
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let (model, mut ledger) = self.load_group(&db_tx, group_id).await?;
            let value = op(&mut ledger)?;
            self.save_ledger(&db_tx, model, &ledger).await?;
            Ok(value)
        })
    }
}

/// Held for the duration of one group mutation.
///
/// The lock entry is dropped from the map once nobody else holds or waits on
/// it, so the map only tracks groups with work in flight.
struct GroupGuard<'a> {
    locks: &'a GroupLocks,
    group_id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for GroupGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one in our own guard.
        if locks
            .get(&self.group_id)
            .is_some_and(|lock| Arc::strong_count(lock) <= 2)
        {
            locks.remove(&self.group_id);
        }
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            group_locks: Mutex::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use migration::MigratorTrait;
    use sea_orm::Database;

    use super::*;

    async fn engine() -> Engine {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        Engine::builder().database(db).build().await.unwrap()
    }

    fn lock_entries(engine: &Engine) -> usize {
        engine.group_locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn group_locks_are_released() {
        let engine = engine().await;

        for _ in 0..10 {
            assert!(engine.add_member(Uuid::new_v4(), "alice").await.is_err());
        }
        let group = engine.new_group("Flat").await.unwrap();
        engine.add_member(group, "alice").await.unwrap();
        engine.delete_group(group).await.unwrap();

        assert_eq!(lock_entries(&engine), 0);
    }

    #[tokio::test]
    async fn waiting_writer_keeps_the_entry() {
        let engine = engine().await;
        let group = Uuid::new_v4();

        let first = engine.lock_group(group).await;
        let second = engine.lock_group(group);
        tokio::pin!(second);
        // Register the waiter without letting it acquire the lock.
        assert!(poll_once(second.as_mut()).await.is_none());
        drop(first);
        assert_eq!(lock_entries(&engine), 1);

        let second = second.await;
        assert_eq!(lock_entries(&engine), 1);
        drop(second);
        assert_eq!(lock_entries(&engine), 0);
    }

    async fn poll_once<F: std::future::Future + Unpin>(fut: F) -> Option<F::Output> {
        let mut fut = fut;
        std::future::poll_fn(|cx| match std::pin::Pin::new(&mut fut).poll(cx) {
            std::task::Poll::Ready(out) => std::task::Poll::Ready(Some(out)),
            std::task::Poll::Pending => std::task::Poll::Ready(None),
        })
        .await
    }
}
