use postgres_types::{BorrowToSql, ToSql};
use tokio_postgres::{IsolationLevel, Row, RowStream};

use crate::prelude::*;

use super::{Db, util::collect_rows_mapped};


/// A database transaction. Wraps the underlying connection's transaction so
/// that every query automatically goes through the statement cache. This
/// means every query additionally incurs an `RwLock` read lock and a hashmap
/// lookup, but that's a lot cheaper than preparing the statement each time.
pub struct Transaction<'a> {
    inner: deadpool_postgres::Transaction<'a>,
}

impl<'a> Transaction<'a> {
    /// Starts a transaction with the default isolation level.
    pub(crate) async fn begin(db: &'a mut Db) -> Result<Transaction<'a>, tokio_postgres::Error> {
        Ok(Self { inner: db.transaction().await? })
    }

    /// Starts a serializable transaction. Used by check-then-write paths
    /// that must not race concurrent writers, like subgroup edge insertion
    /// and schema setup.
    pub(crate) async fn begin_serializable(
        db: &'a mut Db,
    ) -> Result<Transaction<'a>, tokio_postgres::Error> {
        let inner = db.build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .start()
            .await?;
        Ok(Self { inner })
    }

    pub async fn commit(self) -> Result<(), tokio_postgres::Error> {
        self.inner.commit().await
    }

    #[allow(dead_code)]
    pub async fn rollback(self) -> Result<(), tokio_postgres::Error> {
        self.inner.rollback().await
    }

    pub async fn query_one(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row, tokio_postgres::Error> {
        trace!("Executing SQL query: \"{}\" with {:?}", query, params);
        let statement = self.inner.prepare_cached(query).await?;
        self.inner.query_one(&statement, params).await
    }

    pub async fn query_opt(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, tokio_postgres::Error> {
        trace!("Executing SQL query: \"{}\" with {:?}", query, params);
        let statement = self.inner.prepare_cached(query).await?;
        self.inner.query_opt(&statement, params).await
    }

    pub async fn query_raw<P, I>(
        &self,
        query: &str,
        params: I,
    ) -> Result<RowStream, tokio_postgres::Error>
    where
        P: BorrowToSql,
        I: IntoIterator<Item = P> + std::fmt::Debug,
        I::IntoIter: ExactSizeIterator,
    {
        trace!("Executing SQL query: \"{}\" with {:?}", query, params);
        let statement = self.inner.prepare_cached(query).await?;
        self.inner.query_raw(&statement, params).await
    }

    /// Convenience method to query many rows and convert each row to a
    /// specific type with `from_row`.
    pub async fn query_mapped<P, I, F, T>(
        &self,
        query: &str,
        params: I,
        from_row: F,
    ) -> Result<Vec<T>, tokio_postgres::Error>
    where
        P: BorrowToSql,
        I: IntoIterator<Item = P> + std::fmt::Debug,
        I::IntoIter: ExactSizeIterator,
        F: FnMut(Row) -> T,
    {
        collect_rows_mapped(self.query_raw(query, params), from_row).await
    }

    pub async fn execute(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, tokio_postgres::Error> {
        trace!("Executing SQL query: \"{}\" with {:?}", query, params);
        let statement = self.inner.prepare_cached(query).await?;
        self.inner.execute(&statement, params).await
    }

    /// Executes a sequence of statements separated by semicolons. Bypasses
    /// the statement cache; only used for the schema script.
    pub(crate) async fn batch_execute(&self, query: &str) -> Result<(), tokio_postgres::Error> {
        self.inner.batch_execute(query).await
    }
}
