use std::future::Future;

use tokio_postgres::{Row, RowStream};


/// Helper macro to pass arguments to `query_raw` and similar calls.
///
/// Helps you with casting to `&dyn ToSql` and type inference. Note: use `[]` for
/// the macro invocation, e.g. `dbargs![]`.
macro_rules! dbargs {
    () => {
        [] as [&(dyn postgres_types::ToSql + Sync); 0]
    };
    ($($arg:expr),+ $(,)?) => {
        [$($arg as &(dyn postgres_types::ToSql + Sync)),+]
    };
}

pub(crate) use dbargs;


/// Awaits a row stream and collects all rows, mapped through `from_row`.
pub(crate) async fn collect_rows_mapped<F, T>(
    rows: impl Future<Output = Result<RowStream, tokio_postgres::Error>>,
    from_row: F,
) -> Result<Vec<T>, tokio_postgres::Error>
where
    F: FnMut(Row) -> T,
{
    use futures::TryStreamExt;

    rows.await?
        .map_ok(from_row)
        .try_collect()
        .await
}
