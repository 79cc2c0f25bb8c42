//! Postgres database client definitions.
//!
//! Clients acquire their [`Connection`] lazily, on the first statement.
//!
//! [`Connection`]: super::Connection

pub mod non_tx;
pub mod tx;

pub use self::{non_tx::NonTx, tx::Tx};

/// Implements [`Connection`] for a client by forwarding every statement to its
/// lazily acquired connection.
///
/// [`Connection`]: super::Connection
macro_rules! forward_connection {
    ($client:ty) => {
        impl $crate::infra::database::postgres::Connection for $client {
            async fn query<T>(
                &self,
                stmt: &T,
                params: &[&(dyn ::tokio_postgres::types::ToSql + Sync)],
            ) -> Result<
                Vec<::tokio_postgres::Row>,
                ::tracerr::Traced<$crate::infra::database::Error>,
            >
            where
                T: ::tokio_postgres::ToStatement + ?Sized,
            {
                self.connection()
                    .await
                    .map_err(::tracerr::wrap!())?
                    .query(stmt, params)
                    .await
                    .map_err(::tracerr::wrap!())
            }

            async fn query_opt<T>(
                &self,
                stmt: &T,
                params: &[&(dyn ::tokio_postgres::types::ToSql + Sync)],
            ) -> Result<
                Option<::tokio_postgres::Row>,
                ::tracerr::Traced<$crate::infra::database::Error>,
            >
            where
                T: ::tokio_postgres::ToStatement + ?Sized,
            {
                self.connection()
                    .await
                    .map_err(::tracerr::wrap!())?
                    .query_opt(stmt, params)
                    .await
                    .map_err(::tracerr::wrap!())
            }

            async fn exec<T>(
                &self,
                stmt: &T,
                params: &[&(dyn ::tokio_postgres::types::ToSql + Sync)],
            ) -> Result<u64, ::tracerr::Traced<$crate::infra::database::Error>>
            where
                T: ::tokio_postgres::ToStatement + ?Sized,
            {
                self.connection()
                    .await
                    .map_err(::tracerr::wrap!())?
                    .exec(stmt, params)
                    .await
                    .map_err(::tracerr::wrap!())
            }

            async fn batch_exec(
                &self,
                query: &str,
            ) -> Result<(), ::tracerr::Traced<$crate::infra::database::Error>>
            {
                self.connection()
                    .await
                    .map_err(::tracerr::wrap!())?
                    .batch_exec(query)
                    .await
                    .map_err(::tracerr::wrap!())
            }
        }
    };
}

pub(crate) use forward_connection;
