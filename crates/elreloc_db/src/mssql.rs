//! SQL Server backend (tiberius).
//!
//! DSNs use the JDBC property form without the `jdbc:` prefix, e.g.
//! `sqlserver://localhost:1433;databaseName=seg_it_test;user=sa;password=...;trustServerCertificate=true`.

use crate::error::{DbError, Result};
use crate::schema::join_storage_path;
use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::info;

pub(crate) struct MssqlStore {
    client: Mutex<Client<Compat<TcpStream>>>,
}

impl MssqlStore {
    pub(crate) async fn connect(dsn: &str) -> Result<Self> {
        let jdbc = match dsn.split_once("://") {
            Some((_, rest)) => format!("jdbc:sqlserver://{}", rest),
            None => return Err(DbError::unsupported_dsn(dsn, "expected sqlserver://host:port;...")),
        };
        let config = Config::from_jdbc_string(&jdbc)?;

        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        let client = Client::connect(config, tcp.compat_write()).await?;

        info!(dsn = %crate::dsn::redact_dsn(dsn), "Connected to SQL Server record store");

        Ok(Self {
            client: Mutex::new(client),
        })
    }

    pub(crate) async fn query_paths(
        &self,
        sql: &str,
        serial: &str,
        with_filename: bool,
    ) -> Result<Vec<String>> {
        let mut client = self.client.lock().await;
        let rows = client.query(sql, &[&serial]).await?.into_first_result().await?;

        let mut paths = Vec::with_capacity(rows.len());
        for row in rows {
            let dir: Option<&str> = row.try_get(0)?;
            let Some(dir) = dir else { continue };
            let name: Option<&str> = if with_filename { row.try_get(1)? } else { None };
            paths.push(join_storage_path(dir, name));
        }
        Ok(paths)
    }
}
