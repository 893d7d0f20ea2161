//! Implementation of the `butler dashboard` command.

use anyhow::Result;

pub async fn execute(host: &str, port: u16, database_dir: &str) -> Result<()> {
    crate::dashboard::serve(host, port, database_dir).await
}
