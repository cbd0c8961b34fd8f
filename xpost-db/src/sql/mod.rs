use log::trace;
use sqlx::{
    query,
    sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqliteRow},
    ConnectOptions, Error as SqlError, Row,
};
use std::str::FromStr;

mod pins;
pub(crate) use self::pins::*;

pub async fn create_connection(path: &str) -> Result<SqliteConnection, SqlError> {
    SqliteConnectOptions::from_str(path)?
        .journal_mode(SqliteJournalMode::Wal)
        .create_if_missing(true)
        .connect()
        .await
}

pub async fn setup_db(connection: &mut SqliteConnection) -> Result<(), SqlError> {
    set_pragmas(connection).await?;
    create_tables(connection).await?;
    create_indices(connection).await?;

    Ok(())
}

pub async fn check_db_integrity(connection: &mut SqliteConnection) -> Result<bool, SqlError> {
    let res: String = query("PRAGMA integrity_check")
        .map(|row: SqliteRow| -> String { row.get(0) })
        .fetch_one(connection)
        .await?;

    trace!("integrity check: {}", res);

    Ok(res == "ok")
}

async fn set_pragmas(connection: &mut SqliteConnection) -> Result<(), SqlError> {
    query("PRAGMA synchronous = NORMAL")
        .execute(&mut *connection)
        .await?;
    query("PRAGMA page_size = 4096")
        .execute(&mut *connection)
        .await?;
    Ok(())
}

async fn create_tables(connection: &mut SqliteConnection) -> Result<(), SqlError> {
    create_pins_tables(connection).await?;

    Ok(())
}

async fn create_indices(connection: &mut SqliteConnection) -> Result<(), SqlError> {
    create_pins_indices(connection).await?;

    Ok(())
}
