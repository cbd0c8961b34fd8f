use log::trace;
use sqlx::{query, sqlite::SqliteRow, Error, Row, SqliteConnection};

/// A `pins` row as stored, before network names are parsed.
#[derive(Clone, Debug)]
pub struct PinRow {
    pub id: i64,
    pub network: String,
    pub identifier: String,
    pub display_name: String,
    pub linked_network: Option<String>,
    pub linked_identifier: Option<String>,
    pub linked_display_name: Option<String>,
}

const PIN_COLUMNS: &str = "
    id,
    network,
    identifier,
    display_name,
    linked_network,
    linked_identifier,
    linked_display_name
";

fn to_pin_row(row: SqliteRow) -> PinRow {
    PinRow {
        id: row.get(0),
        network: row.get(1),
        identifier: row.get(2),
        display_name: row.get(3),
        linked_network: row.get(4),
        linked_identifier: row.get(5),
        linked_display_name: row.get(6),
    }
}

pub async fn create_pins_tables(connection: &mut SqliteConnection) -> Result<(), Error> {
    trace!("Creating pins tables");

    query(
        "
        CREATE TABLE IF NOT EXISTS pins (
            id INTEGER PRIMARY KEY,
            network TEXT NOT NULL,
            identifier TEXT NOT NULL,
            display_name TEXT NOT NULL,
            linked_network TEXT,
            linked_identifier TEXT,
            linked_display_name TEXT,
            UNIQUE (network, identifier)
        )
        ",
    )
    .execute(connection)
    .await?;

    Ok(())
}

pub async fn create_pins_indices(connection: &mut SqliteConnection) -> Result<(), Error> {
    trace!("Creating pins index");

    query(
        "CREATE INDEX IF NOT EXISTS pins_linked_index on pins (linked_network, linked_identifier)",
    )
    .execute(connection)
    .await?;

    Ok(())
}

pub async fn find_or_create_pin(
    connection: &mut SqliteConnection,
    network: &str,
    identifier: &str,
    display_name: &str,
) -> Result<i64, Error> {
    if let Some(id) = find_pin_id(&mut *connection, network, identifier).await? {
        return Ok(id);
    }

    let result = query("INSERT INTO pins (network, identifier, display_name) VALUES (?, ?, ?)")
        .bind(network)
        .bind(identifier)
        .bind(display_name)
        .execute(connection)
        .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_pin_id(
    connection: &mut SqliteConnection,
    network: &str,
    identifier: &str,
) -> Result<Option<i64>, Error> {
    query("SELECT id FROM pins WHERE network = ? AND identifier = ?")
        .bind(network)
        .bind(identifier)
        .map(|row: SqliteRow| row.get::<i64, _>(0))
        .fetch_optional(connection)
        .await
}

pub async fn select_pin(connection: &mut SqliteConnection, id: i64) -> Result<Option<PinRow>, Error> {
    let sql = format!("SELECT {} FROM pins WHERE id = ?", PIN_COLUMNS);
    query(&sql)
        .bind(id)
        .map(to_pin_row)
        .fetch_optional(connection)
        .await
}

pub async fn select_all_pins(connection: &mut SqliteConnection) -> Result<Vec<PinRow>, Error> {
    let sql = format!("SELECT {} FROM pins ORDER BY id", PIN_COLUMNS);
    query(&sql)
        .map(to_pin_row)
        .fetch_all(connection)
        .await
}

pub async fn update_pin_display_name(
    connection: &mut SqliteConnection,
    id: i64,
    display_name: &str,
) -> Result<u64, Error> {
    let result = query("UPDATE pins SET display_name = ? WHERE id = ?")
        .bind(display_name)
        .bind(id)
        .execute(connection)
        .await?;

    Ok(result.rows_affected())
}

pub async fn delete_pin(connection: &mut SqliteConnection, id: i64) -> Result<u64, Error> {
    let result = query("DELETE FROM pins WHERE id = ?")
        .bind(id)
        .execute(connection)
        .await?;

    Ok(result.rows_affected())
}

pub async fn set_pin_link(
    connection: &mut SqliteConnection,
    id: i64,
    network: &str,
    identifier: &str,
    display_name: Option<&str>,
) -> Result<u64, Error> {
    let result = query(
        "
        UPDATE pins
        SET linked_network = ?, linked_identifier = ?, linked_display_name = ?
        WHERE id = ?
        ",
    )
    .bind(network)
    .bind(identifier)
    .bind(display_name)
    .bind(id)
    .execute(connection)
    .await?;

    Ok(result.rows_affected())
}

pub async fn clear_pin_link(connection: &mut SqliteConnection, id: i64) -> Result<u64, Error> {
    let result = query(
        "
        UPDATE pins
        SET linked_network = NULL, linked_identifier = NULL, linked_display_name = NULL
        WHERE id = ?
        ",
    )
    .bind(id)
    .execute(connection)
    .await?;

    Ok(result.rows_affected())
}
