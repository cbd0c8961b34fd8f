use async_trait::async_trait;
use log::{debug, trace};
use serde_derive::{Deserialize, Serialize};
use sqlx::{Connection, SqliteConnection};
use std::{convert::TryFrom, str::FromStr};
use thiserror::Error as ThisError;
use tokio::sync::Mutex;
use xpost_msg::{Network, SearchResult, UnknownNetwork};

mod sql;
use sql::*;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Sql error, cause: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("Not a pin id: {0}")]
    BadPinId(String),
    #[error("No pin with id {0}")]
    UnknownPin(String),
    #[error("Stored pin has an unknown network, cause: {0}")]
    Network(#[from] UnknownNetwork),
    #[error("Sql database failed integrity check")]
    SqlIntegrityCheckFailure {},
}

/// The profile on the other network a pin is linked to.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counterpart {
    pub network: Network,
    pub identifier: String,
    pub display_name: Option<String>,
}

impl From<&SearchResult> for Counterpart {
    fn from(profile: &SearchResult) -> Self {
        Self {
            network: profile.network(),
            identifier: profile.identifier().to_string(),
            display_name: Some(profile.display_name()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    pub id: String,
    pub network: Network,
    pub identifier: String,
    pub display_name: String,
    pub linked: Option<Counterpart>,
}

impl Pin {
    /// Whether this pin's link points at `other`.
    pub fn links_to(&self, other: &Pin) -> bool {
        self.linked
            .as_ref()
            .map(|linked| linked.network == other.network && linked.identifier == other.identifier)
            .unwrap_or(false)
    }
}

impl TryFrom<PinRow> for Pin {
    type Error = Error;

    fn try_from(row: PinRow) -> Result<Self, Self::Error> {
        let linked = match (row.linked_network, row.linked_identifier) {
            (Some(network), Some(identifier)) => Some(Counterpart {
                network: Network::from_str(&network)?,
                identifier,
                display_name: row.linked_display_name,
            }),
            _ => None,
        };

        Ok(Pin {
            id: row.id.to_string(),
            network: Network::from_str(&row.network)?,
            identifier: row.identifier,
            display_name: row.display_name,
            linked,
        })
    }
}

/// Fields of a pin that can be changed after it is created.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinFields {
    pub display_name: Option<String>,
}

/// The saved-profile service. Linking is bidirectional: the counterpart
/// gets a pin of its own that links back.
#[async_trait]
pub trait PinStorage: Send + Sync {
    /// Pins a profile, or returns the existing pin for it.
    async fn create_pin(&self, profile: &SearchResult) -> Result<Pin, Error>;

    async fn update_pin(&self, id: &str, fields: PinFields) -> Result<Pin, Error>;

    async fn delete_pin(&self, id: &str) -> Result<(), Error>;

    async fn link_profile(&self, pin_id: &str, counterpart: &Counterpart) -> Result<Pin, Error>;

    async fn unlink_profile(&self, pin_id: &str) -> Result<Pin, Error>;

    async fn get_pin(&self, id: &str) -> Result<Option<Pin>, Error>;

    async fn list_pins(&self) -> Result<Vec<Pin>, Error>;
}

pub struct SqlitePinStore {
    sql: Mutex<SqliteConnection>,
}

impl SqlitePinStore {
    pub async fn open(path: &str) -> Result<Self, Error> {
        let mut sql = create_connection(path).await?;
        setup_db(&mut sql).await?;

        Ok(Self {
            sql: Mutex::new(sql),
        })
    }

    pub async fn check_integrity(&self) -> Result<(), Error> {
        let mut sql = self.sql.lock().await;
        if check_db_integrity(&mut sql).await? {
            Ok(())
        } else {
            Err(Error::SqlIntegrityCheckFailure {})
        }
    }
}

fn parse_pin_id(id: &str) -> Result<i64, Error> {
    id.parse().map_err(|_| Error::BadPinId(id.to_string()))
}

async fn load_pin(sql: &mut SqliteConnection, id: i64) -> Result<Pin, Error> {
    match select_pin(sql, id).await? {
        Some(row) => Pin::try_from(row),
        None => Err(Error::UnknownPin(id.to_string())),
    }
}

// Clears the link on `pin`'s counterpart if it still points back at `pin`.
async fn clear_backlink(sql: &mut SqliteConnection, pin: &Pin) -> Result<(), Error> {
    let linked = match &pin.linked {
        Some(linked) => linked,
        None => return Ok(()),
    };
    let counterpart_id = match find_pin_id(sql, linked.network.as_str(), &linked.identifier).await? {
        Some(counterpart_id) => counterpart_id,
        None => return Ok(()),
    };

    let counterpart = load_pin(sql, counterpart_id).await?;
    if counterpart.links_to(pin) {
        trace!("clearing backlink on pin {}", counterpart.id);
        clear_pin_link(sql, counterpart_id).await?;
    }
    Ok(())
}

#[async_trait]
impl PinStorage for SqlitePinStore {
    async fn create_pin(&self, profile: &SearchResult) -> Result<Pin, Error> {
        let mut sql = self.sql.lock().await;
        let id = find_or_create_pin(
            &mut sql,
            profile.network().as_str(),
            profile.identifier(),
            &profile.display_name(),
        )
        .await?;

        trace!("pinned {} as {}", profile.identity_key(), id);

        load_pin(&mut sql, id).await
    }

    async fn update_pin(&self, id: &str, fields: PinFields) -> Result<Pin, Error> {
        let pin_id = parse_pin_id(id)?;
        let mut sql = self.sql.lock().await;

        let mut pin = load_pin(&mut sql, pin_id).await?;
        if let Some(display_name) = fields.display_name {
            update_pin_display_name(&mut sql, pin_id, &display_name).await?;
            pin.display_name = display_name;
        }

        Ok(pin)
    }

    async fn delete_pin(&self, id: &str) -> Result<(), Error> {
        let pin_id = parse_pin_id(id)?;
        let mut sql = self.sql.lock().await;

        if delete_pin(&mut sql, pin_id).await? == 0 {
            return Err(Error::UnknownPin(id.to_string()));
        }
        Ok(())
    }

    async fn link_profile(&self, pin_id: &str, counterpart: &Counterpart) -> Result<Pin, Error> {
        let id = parse_pin_id(pin_id)?;
        let mut sql = self.sql.lock().await;
        let source = load_pin(&mut sql, id).await?;

        let mut tx = sql.begin().await?;
        clear_backlink(&mut tx, &source).await?;
        let counterpart_id = find_or_create_pin(
            &mut tx,
            counterpart.network.as_str(),
            &counterpart.identifier,
            counterpart
                .display_name
                .as_deref()
                .unwrap_or(&counterpart.identifier),
        )
        .await?;
        let previous = load_pin(&mut tx, counterpart_id).await?;
        if !previous.links_to(&source) {
            clear_backlink(&mut tx, &previous).await?;
        }

        set_pin_link(
            &mut tx,
            id,
            counterpart.network.as_str(),
            &counterpart.identifier,
            counterpart.display_name.as_deref(),
        )
        .await?;
        set_pin_link(
            &mut tx,
            counterpart_id,
            source.network.as_str(),
            &source.identifier,
            Some(&source.display_name),
        )
        .await?;
        tx.commit().await?;

        debug!(
            "linked pin {} to {}:{}",
            pin_id, counterpart.network, counterpart.identifier
        );

        load_pin(&mut sql, id).await
    }

    async fn unlink_profile(&self, pin_id: &str) -> Result<Pin, Error> {
        let id = parse_pin_id(pin_id)?;
        let mut sql = self.sql.lock().await;
        let source = load_pin(&mut sql, id).await?;

        let mut tx = sql.begin().await?;
        clear_backlink(&mut tx, &source).await?;
        clear_pin_link(&mut tx, id).await?;
        tx.commit().await?;

        debug!("unlinked pin {}", pin_id);

        load_pin(&mut sql, id).await
    }

    async fn get_pin(&self, id: &str) -> Result<Option<Pin>, Error> {
        let pin_id = parse_pin_id(id)?;
        let mut sql = self.sql.lock().await;

        select_pin(&mut sql, pin_id)
            .await?
            .map(Pin::try_from)
            .transpose()
    }

    async fn list_pins(&self) -> Result<Vec<Pin>, Error> {
        let mut sql = self.sql.lock().await;

        select_all_pins(&mut sql)
            .await?
            .into_iter()
            .map(Pin::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xpost_msg::{NetworkAProfile, NetworkBProfile, PinStatus};

    const PUBKEY: &str = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";

    async fn store() -> SqlitePinStore {
        SqlitePinStore::open("sqlite::memory:").await.unwrap()
    }

    fn alice() -> SearchResult {
        SearchResult::NetworkA(NetworkAProfile {
            id: "12".to_string(),
            username: "alice".to_string(),
            name: Some("Alice".to_string()),
            profile_image_url: None,
            pin: PinStatus::default(),
            cross_platform_mapping: None,
        })
    }

    fn bob() -> SearchResult {
        SearchResult::NetworkA(NetworkAProfile {
            id: "13".to_string(),
            username: "bob".to_string(),
            name: None,
            profile_image_url: None,
            pin: PinStatus::default(),
            cross_platform_mapping: None,
        })
    }

    fn alice_w() -> SearchResult {
        SearchResult::NetworkB(NetworkBProfile {
            pubkey: PUBKEY.to_string(),
            npub: None,
            display_name: Some("Alice W.".to_string()),
            name: None,
            nip05: None,
            picture: None,
            pin: PinStatus::default(),
            cross_platform_mapping: None,
        })
    }

    #[tokio::test]
    async fn test_create_pin_is_idempotent() {
        let store = store().await;
        let first = store.create_pin(&alice()).await.unwrap();
        let second = store.create_pin(&alice()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.network, Network::NetworkA);
        assert_eq!(first.display_name, "alice");
        assert_eq!(store.list_pins().await.unwrap().len(), 1);
        store.check_integrity().await.unwrap();
    }

    #[tokio::test]
    async fn test_update_and_delete_pin() {
        let store = store().await;
        let pin = store.create_pin(&alice()).await.unwrap();

        let updated = store
            .update_pin(
                &pin.id,
                PinFields {
                    display_name: Some("Alice Liddell".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.display_name, "Alice Liddell");
        assert_eq!(store.get_pin(&pin.id).await.unwrap(), Some(updated));

        store.delete_pin(&pin.id).await.unwrap();
        assert_eq!(store.get_pin(&pin.id).await.unwrap(), None);
        assert!(matches!(
            store.delete_pin(&pin.id).await,
            Err(Error::UnknownPin(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_pin_id() {
        let store = store().await;
        assert!(matches!(
            store.get_pin("not-a-number").await,
            Err(Error::BadPinId(_))
        ));
        assert!(matches!(
            store.unlink_profile("99").await,
            Err(Error::UnknownPin(_))
        ));
    }

    #[tokio::test]
    async fn test_link_profile_is_bidirectional() {
        let store = store().await;
        let pin = store.create_pin(&alice()).await.unwrap();

        let linked = store
            .link_profile(&pin.id, &Counterpart::from(&alice_w()))
            .await
            .unwrap();
        assert_eq!(
            linked.linked,
            Some(Counterpart {
                network: Network::NetworkB,
                identifier: PUBKEY.to_string(),
                display_name: Some("Alice W.".to_string()),
            })
        );

        let pins = store.list_pins().await.unwrap();
        assert_eq!(pins.len(), 2);
        let back = &pins[1];
        assert_eq!(back.network, Network::NetworkB);
        assert_eq!(back.display_name, "Alice W.");
        assert_eq!(
            back.linked.as_ref().map(|linked| linked.identifier.as_str()),
            Some("alice")
        );
    }

    #[tokio::test]
    async fn test_unlink_profile_clears_both_sides() {
        let store = store().await;
        let pin = store.create_pin(&alice()).await.unwrap();
        store
            .link_profile(&pin.id, &Counterpart::from(&alice_w()))
            .await
            .unwrap();

        let unlinked = store.unlink_profile(&pin.id).await.unwrap();
        assert_eq!(unlinked.linked, None);
        for pin in store.list_pins().await.unwrap() {
            assert_eq!(pin.linked, None);
        }
    }

    #[tokio::test]
    async fn test_relinking_clears_previous_counterparts() {
        let store = store().await;
        let alice = store.create_pin(&alice()).await.unwrap();
        let bob = store.create_pin(&bob()).await.unwrap();
        let first = Counterpart {
            network: Network::NetworkB,
            identifier: "aa".to_string(),
            display_name: None,
        };
        let second = Counterpart {
            network: Network::NetworkB,
            identifier: "bb".to_string(),
            display_name: None,
        };

        store.link_profile(&alice.id, &first).await.unwrap();
        store.link_profile(&bob.id, &second).await.unwrap();
        store.link_profile(&alice.id, &second).await.unwrap();

        let pins = store.list_pins().await.unwrap();
        let linked_to = |identifier: &str| {
            pins.iter()
                .find(|pin| pin.identifier == identifier)
                .and_then(|pin| pin.linked.as_ref())
                .map(|linked| linked.identifier.clone())
        };
        assert_eq!(linked_to("aa"), None);
        assert_eq!(linked_to("bob"), None);
        assert_eq!(linked_to("bb"), Some("alice".to_string()));
        assert_eq!(linked_to("alice"), Some("bb".to_string()));

        store.unlink_profile(&alice.id).await.unwrap();
        for pin in store.list_pins().await.unwrap() {
            assert_eq!(pin.linked, None);
        }
    }
}
