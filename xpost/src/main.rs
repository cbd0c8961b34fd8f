use clap::{Parser, Subcommand};
use log::{debug, info};
use std::{fs, io, path::PathBuf};
use thiserror::Error as ThisError;
use xpost_compose::ComposeSession;
use xpost_db::{PinStorage, SqlitePinStore};
use xpost_msg::{Network, SearchResult};
use xpost_ref::EncodingError;
use xpost_search::{HttpTransport, SearchError, SearchSession};

mod config;
use config::{Config, ConfigError};

#[derive(Parser)]
#[command(name = "xpost")]
#[command(about = "Cross-network mention tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file, defaults to ~/.xpost/config.toml
    #[arg(short, long, global = true, env = "XPOST_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a hex identifier as a bech32 share token
    Encode {
        hex: String,

        #[arg(short, long, default_value = "nevent")]
        prefix: String,
    },

    /// Render a saved draft for one or both networks
    Render {
        /// Draft file, a serialized compose session
        draft: PathBuf,

        /// a or b; both when omitted
        #[arg(short, long)]
        network: Option<Network>,
    },

    /// Search profiles on both networks and the pin list
    Search {
        query: String,

        /// Networks to search, comma separated
        #[arg(short, long, value_delimiter = ',', default_values = ["a", "b"])]
        networks: Vec<Network>,
    },

    /// List saved pins
    Pins,
}

#[derive(Debug, ThisError)]
enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("Failed to read draft {path}, cause: {source}")]
    ReadDraft {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse draft, cause: {0}")]
    Draft(#[from] serde_json::Error),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Pins(#[from] xpost_db::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("Error: {}", error);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Command::Encode { hex, prefix } => {
            println!("{}", xpost_ref::encode(&prefix, &hex)?);
        }
        Command::Render { draft, network } => {
            let text = fs::read_to_string(&draft).map_err(|source| Error::ReadDraft {
                path: draft.clone(),
                source,
            })?;
            let session: ComposeSession = serde_json::from_str(&text)?;
            for (network, rendered) in render(&session, network) {
                println!("{}: {}", network, rendered);
            }
        }
        Command::Search { query, networks } => {
            let config = Config::load(cli.config.as_deref())?;
            debug!("searching {} with {:?}", config.search.base_url, networks);

            let session = SearchSession::new(
                HttpTransport::new(config.search.clone()),
                config.search,
            );
            let state = session.search(session.request(&query, &networks)).await?;

            for result in &state.results {
                println!("{}", describe(result));
            }
            if let Some(error) = &state.error {
                eprintln!("Some sources failed: {}", error);
            }
        }
        Command::Pins => {
            let config = Config::load(cli.config.as_deref())?;
            let store = SqlitePinStore::open(&config.database).await?;
            let pins = store.list_pins().await?;
            info!("{} pins in {}", pins.len(), config.database);

            for pin in pins {
                let linked = pin
                    .linked
                    .map(|linked| format!(" <-> {}:{}", linked.network, linked.identifier))
                    .unwrap_or_default();
                println!(
                    "{}\t{}:{}\t{}{}",
                    pin.id, pin.network, pin.identifier, pin.display_name, linked
                );
            }
        }
    }

    Ok(())
}

fn render(session: &ComposeSession, network: Option<Network>) -> Vec<(Network, String)> {
    let networks = match network {
        Some(network) => vec![network],
        None => vec![Network::NetworkA, Network::NetworkB],
    };
    networks
        .into_iter()
        .map(|network| (network, session.preview(network)))
        .collect()
}

fn describe(result: &SearchResult) -> String {
    let mut line = format!(
        "{}\t{}\t{}",
        result.network(),
        result.identifier(),
        result.display_name()
    );
    if result.pin().is_pinned {
        line.push_str("\tpinned");
    }
    if result.is_linked() {
        line.push_str("\tlinked");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_networks() {
        let cli = Cli::parse_from(["xpost", "search", "ali", "--networks", "b"]);
        match cli.command {
            Command::Search { query, networks } => {
                assert_eq!(query, "ali");
                assert_eq!(networks, vec![Network::NetworkB]);
            }
            _ => panic!("expected search"),
        }

        let cli = Cli::parse_from(["xpost", "search", "ali"]);
        match cli.command {
            Command::Search { networks, .. } => {
                assert_eq!(networks, vec![Network::NetworkA, Network::NetworkB])
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_render_both_networks() {
        let session: ComposeSession = serde_json::from_str(
            r#"{
                "content": "gm `@alice` and `@bob`",
                "dictionary": {
                    "entries": {
                        "alice": { "networkAHandle": "@alice", "scope": "networkAOnly" }
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            render(&session, None),
            vec![
                (Network::NetworkA, "gm @alice and @bob".to_string()),
                (Network::NetworkB, "gm @alice and @bob".to_string()),
            ]
        );
    }
}
