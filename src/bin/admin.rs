//! Command-line companion to the animaldex TUI for administrators.
//!
//! Shares the TUI's config file and saved session, so logging in here also
//! logs the TUI in.
//!
//! ## Usage
//!
//! ```bash
//! animaldex-admin login <name> <password>
//! animaldex-admin users [query]
//! animaldex-admin export-users players.csv
//! animaldex-admin create-entry --common Guineu --scientific "Genetta genetta" --category Mamífers
//! ```

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::info;

use animaldex::admin::{search_users, totals, NewCatalogEntry, UserLevel};
use animaldex::api::ApiClient;
use animaldex::config::Config;
use animaldex::export::{self, ExportFormat};
use animaldex::logging;
use animaldex::session::{Session, SessionStore};

enum Command {
    Login { name: String, password: String },
    Logout,
    Whoami,
    Users { query: String },
    ExportUsers { path: PathBuf },
    CreateEntry(Box<NewCatalogEntry>),
}

struct Args {
    config_path: Option<PathBuf>,
    command: Command,
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!("Run 'animaldex-admin --help' for usage.");
    std::process::exit(1);
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path = None;
    let mut rest = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("animaldex-admin {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                match args.get(i + 1) {
                    Some(path) => config_path = Some(PathBuf::from(path)),
                    None => usage_error("--config requires a path argument"),
                }
                i += 1;
            }
            _ => rest.push(args[i].clone()),
        }
        i += 1;
    }

    let Some((name, params)) = rest.split_first() else {
        print_help();
        std::process::exit(1);
    };

    let command = match name.as_str() {
        "login" => match params {
            [name, password] => Command::Login {
                name: name.clone(),
                password: password.clone(),
            },
            _ => usage_error("login takes <name> <password>"),
        },
        "logout" => Command::Logout,
        "whoami" => Command::Whoami,
        "users" => Command::Users {
            query: params.join(" "),
        },
        "export-users" => match params {
            [path] => Command::ExportUsers {
                path: PathBuf::from(path),
            },
            _ => usage_error("export-users takes <path>"),
        },
        "create-entry" => Command::CreateEntry(Box::new(parse_entry(params))),
        other => usage_error(&format!("unknown command '{}'", other)),
    };

    Args { config_path, command }
}

fn parse_entry(params: &[String]) -> NewCatalogEntry {
    let mut entry = NewCatalogEntry::default();

    let mut i = 0;
    while i < params.len() {
        let flag = params[i].as_str();
        let Some(value) = params.get(i + 1) else {
            usage_error(&format!("{} requires a value", flag));
        };
        match flag {
            "--common" => entry.common_name = value.clone(),
            "--scientific" => entry.scientific_name = value.clone(),
            "--category" => entry.category = value.clone(),
            "--description" => entry.short_description = value.clone(),
            "--location" => entry.location_description = value.clone(),
            "--visibility" => entry.visibility_probability = value.clone(),
            "--months" => entry.set_months(value),
            "--map" => entry.map_url = value.clone(),
            "--lock-file" => entry.photo_lock_file_name = value.clone(),
            "--locked-image" => entry.locked_image = Some(PathBuf::from(value)),
            "--unlocked-image" => entry.unlocked_image = Some(PathBuf::from(value)),
            _ => usage_error(&format!("unknown create-entry option '{}'", flag)),
        }
        i += 2;
    }

    entry
}

fn print_help() {
    println!(
        r#"animaldex-admin - administer the animal dex from the command line

USAGE:
    animaldex-admin [OPTIONS] <COMMAND>

COMMANDS:
    login <name> <password>   Log in and save the session
    logout                    Forget the saved session
    whoami                    Show the saved session
    users [query]             List players, optionally filtered by name or email
    export-users <path>       Write all players to a .csv or .json file
    create-entry [FLAGS]      Add an animal to the catalog

CREATE-ENTRY FLAGS:
    --common NAME             Common name (required)
    --scientific NAME         Scientific name (required)
    --category NAME           Category (required)
    --description TEXT        Short description
    --location TEXT           Where to find it
    --visibility TEXT         Visibility probability (default: Mitjana)
    --months "A, B"           Comma-separated sighting months
    --map URL                 Map URL
    --lock-file NAME          Photo lock file name
    --locked-image PATH       Image shown while locked
    --unlocked-image PATH     Image shown once unlocked

OPTIONS:
    --config, -c PATH         Path to config file
    --version, -V             Show version
    --help, -h                Show this help message

ENVIRONMENT:
    ANIMALDEX_CONFIG          Path to config file
    ANIMALDEX_API_URL         Backend base URL
    ANIMALDEX_LOG             Log level (trace, debug, info, warn, error)"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    logging::init_stderr();

    let config = match args.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let mut store = SessionStore::open(&config.session.path);
    let client = ApiClient::new(&config.api)?.with_session(store.current());

    match args.command {
        Command::Login { name, password } => {
            let auth = client
                .login(&name, &password)
                .await
                .context("login failed")?;
            let session = store.establish(Session::from_auth(auth, None))?;
            println!("Logged in as {} ({})", session.name, session.role);
            if !session.is_admin() {
                println!("Note: this account is not an admin; admin commands will be refused.");
            }
        }
        Command::Logout => {
            store.clear()?;
            println!("Logged out");
        }
        Command::Whoami => match store.current() {
            Some(session) => println!("{} ({})", session.name, session.role),
            None => println!("Not logged in"),
        },
        Command::Users { query } => {
            require_admin(&store)?;
            let users = client.list_users().await.context("fetching players")?;
            let matching = search_users(&users, &query);

            println!(
                "{:<24} {:<32} {:>8} {:>7}  {}",
                "NAME", "EMAIL", "UNLOCKED", "PHOTOS", "LEVEL"
            );
            for user in &matching {
                println!(
                    "{:<24} {:<32} {:>8} {:>7}  {}",
                    user.name,
                    user.email.as_deref().unwrap_or("-"),
                    user.unlocked_animals,
                    user.uploaded_photos,
                    UserLevel::of(user)
                );
            }

            let sums = totals(&users);
            println!();
            println!(
                "{} of {} players shown; {} unlocks and {} photos in total",
                matching.len(),
                sums.users,
                sums.unlocked_animals,
                sums.uploaded_photos
            );
        }
        Command::ExportUsers { path } => {
            require_admin(&store)?;
            let users = client.list_users().await.context("fetching players")?;
            let format = ExportFormat::from_path(&path);
            let count = export::export_users(&users, &path, format)?;
            println!("Exported {} players to {} ({})", count, path.display(), format.name());
        }
        Command::CreateEntry(entry) => {
            require_admin(&store)?;
            client
                .create_entry(&entry)
                .await
                .with_context(|| format!("creating {}", entry.common_name))?;
            info!(name = %entry.common_name, "Catalog entry created");
            println!("Added {} to the catalog", entry.common_name);
        }
    }

    Ok(())
}

fn require_admin(store: &SessionStore) -> Result<()> {
    match store.current() {
        None => bail!("not logged in; run 'animaldex-admin login <name> <password>' first"),
        Some(session) if !session.is_admin() => {
            bail!("{} is not an admin", session.name)
        }
        Some(_) => Ok(()),
    }
}
