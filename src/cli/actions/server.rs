use crate::{
    accounts::{Accounts, Hasher, NewUser, PasswordPolicy},
    api::{self, session::SessionStore},
    cli::commands::store::Options as StoreOptions,
    store::{CredentialStore, JsonFileStore, MemoryStore},
};
use anyhow::{Context, Result};
use argon2::Params;
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

pub const DEMO_USERNAME: &str = "testuser";
const DEMO_PASSWORD: &str = "pass123";

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub store: StoreOptions,
    pub session_ttl_seconds: u64,
    pub cookie_secure: bool,
    pub min_password_length: usize,
    pub demo_account: bool,
}

fn open_store(options: &StoreOptions) -> Arc<dyn CredentialStore> {
    match options {
        StoreOptions::File(path) => Arc::new(JsonFileStore::new(path.clone())),
        StoreOptions::Memory => {
            warn!("Using in-memory credential store, accounts are lost on restart");
            Arc::new(MemoryStore::new())
        }
    }
}

fn demo_user() -> NewUser {
    NewUser {
        username: DEMO_USERNAME.to_string(),
        password: SecretString::from(DEMO_PASSWORD),
        email: "test@example.com".to_string(),
        full_name: "Test User".to_string(),
    }
}

/// Build the account service and session table described by `args`.
///
/// # Errors
/// Returns an error if the hasher cannot be built, the store is unreadable or
/// the demo account cannot be written.
pub async fn prepare(args: &Args) -> Result<(Arc<Accounts>, Arc<SessionStore>)> {
    let store = open_store(&args.store);
    let hasher = Hasher::new(Params::default()).context("Failed to initialize password hasher")?;
    let accounts = Arc::new(Accounts::new(
        store,
        hasher,
        PasswordPolicy {
            min_length: args.min_password_length,
        },
    ));

    let users = accounts
        .ping()
        .await
        .with_context(|| format!("Failed to read credential store {}", accounts.describe()))?;
    info!("Credential store {} holds {users} users", accounts.describe());

    if args.demo_account {
        let created = accounts
            .ensure_user(demo_user())
            .await
            .context("Failed to create demo account")?;
        if created {
            info!("Demo account {DEMO_USERNAME} created");
        }
    }

    let ttl = (args.session_ttl_seconds > 0).then(|| Duration::from_secs(args.session_ttl_seconds));
    let sessions = Arc::new(SessionStore::new(ttl, args.cookie_secure));

    Ok((accounts, sessions))
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store cannot be opened or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let (accounts, sessions) = prepare(&args).await?;

    api::new(args.port, accounts, sessions).await
}
