//! Whoami command handler.

use anyhow::{Context, Result};

use crate::backend::{BackendClient, BackendConfig};
use crate::config::Config;

/// Prints the signed-in user, if any.
pub async fn run(config: &Config) -> Result<()> {
    let backend = BackendConfig::from_config(config)?;
    let client = BackendClient::new(backend)?;

    match client.current_user().await.context("reach backend")? {
        Some(user) => {
            if user.email.is_empty() {
                println!("{} (id {})", user.username, user.id);
            } else {
                println!("{} <{}> (id {})", user.username, user.email, user.id);
            }
        }
        None => println!("Not signed in."),
    }

    Ok(())
}
