//! Config command handlers.

use anyhow::Result;

use crate::config::{Config, paths};

pub fn path() -> Result<()> {
    println!("{}", paths::config_path().display());
    Ok(())
}

pub fn init() -> Result<()> {
    let path = paths::config_path();
    if Config::init()? {
        println!("Wrote {}", path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}

pub fn set_url(url: &str) -> Result<()> {
    Config::save_base_url(url)?;
    println!("base_url set to {url}");
    Ok(())
}
