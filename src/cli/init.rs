use crate::Config;
use anyhow::Result;
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "inkwell.toml";

pub fn starter_config(site_name: &str) -> String {
    format!(
        r#"[site]
title = "{}"
description = "A blog for everyone"
url = "http://localhost:3000"
language = "en"

[server]
host = "127.0.0.1"
port = 3000
request_timeout = 30

[database]
path = "./data/inkwell.db"
pool_size = 10

[content]
posts_per_page = 10
excerpt_length = 200

[auth]
session_lifetime_days = 7
min_password_length = 6
"#,
        site_name.replace('"', "\\\"")
    )
}

pub async fn run(path: PathBuf, name: Option<String>) -> Result<()> {
    let site_name = name.unwrap_or_else(|| "My Blog".to_string());
    let config_path = path.join(CONFIG_FILE);

    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }

    std::fs::create_dir_all(path.join("data"))?;

    let config = starter_config(&site_name);
    Config::from_toml(&config)?;
    std::fs::write(&config_path, config)?;

    tracing::info!("Created new Inkwell site at {:?}", path);
    tracing::info!("Run 'inkwell migrate' to set up the database");
    tracing::info!("Run 'inkwell serve' to start the server");

    Ok(())
}
