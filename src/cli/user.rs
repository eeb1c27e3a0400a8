use crate::models::UserRole;
use crate::{services::auth, Config, Database};
use anyhow::Result;
use std::path::Path;

use super::UserCommand;

fn prompt_new_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

pub async fn run(config_path: &Path, command: UserCommand) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = Database::open(&config.database.path)?;
    db.migrate()?;
    let min_length = config.auth.min_password_length;

    match command {
        UserCommand::Add {
            name,
            email,
            role,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_new_password()?,
            };

            let role: UserRole = role.parse().map_err(|_| anyhow::anyhow!("Invalid role '{}'", role))?;
            let id = auth::create_user(&db, &name, &email, &password, role, min_length)?;
            tracing::info!("User '{}' created with id {}", email, id);
        }
        UserCommand::List => {
            let users = auth::list_users(&db)?;

            println!("{:<6} {:<24} {:<32} {:<8}", "ID", "NAME", "EMAIL", "ROLE");
            println!("{}", "-".repeat(72));
            for user in users {
                println!(
                    "{:<6} {:<24} {:<32} {:<8}",
                    user.id, user.name, user.email, user.role
                );
            }
        }
        UserCommand::Remove { email } => {
            if auth::delete_user_by_email(&db, &email)? {
                tracing::info!("User '{}' removed", email);
            } else {
                tracing::warn!("User '{}' not found", email);
            }
        }
        UserCommand::Passwd { email } => {
            let password = prompt_new_password()?;
            auth::update_password(&db, &email, &password, min_length)?;
            tracing::info!("Password updated for '{}'", email);
        }
    }

    Ok(())
}
