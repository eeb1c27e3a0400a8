use crate::models::{RegisterUser, UpdateProfile, User, UserRole, DEFAULT_AVATAR};
use crate::services::error::{is_unique_violation, ServiceError, ServiceResult};
use crate::Database;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use once_cell::sync::Lazy;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use rusqlite::OptionalExtension;

const MAX_NAME_LENGTH: usize = 100;
const MAX_EMAIL_LENGTH: usize = 254;
const MAX_BIO_LENGTH: usize = 500;
const MAX_IMAGE_REF_LENGTH: usize = 2048;

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex pattern"));

const USER_COLUMNS: &str =
    "id, name, email, password_hash, image, bio, role, created_at, updated_at";

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        image: row.get(4)?,
        bio: row.get(5)?,
        role: row.get::<_, String>(6)?.parse().unwrap_or_default(),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn validate_name(name: &str) -> ServiceResult<()> {
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ServiceError::Validation(format!(
            "Name must be {} characters or less",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> ServiceResult<()> {
    if email.len() > MAX_EMAIL_LENGTH || !EMAIL_REGEX.is_match(email) {
        return Err(ServiceError::validation("Please provide a valid email"));
    }
    Ok(())
}

pub fn validate_password(password: &str, min_length: usize) -> ServiceResult<()> {
    if password.chars().count() < min_length {
        return Err(ServiceError::Validation(format!(
            "Password must be at least {} characters",
            min_length
        )));
    }
    Ok(())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dW5rbm93bg$0000000000000000000000000000000000000000000";

/// Checks `password` against a stored PHC hash. A malformed hash still costs
/// one verification so that timing does not reveal it.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => {
            if let Ok(dummy) = PasswordHash::new(DUMMY_HASH) {
                let _ = Argon2::default().verify_password(password.as_bytes(), &dummy);
            }
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn create_user(
    db: &Database,
    name: &str,
    email: &str,
    password: &str,
    role: UserRole,
    min_password_length: usize,
) -> ServiceResult<i64> {
    let name = name.trim();
    let email = normalize_email(email);

    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ServiceError::validation("Please provide all fields"));
    }
    validate_name(name)?;
    validate_password(password, min_password_length)?;
    validate_email(&email)?;

    if get_user_by_email(db, &email)?.is_some() {
        return Err(ServiceError::Duplicate(
            "User with this email already exists".into(),
        ));
    }

    let password_hash = hash_password(password)?;
    let conn = db.get()?;
    let inserted = conn.execute(
        "INSERT INTO users (name, email, password_hash, role) VALUES (?, ?, ?, ?)",
        (name, &email, &password_hash, role.to_string()),
    );

    match inserted {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            tracing::info!(user_id = id, "Registered user");
            Ok(id)
        }
        Err(e) if is_unique_violation(&e, "users.email") => Err(ServiceError::Duplicate(
            "User with this email already exists".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Registers a regular user and returns the stored record.
pub fn register(
    db: &Database,
    input: &RegisterUser,
    min_password_length: usize,
) -> ServiceResult<User> {
    let id = create_user(
        db,
        &input.name,
        &input.email,
        &input.password,
        UserRole::User,
        min_password_length,
    )?;
    get_user(db, id)?.ok_or(ServiceError::NotFound("User"))
}

pub fn update_password(
    db: &Database,
    email: &str,
    password: &str,
    min_password_length: usize,
) -> ServiceResult<()> {
    validate_password(password, min_password_length)?;
    let password_hash = hash_password(password)?;
    let conn = db.get()?;
    let affected = conn.execute(
        "UPDATE users SET password_hash = ? WHERE email = ?",
        (&password_hash, normalize_email(email)),
    )?;
    if affected == 0 {
        return Err(ServiceError::NotFound("User"));
    }
    Ok(())
}

pub fn authenticate(db: &Database, email: &str, password: &str) -> ServiceResult<Option<User>> {
    let user = get_user_by_email(db, &normalize_email(email))?;

    match user {
        Some(u) if verify_password(password, &u.password_hash) => Ok(Some(u)),
        Some(_) => Ok(None),
        None => {
            let _ = verify_password(password, DUMMY_HASH);
            Ok(None)
        }
    }
}

pub fn create_session(db: &Database, user_id: i64, duration_days: i64) -> ServiceResult<String> {
    let token = generate_session_token();
    let conn = db.get()?;
    conn.execute(
        "INSERT INTO sessions (user_id, token, expires_at) VALUES (?, ?, datetime('now', ?||' days'))",
        (user_id, &token, duration_days),
    )?;
    Ok(token)
}

pub fn validate_session(db: &Database, token: &str) -> ServiceResult<Option<User>> {
    let conn = db.get()?;
    let user = conn
        .query_row(
            r#"
            SELECT u.id, u.name, u.email, u.password_hash, u.image, u.bio, u.role, u.created_at, u.updated_at
            FROM users u
            JOIN sessions s ON s.user_id = u.id
            WHERE s.token = ? AND s.expires_at > datetime('now')
            "#,
            [token],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn delete_session(db: &Database, token: &str) -> ServiceResult<()> {
    let conn = db.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?", [token])?;
    Ok(())
}

pub fn cleanup_expired_sessions(db: &Database) -> ServiceResult<usize> {
    let conn = db.get()?;
    let removed = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )?;
    Ok(removed)
}

pub fn list_users(db: &Database) -> ServiceResult<Vec<User>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
        USER_COLUMNS
    ))?;
    let users = stmt
        .query_map([], row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn get_user(db: &Database, id: i64) -> ServiceResult<Option<User>> {
    let conn = db.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
            [id],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user_by_email(db: &Database, email: &str) -> ServiceResult<Option<User>> {
    let conn = db.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
            [normalize_email(email)],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

/// Applies the provided profile fields to user `id`. An empty image falls
/// back to the default avatar.
pub fn update_profile(db: &Database, id: i64, input: UpdateProfile) -> ServiceResult<User> {
    let current = get_user(db, id)?.ok_or(ServiceError::NotFound("User"))?;

    let name = match input.name {
        Some(n) => {
            let n = n.trim().to_string();
            if n.is_empty() {
                return Err(ServiceError::validation("Name is required"));
            }
            validate_name(&n)?;
            n
        }
        None => current.name,
    };

    let image = match input.image {
        Some(i) if i.trim().is_empty() => DEFAULT_AVATAR.to_string(),
        Some(i) => {
            let i = i.trim().to_string();
            if i.len() > MAX_IMAGE_REF_LENGTH {
                return Err(ServiceError::validation("Image reference is too long"));
            }
            i
        }
        None => current.image,
    };

    let bio = match input.bio {
        Some(b) => {
            let b = b.trim().to_string();
            if b.chars().count() > MAX_BIO_LENGTH {
                return Err(ServiceError::Validation(format!(
                    "Bio must be {} characters or less",
                    MAX_BIO_LENGTH
                )));
            }
            b
        }
        None => current.bio,
    };

    {
        let conn = db.get()?;
        conn.execute(
            "UPDATE users SET name = ?, image = ?, bio = ? WHERE id = ?",
            (&name, &image, &bio, id),
        )?;
    }

    get_user(db, id)?.ok_or(ServiceError::NotFound("User"))
}

pub fn delete_user_by_email(db: &Database, email: &str) -> ServiceResult<bool> {
    let conn = db.get()?;
    let affected = conn.execute(
        "DELETE FROM users WHERE email = ?",
        [normalize_email(email)],
    )?;
    Ok(affected > 0)
}
