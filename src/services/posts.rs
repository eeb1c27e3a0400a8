use crate::models::{Author, Post, PostInput, PostSummary, PostWithAuthor};
use crate::services::error::{is_unique_violation, ServiceError, ServiceResult};
use crate::services::slug::try_generate_slug;
use crate::Database;
use rusqlite::{Connection, OptionalExtension};

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_EXCERPT_LENGTH: usize = 1000;
pub const MAX_COVER_IMAGE_LENGTH: usize = 2048;

/// How many times `create_post` regenerates a slug after losing an insert
/// race before giving up with [`ServiceError::SlugTaken`].
pub const MAX_SLUG_ATTEMPTS: usize = 5;

const POST_COLUMNS: &str =
    "id, title, slug, content, excerpt, cover_image, author_id, created_at, updated_at";

/// A post body that passed validation, with optional fields resolved.
#[derive(Debug, Clone)]
pub struct ValidPost {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub cover_image: String,
}

pub fn validate(input: PostInput) -> ServiceResult<ValidPost> {
    let title = input.title.trim().to_string();
    let content = input.content.trim().to_string();

    if title.is_empty() || content.is_empty() {
        return Err(ServiceError::validation("Title and content are required"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ServiceError::Validation(format!(
            "Title must be {} characters or less",
            MAX_TITLE_LENGTH
        )));
    }

    let excerpt = input.excerpt.unwrap_or_default().trim().to_string();
    if excerpt.chars().count() > MAX_EXCERPT_LENGTH {
        return Err(ServiceError::Validation(format!(
            "Excerpt must be {} characters or less",
            MAX_EXCERPT_LENGTH
        )));
    }

    let cover_image = input.cover_image.unwrap_or_default().trim().to_string();
    if cover_image.len() > MAX_COVER_IMAGE_LENGTH {
        return Err(ServiceError::validation("Cover image reference is too long"));
    }

    Ok(ValidPost {
        title,
        content,
        excerpt,
        cover_image,
    })
}

pub fn slug_exists(conn: &Connection, candidate: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE slug = ?)",
        [candidate],
        |row| row.get(0),
    )
}

fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        content: row.get(3)?,
        excerpt: row.get(4)?,
        cover_image: row.get(5)?,
        author_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn row_to_summary(row: &rusqlite::Row) -> rusqlite::Result<PostSummary> {
    Ok(PostSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        excerpt: row.get(3)?,
        cover_image: row.get(4)?,
        author_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Inserts `post` under an already chosen `slug`. Losing the slug to a
/// concurrent writer yields [`ServiceError::SlugTaken`].
pub fn insert_post(
    db: &Database,
    slug: &str,
    post: &ValidPost,
    author_id: i64,
) -> ServiceResult<i64> {
    let conn = db.get()?;
    let inserted = conn.execute(
        "INSERT INTO posts (title, slug, content, excerpt, cover_image, author_id) VALUES (?, ?, ?, ?, ?, ?)",
        (
            &post.title,
            slug,
            &post.content,
            &post.excerpt,
            &post.cover_image,
            author_id,
        ),
    );

    match inserted {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if is_unique_violation(&e, "posts.slug") => {
            Err(ServiceError::SlugTaken(slug.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Creates a post owned by `author_id` under a freshly generated unique slug.
pub fn create_post(db: &Database, input: PostInput, author_id: i64) -> ServiceResult<Post> {
    create_post_with_oracle(db, input, author_id, slug_exists)
}

/// [`create_post`] with the slug existence check supplied by the caller.
///
/// The oracle only proposes a slug; the `UNIQUE` index decides. Each lost
/// insert asks the oracle again, up to [`MAX_SLUG_ATTEMPTS`] times.
pub fn create_post_with_oracle<F>(
    db: &Database,
    input: PostInput,
    author_id: i64,
    mut exists: F,
) -> ServiceResult<Post>
where
    F: FnMut(&Connection, &str) -> rusqlite::Result<bool>,
{
    let post = validate(input)?;

    let mut last_error = None;
    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let slug = {
            let conn = db.get()?;
            let slug = try_generate_slug(&post.title, |candidate| exists(&conn, candidate))?;
            slug
        };

        match insert_post(db, &slug, &post, author_id) {
            Ok(id) => {
                tracing::info!(post_id = id, slug = %slug, author_id, "Created post");
                return get_post(db, id)?.ok_or(ServiceError::NotFound("Post"));
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(slug = %slug, attempt, "Slug taken during insert, retrying");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| ServiceError::SlugTaken(post.title.clone())))
}

/// Rewrites the editable fields of post `id`. The slug is left as created.
pub fn update_post(db: &Database, id: i64, input: PostInput) -> ServiceResult<Post> {
    let post = validate(input)?;
    update_valid_post(db, id, &post)
}

/// Same as [`update_post`] for a body the caller has already validated.
pub fn update_valid_post(db: &Database, id: i64, post: &ValidPost) -> ServiceResult<Post> {
    {
        let conn = db.get()?;
        let affected = conn.execute(
            "UPDATE posts SET title = ?, content = ?, excerpt = ?, cover_image = ? WHERE id = ?",
            (
                &post.title,
                &post.content,
                &post.excerpt,
                &post.cover_image,
                id,
            ),
        )?;
        if affected == 0 {
            return Err(ServiceError::NotFound("Post"));
        }
    }
    get_post(db, id)?.ok_or(ServiceError::NotFound("Post"))
}

pub fn delete_post(db: &Database, id: i64) -> ServiceResult<()> {
    let conn = db.get()?;
    let affected = conn.execute("DELETE FROM posts WHERE id = ?", [id])?;
    if affected == 0 {
        return Err(ServiceError::NotFound("Post"));
    }
    tracing::info!(post_id = id, "Deleted post");
    Ok(())
}

pub fn get_post(db: &Database, id: i64) -> ServiceResult<Option<Post>> {
    let conn = db.get()?;
    let post = conn
        .query_row(
            &format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS),
            [id],
            row_to_post,
        )
        .optional()?;
    Ok(post)
}

pub fn get_post_by_slug(db: &Database, slug: &str) -> ServiceResult<Option<PostWithAuthor>> {
    let post = {
        let conn = db.get()?;
        let found = conn
            .query_row(
                &format!("SELECT {} FROM posts WHERE slug = ?", POST_COLUMNS),
                [slug],
                row_to_post,
            )
            .optional()?;
        found
    };

    match post {
        Some(p) => Ok(Some(with_author(db, p)?)),
        None => Ok(None),
    }
}

/// Posts written by `author_id`, newest first.
pub fn list_posts_by_author(db: &Database, author_id: i64) -> ServiceResult<Vec<PostSummary>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, title, slug, excerpt, cover_image, author_id, created_at
         FROM posts WHERE author_id = ? ORDER BY created_at DESC, id DESC",
    )?;
    let posts = stmt
        .query_map([author_id], row_to_summary)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn list_recent_posts(
    db: &Database,
    limit: usize,
    offset: usize,
) -> ServiceResult<Vec<PostWithAuthor>> {
    let posts = {
        let conn = db.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM posts ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            POST_COLUMNS
        ))?;
        let rows = stmt
            .query_map((limit as i64, offset as i64), row_to_post)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    posts.into_iter().map(|p| with_author(db, p)).collect()
}

pub fn count_posts(db: &Database) -> ServiceResult<i64> {
    let conn = db.get()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
    Ok(count)
}

fn with_author(db: &Database, post: Post) -> ServiceResult<PostWithAuthor> {
    let conn = db.get()?;
    let author = conn
        .query_row(
            "SELECT id, name, image, bio FROM users WHERE id = ?",
            [post.author_id],
            |row| {
                Ok(Author {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    image: row.get(2)?,
                    bio: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(PostWithAuthor { post, author })
}
