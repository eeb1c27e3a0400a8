use super::Author;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub cover_image: String,
    pub author_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostWithAuthor {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<Author>,
}

/// Listing row for dashboards and profile pages; carries no body.
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub cover_image: String,
    pub author_id: i64,
    pub created_at: String,
}

/// Fields accepted when writing a post. Missing fields deserialize as empty
/// so that validation can report them instead of the JSON extractor.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PostInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default, alias = "coverImage")]
    pub cover_image: Option<String>,
}
