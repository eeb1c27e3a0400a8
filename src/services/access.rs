//! Ownership rules for reading, editing and deleting posts.
//!
//! The policy only ever looks at who is asking and who wrote the post. Whether
//! the post exists at all is checked by the caller before asking.

use crate::models::{Post, PostSummary, User};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    Authenticated(i64),
}

impl Actor {
    pub fn from_user(user: Option<&User>) -> Self {
        match user {
            Some(u) => Self::Authenticated(u.id),
            None => Self::Anonymous,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::Authenticated(id) => Some(*id),
            Self::Anonymous => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    DenyUnauthenticated,
    DenyForbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("Unauthorized")]
    Unauthenticated,
    #[error("Forbidden")]
    Forbidden,
}

impl AccessDecision {
    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }

    pub fn into_result(self) -> Result<(), AccessDenied> {
        match self {
            Self::Allow => Ok(()),
            Self::DenyUnauthenticated => Err(AccessDenied::Unauthenticated),
            Self::DenyForbidden => Err(AccessDenied::Forbidden),
        }
    }
}

/// Anything that records which user wrote it.
pub trait Authored {
    fn author_id(&self) -> i64;
}

impl Authored for Post {
    fn author_id(&self) -> i64 {
        self.author_id
    }
}

impl Authored for PostSummary {
    fn author_id(&self) -> i64 {
        self.author_id
    }
}

impl Authored for i64 {
    fn author_id(&self) -> i64 {
        *self
    }
}

/// Decides whether `actor` may perform `operation` on `post`.
///
/// Anonymous visitors may read any post, but a signed-in user who is not the
/// author may not. Mutations always require the author's own session.
pub fn decide<P: Authored + ?Sized>(operation: Operation, actor: &Actor, post: &P) -> AccessDecision {
    let author_id = post.author_id();
    match (operation, actor) {
        (Operation::Read, Actor::Anonymous) => AccessDecision::Allow,
        (Operation::Update | Operation::Delete, Actor::Anonymous) => {
            AccessDecision::DenyUnauthenticated
        }
        (_, Actor::Authenticated(user_id)) if *user_id == author_id => AccessDecision::Allow,
        (_, Actor::Authenticated(_)) => AccessDecision::DenyForbidden,
    }
}
