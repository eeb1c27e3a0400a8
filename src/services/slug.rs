use once_cell::sync::Lazy;
use regex::Regex;
use std::convert::Infallible;

static NON_ALNUM_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("Invalid slug separator regex pattern"));

/// Base used when a title has no ASCII letters or digits at all.
pub const FALLBACK_BASE: &str = "post";

pub const MAX_SLUG_LENGTH: usize = 256;

/// Lower-cases `title`, collapses every run of characters outside
/// `[a-z0-9]` into a single hyphen and trims hyphens from both ends.
pub fn normalize(title: &str) -> String {
    let lowered = title.to_lowercase();
    NON_ALNUM_RUN
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Finds the first slug for `title` that `exists` reports as unused.
///
/// Candidates are `base`, `base-1`, `base-2`, ... where the suffix is always
/// appended to the normalized base, never to a previous candidate.
pub fn generate_slug<F>(title: &str, mut exists: F) -> String
where
    F: FnMut(&str) -> bool,
{
    match try_generate_slug(title, |candidate| Ok::<_, Infallible>(exists(candidate))) {
        Ok(slug) => slug,
        Err(never) => match never {},
    }
}

/// Same search as [`generate_slug`], for oracles that can fail (a database
/// lookup). The first oracle error aborts the search.
pub fn try_generate_slug<F, E>(title: &str, mut exists: F) -> Result<String, E>
where
    F: FnMut(&str) -> Result<bool, E>,
{
    let mut base = normalize(title);
    if base.is_empty() {
        base = FALLBACK_BASE.to_string();
    }

    if !exists(&base)? {
        return Ok(base);
    }

    let mut counter: u64 = 1;
    loop {
        let candidate = format!("{}-{}", base, counter);
        if !exists(&candidate)? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

pub fn validate_slug(slug: &str) -> bool {
    if slug.is_empty() || slug.len() > MAX_SLUG_LENGTH {
        return false;
    }
    slug.split('-')
        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()))
}
