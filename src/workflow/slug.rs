//! Filesystem-safe file names derived from workflow display names.

/// Derive a slug: lowercase ASCII alphanumerics separated by single hyphens.
///
/// Runs of any other characters collapse into one hyphen; leading and
/// trailing hyphens are dropped. Applying it to its own output is a no-op.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// File name used when exporting a workflow.
///
/// Falls back to `fallback` (normally the remote id) when the name has no
/// alphanumerics at all.
pub fn workflow_file_name(name: &str, fallback: &str) -> String {
    let slug = slugify(name);
    let slug = if slug.is_empty() {
        slugify(fallback)
    } else {
        slug
    };
    let slug = if slug.is_empty() {
        "workflow".to_string()
    } else {
        slug
    };
    format!("{}.json", slug)
}
