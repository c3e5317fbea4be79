//! Name and address helpers

/// Fallback name when nothing can be derived from the repository
pub const DEFAULT_APP_NAME: &str = "app";

/// Suffix stripped from the last repository path segment
const REPOSITORY_SUFFIX: &str = ".git";

/// Derive a name from the last path segment of a repository reference.
///
/// Handles `https://host/org/repo.git`, `git@host:org/repo.git` and plain
/// paths. An empty reference yields [`DEFAULT_APP_NAME`].
pub fn derive_repository_name(repository_url: &str) -> String {
    let trimmed = repository_url.trim();

    let path = match url::Url::parse(trimmed) {
        Ok(url) if url.has_host() => url.path().to_string(),
        // scp-like `git@host:org/repo.git`
        _ => match trimmed.split_once(':') {
            Some((_, rest)) if !trimmed.contains("://") => rest.to_string(),
            _ => trimmed.to_string(),
        },
    };

    let segment = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let name = segment.strip_suffix(REPOSITORY_SUFFIX).unwrap_or(segment);

    if name.is_empty() {
        DEFAULT_APP_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Turn an arbitrary name into a DNS label: lowercase alphanumerics and
/// single dashes, no leading or trailing dash, at most 63 characters.
pub fn sanitize_label(name: &str) -> String {
    let mut label = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c.to_ascii_lowercase());
        } else if !label.ends_with('-') {
            label.push('-');
        }
    }

    let label: String = label.trim_matches('-').chars().take(63).collect();
    let label = label.trim_end_matches('-').to_string();

    if label.is_empty() {
        DEFAULT_APP_NAME.to_string()
    } else {
        label
    }
}

/// Whether `label` is a valid single DNS label
pub fn is_dns_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Strip any port suffix from an address.
///
/// `1.2.3.4:22` and `host:22` lose the port, `[::1]:22` becomes `::1`, and a
/// bare IPv6 address is left untouched.
pub fn normalize_address(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Some(rest) = trimmed.strip_prefix('[') {
        if let Some((host, _)) = rest.split_once(']') {
            return host.to_string();
        }
    }

    match trimmed.matches(':').count() {
        1 => trimmed
            .split_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_default(),
        _ => trimmed.to_string(),
    }
}
