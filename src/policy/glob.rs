//! Minimal path globbing for rule patterns.
//!
//! `*` and `?` match within one path component, `**` spans any number of
//! components. A pattern with no `/` is matched against the last component
//! only, so `*.pem` behaves like `**/*.pem`. Patterns may start with `~/`.

/// Match a `/`-separated path against a glob pattern.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let pattern = shellexpand::tilde(pattern);
    if !pattern.contains('/') {
        let name = path.rsplit('/').next().unwrap_or(path);
        return component_match(pattern.as_bytes(), name.as_bytes());
    }
    let pat: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match_components(&pat, &parts)
}

/// Whether any pattern in the list matches.
pub fn any_match<S: AsRef<str>>(patterns: &[S], path: &str) -> bool {
    patterns.iter().any(|p| glob_match(p.as_ref(), path))
}

fn match_components(pat: &[&str], parts: &[&str]) -> bool {
    match pat.split_first() {
        None => parts.is_empty(),
        Some((&"**", rest)) => (0..=parts.len()).any(|skip| match_components(rest, &parts[skip..])),
        Some((head, rest)) => parts.split_first().is_some_and(|(part, remaining)| {
            component_match(head.as_bytes(), part.as_bytes()) && match_components(rest, remaining)
        }),
    }
}

/// Wildcard match within a single component.
fn component_match(pat: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pat.len() && (pat[p] == b'?' || pat[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == b'*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pat[p..].iter().all(|&b| b == b'*')
}
