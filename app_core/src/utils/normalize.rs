/// Normalize whitespace by:
/// - mapping all Unicode whitespace (incl. tabs/newlines) to a single ASCII space
/// - collapsing runs of spaces to a single space
/// - trimming leading/trailing spaces
pub fn normalize_ws(input: impl Into<String>) -> String {
    let mapped: String = input
        .into()
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();

    let mut out = String::with_capacity(mapped.len());
    let mut last_space = false;
    for ch in mapped.chars() {
        if ch == ' ' {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(ch);
            last_space = false;
        }
    }

    out.trim().to_string()
}

/// Normalize an optional string:
/// - apply whitespace normalization to Some
/// - convert empty result to None
pub fn normalize_opt(input: Option<impl Into<String>>) -> Option<String> {
    match input {
        None => None,
        Some(s) => {
            let n = normalize_ws(s);
            if n.is_empty() {
                None
            } else {
                Some(n)
            }
        }
    }
}

/// Derive a stable slug id from a display name:
/// - lowercase
/// - alphanumeric kept as-is, whitespace and dashes become underscores
/// - everything else dropped
/// - runs of underscores collapsed, leading/trailing underscores trimmed
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_underscore = false;
    for ch in input.chars() {
        let mapped = if ch.is_ascii_alphanumeric() {
            Some(ch.to_ascii_lowercase())
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            Some('_')
        } else {
            None
        };
        match mapped {
            Some('_') => {
                if !last_underscore && !out.is_empty() {
                    out.push('_');
                    last_underscore = true;
                }
            }
            Some(c) => {
                out.push(c);
                last_underscore = false;
            }
            None => {}
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// A slug is valid when non-empty and limited to `[a-z0-9_]`.
pub fn is_valid_slug(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
