// src/core/sanitize.rs

/// Collapse runs of whitespace (including newlines) into one space and trim.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space { out.push(' '); prev_space = true; }
        } else { out.push(ch); prev_space = false; }
    }
    out.trim().to_string()
}

/// File-system safe stem: ASCII alphanumerics, `-` and single `_`.
/// Falls back to `fallback` when nothing usable is left.
pub fn sanitize_file_stem(name: &str, fallback: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_us = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' { out.push(ch); last_us = false; }
        else if !last_us { out.push('_'); last_us = true; }
    }
    let out = out.trim_matches('_').to_string();
    if out.is_empty() { fallback.to_string() } else { out }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_collapses() {
        assert_eq!(normalize_ws("  ул.\n Ленина,\t 5 "), "ул. Ленина, 5");
    }

    #[test]
    fn stems() {
        assert_eq!(sanitize_file_stem("houses page 001", "x"), "houses_page_001");
        assert_eq!(sanitize_file_stem("50/77", "x"), "50_77");
        assert_eq!(sanitize_file_stem("Москва", "territory"), "territory");
    }
}
