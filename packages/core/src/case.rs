//! Identifier case conversion for query keys and action paths.
//!
//! Query keys are canonically `snake_case`; action paths are canonically
//! `kebab-case`. Both conversions accept identifiers in any of the common
//! styles (camelCase, PascalCase, SCREAMING_CASE, or already-converted) and
//! produce the canonical form, so a field renamed via serde or a type named
//! in another convention still lands on the same wire key.

/// Convert an identifier to `snake_case`.
pub(crate) fn snake_case(s: &str) -> String {
    convert(s, '_')
}

/// Convert an identifier to `kebab-case`.
pub(crate) fn kebab_case(s: &str) -> String {
    convert(s, '-')
}

/// The last path segment of a type name, without generic parameters.
///
/// `std::any::type_name` yields the fully qualified name
/// (`myapp::actions::OpenNote`); callers want just `OpenNote`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// Word boundaries: an explicit separator (`-`, `_`, whitespace), a lowercase
// or digit followed by an uppercase, or the last uppercase of an acronym run
// ("HTTPServer" splits before "Server").
fn convert(s: &str, sep: char) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == '_' || c.is_whitespace() {
            if !out.ends_with(sep) && !out.is_empty() {
                out.push(sep);
            }
            continue;
        }

        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let after_lower = prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
            let acronym_end =
                prev.is_some_and(|p| p.is_uppercase()) && next.is_some_and(|n| n.is_lowercase());
            if (after_lower || acronym_end) && !out.ends_with(sep) && !out.is_empty() {
                out.push(sep);
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    // A trailing separator can only come from trailing separator input.
    while out.ends_with(sep) {
        out.pop();
    }
    out
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_from_camel_and_pascal() {
        assert_eq!(snake_case("noteTitle"), "note_title");
        assert_eq!(snake_case("NoteTitle"), "note_title");
        assert_eq!(snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn snake_from_acronyms_and_digits() {
        assert_eq!(snake_case("HTTPServer"), "http_server");
        assert_eq!(snake_case("noteID"), "note_id");
        assert_eq!(snake_case("utf8Name"), "utf8_name");
    }

    #[test]
    fn kebab_from_type_names() {
        assert_eq!(kebab_case("OpenNote"), "open-note");
        assert_eq!(kebab_case("AddTagToNote"), "add-tag-to-note");
        assert_eq!(kebab_case("snake_input"), "snake-input");
    }

    #[test]
    fn short_names_strip_modules_and_generics() {
        struct Plain;
        assert_eq!(short_type_name::<Plain>(), "Plain");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }
}
