//! Regular-noun pluralization only. Irregular plurals (`mouse` -> `mice`,
//! `child` -> `children`) are explicitly out of scope: callers with such
//! vocabulary should supply their own lookup table.

/// Pluralizes a regular English noun using the standard orthographic rules
/// (sibilant suffix -> `es`, consonant+`y` -> `ies`, otherwise `s`).
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_ascii_lowercase();
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{word}es");
    }
    if lower.ends_with('y') {
        let bytes = word.as_bytes();
        let before_y = bytes[bytes.len() - 2] as char;
        if !matches!(before_y.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u') {
            return format!("{}ies", &word[..word.len() - 1]);
        }
    }
    format!("{word}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_plurals() {
        assert_eq!(pluralize("cat"), "cats");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("church"), "churches");
        assert_eq!(pluralize("city"), "cities");
        assert_eq!(pluralize("day"), "days");
    }
}
