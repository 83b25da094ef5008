//! Small ASCII-oriented string helpers that don't belong to any one
//! subsystem: quoting for diagnostic output and identifier case conversion.

/// Wraps `s` in double quotes, escaping embedded backslashes and quotes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Converts `camelCase` / `PascalCase` / `kebab-case` to `snake_case`.
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower_or_digit = false;
    for c in s.chars() {
        if c == '-' || c == ' ' {
            out.push('_');
            prev_lower_or_digit = false;
            continue;
        }
        if c.is_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower_or_digit = false;
        } else {
            out.push(c);
            prev_lower_or_digit = c.is_alphanumeric();
        }
    }
    out
}

/// Converts `snake_case` / `kebab-case` to `camelCase`.
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' || c == '-' {
            capitalize_next = true;
            continue;
        }
        if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn quotes_embedded_specials() {
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }

    #[test_case("HelloWorld", "hello_world")]
    #[test_case("already_snake", "already_snake")]
    #[test_case("kebab-case", "kebab_case")]
    #[test_case("HTTPServer", "httpserver")]
    fn snake_case_conversion(input: &str, expected: &str) {
        assert_eq!(to_snake_case(input), expected);
    }

    #[test_case("hello_world", "helloWorld")]
    #[test_case("kebab-case", "kebabCase")]
    #[test_case("already", "already")]
    fn camel_case_conversion(input: &str, expected: &str) {
        assert_eq!(to_camel_case(input), expected);
    }
}
