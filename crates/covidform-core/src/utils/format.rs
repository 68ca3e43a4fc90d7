use serde_json::{Map, Value};

/// `dailyRegistrationLimit` -> `daily_registration_limit`
pub fn camel_to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `daily_registration_limit` -> `dailyRegistrationLimit`.
/// A `-` or `_` is only dropped when a lowercase letter follows it.
pub fn snake_to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek().copied()) {
            ('-' | '_', Some(next)) if next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

pub fn keys_to_camel_case(object: Map<String, Value>) -> Map<String, Value> {
    object
        .into_iter()
        .map(|(key, value)| (snake_to_camel_case(&key), value))
        .collect()
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camel_to_snake_case() {
        assert_eq!(camel_to_snake_case("dailyRegistrationLimit"), "daily_registration_limit");
        assert_eq!(camel_to_snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn test_snake_to_camel_case() {
        assert_eq!(snake_to_camel_case("daily_registration_limit"), "dailyRegistrationLimit");
        assert_eq!(snake_to_camel_case("kebab-case"), "kebabCase");
        assert_eq!(snake_to_camel_case("trailing_"), "trailing_");
        assert_eq!(snake_to_camel_case("digit_1"), "digit_1");
    }

    #[test]
    fn test_keys_to_camel_case() {
        let object = json!({"daily_registration_limit": 100, "covid_test": true});
        let camel = keys_to_camel_case(object.as_object().unwrap().clone());
        assert_eq!(Value::Object(camel), json!({"dailyRegistrationLimit": 100, "covidTest": true}));
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Příliš žluťoučký", 9), "Příliš...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
    }
}
