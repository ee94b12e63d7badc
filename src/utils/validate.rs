use regex::Regex;
use std::sync::OnceLock;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap())
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?\d{10,15}$").unwrap())
}

pub fn is_valid_email(email: &str) -> bool {
    email_re().is_match(email.trim())
}

pub fn is_valid_phone(phone: &str) -> bool {
    phone_re().is_match(phone.trim())
}

/// Comma-separated recipient lists as submitted by the admin frontend.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_reasonable_emails() {
        assert!(is_valid_email("fan@example.com"));
        assert!(is_valid_email("  spaced@example.co.uk "));
        assert!(is_valid_email("first.last+tag@sub.domain.ng"));
    }

    #[test]
    fn rejects_malformed_emails() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn accepts_international_phone_numbers() {
        assert!(is_valid_phone("+2348012345678"));
        assert!(is_valid_phone("08012345678"));
        assert!(is_valid_phone("123456789012345"));
    }

    #[test]
    fn rejects_malformed_phone_numbers() {
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("+123456789012345678"));
        assert!(!is_valid_phone("phone-number"));
        assert!(!is_valid_phone(""));
    }

    #[test]
    fn splits_and_trims_recipient_lists() {
        assert_eq!(
            split_list("a@x.com, b@y.com ,c@z.com"),
            vec!["a@x.com", "b@y.com", "c@z.com"]
        );
        assert_eq!(split_list(""), Vec::<String>::new());
    }
}
