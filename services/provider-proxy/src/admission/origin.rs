use http::HeaderValue;

/// Exact-match origin allow-list.
#[derive(Debug, Clone)]
pub struct OriginValidator {
    allowed: Vec<String>,
    wildcard: bool,
}

impl OriginValidator {
    pub fn new(allowed: Vec<String>) -> Self {
        let wildcard = allowed.iter().any(|origin| origin == "*");
        Self { allowed, wildcard }
    }

    pub fn allows_any(&self) -> bool {
        self.wildcard
    }

    /// No scheme, port or subdomain normalisation: only byte-equal strings match.
    /// A request without an Origin header passes only under the wildcard.
    pub fn validate(&self, origin: Option<&str>) -> bool {
        if self.wildcard {
            return true;
        }

        match origin {
            Some(origin) => self.allowed.iter().any(|allowed| allowed == origin),
            None => false,
        }
    }

    /// Value for `Access-Control-Allow-Origin`, if the origin may see the response.
    pub fn allow_origin_header(&self, origin: Option<&str>) -> Option<HeaderValue> {
        if self.wildcard {
            return Some(HeaderValue::from_static("*"));
        }

        origin
            .filter(|origin| self.validate(Some(origin)))
            .and_then(|origin| HeaderValue::from_str(origin).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_admits_everything() {
        let validator = OriginValidator::new(vec!["*".to_string()]);

        assert!(validator.validate(Some("https://anything.example")));
        assert!(validator.validate(Some("")));
        assert!(validator.validate(None));
        assert_eq!(
            validator.allow_origin_header(None),
            Some(HeaderValue::from_static("*"))
        );
    }

    #[test]
    fn test_exact_string_equality_only() {
        let validator = OriginValidator::new(vec!["https://a.com".to_string()]);

        assert!(validator.validate(Some("https://a.com")));
        assert!(!validator.validate(Some("https://a.com/")));
        assert!(!validator.validate(Some("http://a.com")));
        assert!(!validator.validate(Some("https://sub.a.com")));
        assert!(!validator.validate(None));
    }

    #[test]
    fn test_allow_origin_header_echoes_allowed_origin() {
        let validator = OriginValidator::new(vec![
            "https://a.com".to_string(),
            "https://b.com".to_string(),
        ]);

        assert_eq!(
            validator.allow_origin_header(Some("https://b.com")),
            Some(HeaderValue::from_static("https://b.com"))
        );
        assert_eq!(validator.allow_origin_header(Some("https://c.com")), None);
    }
}
