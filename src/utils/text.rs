use std::sync::LazyLock;

use regex::Regex;

/// Maximum length of a node name after sanitizing.
pub const NODE_NAME_MAX_LEN: usize = 64;

static CRON_FIELD: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(\*|\d+(-\d+)?)(/\d+)?(,(\*|\d+(-\d+)?)(/\d+)?)*$"));

/// Strips line breaks, trims, and caps the name at [`NODE_NAME_MAX_LEN`] chars.
///
/// Returns `None` when nothing is left.
pub fn sanitize_node_name(name: &str) -> Option<String> {
    let cleaned: String = name.replace(['\r', '\n'], "");
    let trimmed: String = cleaned.trim().chars().take(NODE_NAME_MAX_LEN).collect();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Checks a five-field crontab expression (minute hour day month weekday).
pub fn is_valid_crontab(expr: &str) -> bool {
    let Ok(field) = CRON_FIELD.as_ref() else {
        return false;
    };
    let fields: Vec<&str> = expr.split_whitespace().collect();
    fields.len() == 5 && fields.iter().all(|f| field.is_match(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_node_name() {
        assert_eq!(sanitize_node_name("  Deploy\r\n to CDN "), Some("Deploy to CDN".to_string()));
        assert_eq!(sanitize_node_name(" \n "), None);
        let long = "x".repeat(100);
        assert_eq!(sanitize_node_name(&long).unwrap().len(), NODE_NAME_MAX_LEN);
    }

    #[test]
    fn test_is_valid_crontab() {
        assert!(is_valid_crontab("0 0 * * *"));
        assert!(is_valid_crontab("*/5 1-3 1,15 * 0"));
        assert!(!is_valid_crontab("0 0 * *"));
        assert!(!is_valid_crontab("0 0 * * mon"));
        assert!(!is_valid_crontab(""));
    }
}
