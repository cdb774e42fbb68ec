//! Ant-style path pattern tests

use rstest::rstest;
use route_warden::access_control::{PathPattern, PatternMatcher, match_path};

#[rstest]
#[case("/public/**", "/public/health", true)]
#[case("/public/**", "/public", true)]
#[case("/public/**", "/public/a/b/c", true)]
#[case("/public/**", "/publicity", false)]
#[case("/oauth/token", "/oauth/token", true)]
#[case("/oauth/token", "/oauth/token/extra", false)]
#[case("/*/v2/api-docs", "/orders/v2/api-docs", true)]
#[case("/*/v2/api-docs", "/a/b/v2/api-docs", false)]
#[case("/api/orders/**", "/api/orders/5", true)]
#[case("/api/orders/**", "/api/orders", true)]
#[case("/api/orders/*", "/api/orders/5/items", false)]
#[case("/api/*/items", "/api/5/items", true)]
#[case("/api/**/items", "/api/items", true)]
#[case("/api/**/items", "/api/a/b/c/items", true)]
#[case("/api/**/items", "/api/a/b/c/other", false)]
#[case("/a/**/b/**/c", "/a/x/b/y/z/c", true)]
#[case("/a/**/b/**/c", "/a/x/y/z/c", false)]
#[case("/files/*.png", "/files/logo.png", true)]
#[case("/files/*.png", "/files/logo.jpg", false)]
#[case("/files/?.txt", "/files/a.txt", true)]
#[case("/files/?.txt", "/files/ab.txt", false)]
#[case("/users/{id}", "/users/42", true)]
#[case("/users/{id:\\d+}", "/users/42", true)]
#[case("/users/{id:\\d+}", "/users/abc", false)]
#[case("/users/{id:\\d{2,3}}", "/users/123", true)]
#[case("/users/{id:\\d{2,3}}", "/users/1234", false)]
#[case("/API/orders", "/api/orders", false)]
#[case("/**", "/", true)]
#[case("/**", "/anything/at/all", true)]
#[case("/api/*", "/api/", true)]
#[case("/api/*", "/api", false)]
#[case("/api/orders/", "/api/orders", false)]
#[case("/api/orders", "/api/orders/", false)]
#[case("/api//orders", "/api/orders", true)]
#[case("api/orders", "/api/orders", false)]
fn test_match_path(#[case] pattern: &str, #[case] path: &str, #[case] expected: bool) {
    assert_eq!(
        match_path(pattern, path),
        expected,
        "pattern {pattern:?} vs path {path:?}"
    );
}

#[rstest]
#[case("/users/{id")]
#[case("/users/{}")]
#[case("/users/{id:}")]
#[case("/users/{id:[}")]
fn test_malformed_patterns_rejected(#[case] pattern: &str) {
    assert!(PathPattern::compile(pattern).is_err());
}

#[rstest]
#[case("/users/{id")]
#[case("/users/{id:[}")]
fn test_malformed_patterns_never_match(#[case] pattern: &str) {
    for path in ["/users/1", "/users/{id", "/users/", "/"] {
        assert!(!match_path(pattern, path));
    }
}

#[test]
fn test_matcher_lenient_keeps_valid_patterns() {
    let patterns = vec![
        "/users/{broken".to_string(),
        "/public/**".to_string(),
        "/health".to_string(),
    ];

    assert!(PatternMatcher::new(&patterns).is_err());

    let matcher = PatternMatcher::lenient(&patterns);
    assert_eq!(matcher.len(), 2);
    assert!(matcher.matches("/public/css/site.css"));
    assert!(matcher.matches("/health"));
    assert!(!matcher.matches("/users/1"));
}

#[test]
fn test_matcher_find_match_in_order() {
    let patterns = vec!["/api/**".to_string(), "/api/orders/*".to_string()];
    let matcher = PatternMatcher::new(&patterns).unwrap();
    assert_eq!(matcher.find_match("/api/orders/1"), Some("/api/**"));
    assert_eq!(matcher.find_match("/other"), None);
    assert_eq!(matcher.iter().collect::<Vec<_>>(), vec!["/api/**", "/api/orders/*"]);
}

#[test]
fn test_empty_matcher() {
    let matcher = PatternMatcher::empty();
    assert!(matcher.is_empty());
    assert!(!matcher.matches("/"));
}
