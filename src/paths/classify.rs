use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

fn scheme_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([a-zA-Z][a-zA-Z0-9+.-]*)://").expect("invalid scheme regex")
    })
}

/// Resource kind assigned to a raw input string.
///
/// Exactly one kind applies per input. `RepositoryPath` is a candidate only:
/// whether the repository actually holds the path is decided later, during the
/// candidate search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind<'a> {
    /// A named asset reference, `@name`.
    Reference(&'a str),
    /// An absolute or protocol-relative HTTP URL.
    Http,
    /// A URI whose scheme the backing repository supports.
    SchemeUri(&'a str),
    /// An existing file at exactly the given path.
    FilesystemPath,
    /// A wildcard reference into the repository.
    RepositoryGlob,
    /// A repository path candidate.
    RepositoryPath,
}

/// Classify a raw input string into a resource kind.
///
/// Deterministic and total. The only side effect is a file-existence probe for
/// inputs that are neither references nor URIs; the repository is never queried.
pub fn classify<'a>(input: &'a str, supported_schemes: &[String]) -> InputKind<'a> {
    if let Some(name) = input.strip_prefix('@') {
        return InputKind::Reference(name);
    }

    if input.starts_with("//") {
        return InputKind::Http;
    }

    if let Some(captures) = scheme_pattern().captures(input) {
        let scheme = captures.get(1).expect("scheme group").as_str();
        if supported_schemes.iter().any(|s| s == scheme) {
            return InputKind::SchemeUri(scheme);
        }
        return InputKind::Http;
    }

    // Never probe the file system for URIs; only plain paths reach this point.
    if Path::new(input).is_file() {
        return InputKind::FilesystemPath;
    }

    if input.contains('*') {
        return InputKind::RepositoryGlob;
    }

    InputKind::RepositoryPath
}

#[cfg(test)]
mod tests {
    use super::{classify, InputKind};

    fn schemes() -> Vec<String> {
        vec!["resource".to_string()]
    }

    #[test]
    fn classifies_named_references() {
        assert_eq!(classify("@jquery", &schemes()), InputKind::Reference("jquery"));
    }

    #[test]
    fn classifies_protocol_relative_urls() {
        assert_eq!(classify("//cdn.example.com/app.js", &schemes()), InputKind::Http);
    }

    #[test]
    fn classifies_http_urls() {
        assert_eq!(classify("http://example.com/foo.css", &schemes()), InputKind::Http);
        assert_eq!(classify("https://example.com/foo.css", &schemes()), InputKind::Http);
    }

    #[test]
    fn classifies_supported_schemes_as_uris() {
        assert_eq!(
            classify("resource:///ns/css/style.css", &schemes()),
            InputKind::SchemeUri("resource")
        );
    }

    #[test]
    fn unsupported_schemes_fall_back_to_http() {
        assert_eq!(classify("ftp://example.com/foo.css", &schemes()), InputKind::Http);
    }

    #[test]
    fn classifies_wildcards_as_globs() {
        assert_eq!(classify("css/*.css", &schemes()), InputKind::RepositoryGlob);
    }

    #[test]
    fn everything_else_is_a_repository_path_candidate() {
        assert_eq!(classify("css/style.css", &schemes()), InputKind::RepositoryPath);
        assert_eq!(classify("/ns/css/style.css", &schemes()), InputKind::RepositoryPath);
    }

    #[test]
    fn existing_files_classify_as_filesystem_paths() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let file = dir.path().join("style.css");
        std::fs::write(&file, "body {}").expect("failed to write fixture");

        let input = file.to_str().expect("fixture path is not UTF-8").to_string();
        assert_eq!(classify(&input, &schemes()), InputKind::FilesystemPath);
    }
}
