// src/utils/html.rs

use std::collections::HashSet;

/// Clean author-supplied rich text using the ammonia library.
///
/// Quiz descriptions may carry simple formatting; everything else
/// (scripts, event handlers, unknown tags) is stripped.
pub fn sanitize_description(input: &str) -> String {
    let tags: HashSet<&str> = ["b", "i", "em", "strong", "p", "br", "ul", "ol", "li"]
        .into_iter()
        .collect();

    ammonia::Builder::default()
        .tags(tags)
        .clean(input)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let cleaned = sanitize_description("Hello <script>alert('x')</script>world");
        assert!(!cleaned.contains("script"));
        assert!(cleaned.contains("Hello"));
    }

    #[test]
    fn keeps_simple_formatting() {
        let cleaned = sanitize_description("<b>Bold</b> and <em>emphasis</em>");
        assert_eq!(cleaned, "<b>Bold</b> and <em>emphasis</em>");
    }
}
