//! Word-prefix matching for the picker's type-ahead.
//!
//! A query matches a name when every query token is a case-insensitive prefix
//! of at least one word of the name.

fn query_tokens(query: &str) -> Vec<String> {
    query
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn name_words(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    tokens: Vec<String>,
}

impl Query {
    pub fn new(text: &str) -> Self { Query { tokens: query_tokens(text) } }

    /// A query with no tokens matches everything.
    pub fn is_empty(&self) -> bool { self.tokens.is_empty() }

    pub fn matches(&self, name: &str) -> bool {
        if self.tokens.is_empty() {
            return true;
        }
        let words = name_words(name);
        self.tokens.iter().all(|token| words.iter().any(|word| word.starts_with(token.as_str())))
    }
}

pub fn matches(name: &str, query: &str) -> bool { Query::new(query).matches(name) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_must_prefix_some_word() {
        assert!(!matches("Visual Studio Code", "vs co"));
        assert!(!matches("Code", "vs co"));
        assert!(matches("Visual Studio Code", "vi co"));
        assert!(!matches("Code", "vi co"));
    }

    #[test]
    fn matching_is_case_insensitive_and_order_free() {
        assert!(matches("Google Chrome", "CHR goo"));
        assert!(matches("Google Chrome", "g"));
        assert!(!matches("Google Chrome", "oogle"));
    }

    #[test]
    fn query_separators_and_name_punctuation() {
        assert!(matches("IntelliJ IDEA (Ultimate)", "intel_ult"));
        assert!(matches("com.apple.Terminal", "term"));
        assert!(matches("Sublime-Text", "sub-te"));
    }

    #[test]
    fn blank_query_matches_everything() {
        assert!(Query::new("  - _ ").is_empty());
        assert!(matches("Anything", "   "));
    }

    #[test]
    fn words_are_split_on_non_alphanumerics() {
        assert_eq!(name_words("Visual Studio Code - Insiders"), vec![
            "visual", "studio", "code", "insiders"
        ]);
        assert_eq!(query_tokens(" vi\tco-in "), vec!["vi", "co", "in"]);
    }
}
