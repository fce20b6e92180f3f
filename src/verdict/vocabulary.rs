//! Keyword vocabularies for the verdict cascade

/// A set of lowercase keywords matched as substrings of lowercased text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Vocabulary {
    keywords: Vec<String>,
}

impl Vocabulary {
    /// Blank keywords are dropped; a blank keyword would match every text
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// True when any keyword occurs anywhere in `text`, ignoring case
    pub fn matches(&self, text: &str) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}
