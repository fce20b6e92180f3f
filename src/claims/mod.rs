//! Claims module - split a backstory into atomic claims
//!
//! Sentence-boundary heuristic: newlines become spaces, `?`, `!` and `;`
//! followed by a space are treated as full stops, and the text is split on `.`.
//! Fragments that are too short to carry a claim are dropped.

use crate::records::{Backstory, Claim};

pub const DEFAULT_MIN_CLAIM_CHARS: usize = 10;

/// Split text into claim sentences
///
/// Only fragments with more than `min_chars` characters (after trimming) are
/// kept.
pub fn split_claims(text: &str, min_chars: usize) -> Vec<String> {
    let normalized = text
        .replace("\r\n", " ")
        .replace('\n', " ")
        .replace("? ", ". ")
        .replace("! ", ". ")
        .replace("; ", ". ");

    normalized
        .split('.')
        .map(str::trim)
        .filter(|s| s.chars().count() > min_chars)
        .map(str::to_string)
        .collect()
}

/// Claims of one backstory with 1-based sequential ids
pub fn claims_for(backstory: &Backstory, min_chars: usize) -> Vec<Claim> {
    split_claims(&backstory.content, min_chars)
        .into_iter()
        .zip(1u32..)
        .map(|(text, claim_id)| Claim {
            story_id: backstory.story_id.clone(),
            claim_id,
            text,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_sentence_marks() {
        let claims = split_claims(
            "He was raised by wolves. Did he ever forgive them? He swore revenge; nobody believed him",
            DEFAULT_MIN_CLAIM_CHARS,
        );
        assert_eq!(
            claims,
            vec![
                "He was raised by wolves",
                "Did he ever forgive them",
                "He swore revenge",
                "nobody believed him",
            ]
        );
    }

    #[test]
    fn test_short_fragments_dropped() {
        // "Yes indeed" is exactly 10 characters
        let claims = split_claims("Yes indeed. She left the island at nineteen.", 10);
        assert_eq!(claims, vec!["She left the island at nineteen"]);
    }

    #[test]
    fn test_newlines_join_sentences() {
        let claims = split_claims("She trained as a\nsurgeon in Lyon.", 10);
        assert_eq!(claims, vec!["She trained as a surgeon in Lyon"]);
    }

    #[test]
    fn test_empty_backstory_has_no_claims() {
        let backstory = Backstory::new("s", "").unwrap();
        assert!(claims_for(&backstory, 10).is_empty());
    }

    #[test]
    fn test_claim_ids_are_sequential() {
        let backstory =
            Backstory::new("s", "First claim is long enough. Short. Second claim also long.")
                .unwrap();
        let claims = claims_for(&backstory, 10);
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].claim_id, 1);
        assert_eq!(claims[1].claim_id, 2);
        assert_eq!(claims[1].text, "Second claim also long");
        assert!(claims.iter().all(|c| c.story_id == "s"));
    }
}
