use crate::error::IngestError;
use crate::models::SplitterConfig;

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

pub fn validate_config(config: &SplitterConfig) -> Result<(), IngestError> {
    if config.chunk_size == 0 {
        return Err(IngestError::InvalidChunkConfig(
            "chunk_size must be positive".to_string(),
        ));
    }
    if config.chunk_size <= config.chunk_overlap {
        return Err(IngestError::InvalidChunkConfig(format!(
            "chunk_size {} must exceed chunk_overlap {}",
            config.chunk_size, config.chunk_overlap
        )));
    }
    Ok(())
}

/// Split text into overlapping word-bounded windows.
///
/// Boundaries always fall on whitespace, never mid-token. Consecutive chunks
/// share `chunk_overlap` trailing words. Text shorter than one window comes
/// back as a single chunk; whitespace-only text produces none.
pub fn split_text(text: &str, config: SplitterConfig) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    if words.len() <= config.chunk_size {
        return vec![words.join(" ")];
    }

    let step = config.chunk_size.saturating_sub(config.chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + config.chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(count: usize) -> String {
        (0..count)
            .map(|index| format!("w{index}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }

    #[test]
    fn short_text_is_one_chunk() {
        let config = SplitterConfig {
            chunk_size: 10,
            chunk_overlap: 2,
        };
        let chunks = split_text("only a few words here", config);
        assert_eq!(chunks, vec!["only a few words here".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let config = SplitterConfig::default();
        assert!(split_text("   \n\t ", config).is_empty());
    }

    #[test]
    fn consecutive_chunks_share_overlap_words() {
        let config = SplitterConfig {
            chunk_size: 6,
            chunk_overlap: 2,
        };
        let chunks = split_text(&words(14), config);

        assert_eq!(chunks.len(), 3);
        let first_tail: Vec<&str> = chunks[0].split_whitespace().rev().take(2).collect();
        let second_head: Vec<&str> = chunks[1].split_whitespace().take(2).collect();
        assert_eq!(
            first_tail.into_iter().rev().collect::<Vec<_>>(),
            second_head
        );
    }

    #[test]
    fn splits_never_break_tokens() {
        let config = SplitterConfig {
            chunk_size: 4,
            chunk_overlap: 1,
        };
        let source = words(20);
        let vocabulary: Vec<&str> = source.split_whitespace().collect();

        for chunk in split_text(&source, config) {
            for token in chunk.split_whitespace() {
                assert!(vocabulary.contains(&token), "token {token} was split");
            }
        }
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let config = SplitterConfig {
            chunk_size: 8,
            chunk_overlap: 8,
        };
        assert!(validate_config(&config).is_err());

        let config = SplitterConfig {
            chunk_size: 8,
            chunk_overlap: 7,
        };
        assert!(validate_config(&config).is_ok());
    }
}
