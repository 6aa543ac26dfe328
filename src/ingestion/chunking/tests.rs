use super::*;

fn starts(chunks: &[Chunk]) -> Vec<usize> {
    chunks.iter().map(|c| c.start_offset).collect()
}

#[test]
fn empty_text_yields_no_chunks() {
    let chunks = chunk_text("", 1000, 200).expect("chunk_text should succeed");
    assert!(chunks.is_empty());
}

#[test]
fn short_text_yields_single_chunk() {
    let text = "x".repeat(500);
    let chunks = chunk_text(&text, 1000, 200).expect("chunk_text should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].start_offset, 0);
    assert_eq!(chunks[0].end_offset, 500);
    assert_eq!(chunks[0].text, text);
    assert_eq!(chunks[0].id, "chunk_0");
}

#[test]
fn long_text_windows() {
    let text = "x".repeat(2200);
    let chunks = chunk_text(&text, 1000, 200).expect("chunk_text should succeed");

    assert_eq!(starts(&chunks), vec![0, 800, 1600]);
    assert_eq!(chunks[0].end_offset, 1000);
    assert_eq!(chunks[1].end_offset, 1800);
    assert_eq!(chunks[2].end_offset, 2200);
    assert_eq!(chunks[2].len(), 600);
}

#[test]
fn exact_multiple_stops_at_end() {
    let text = "x".repeat(1000);
    let chunks = chunk_text(&text, 1000, 200).expect("chunk_text should succeed");
    assert_eq!(chunks.len(), 1, "no trailing chunk fully inside the previous one");

    let text = "x".repeat(1800);
    let chunks = chunk_text(&text, 1000, 200).expect("chunk_text should succeed");
    assert_eq!(starts(&chunks), vec![0, 800]);
    assert_eq!(chunks[1].end_offset, 1800);
}

#[test]
fn consecutive_chunks_overlap() {
    let text: String = ('a'..='z').cycle().take(5000).collect();
    let chunks = chunk_text(&text, 300, 50).expect("chunk_text should succeed");

    for pair in chunks.windows(2) {
        assert_eq!(pair[0].end_offset - pair[1].start_offset, 50);
        let tail: String = pair[0].text.chars().skip(250).collect();
        let head: String = pair[1].text.chars().take(50).collect();
        assert_eq!(tail, head);
    }
}

#[test]
fn offsets_satisfy_invariants() {
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
    let len = text.chars().count();
    let chunks = chunk_text(&text, 128, 32).expect("chunk_text should succeed");

    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(chunk.start_offset < chunk.end_offset);
        assert!(chunk.end_offset <= len);
        assert!(chunk.len() <= 128);
        assert_eq!(chunk.text.chars().count(), chunk.len());
        assert_eq!(chunk.id, format!("chunk_{}", chunk.start_offset));
    }
    assert_eq!(chunks.last().map(|c| c.end_offset), Some(len));
}

#[test]
fn ids_are_unique_within_document() {
    let text = "y".repeat(10_000);
    let chunks = chunk_text(&text, 100, 10).expect("chunk_text should succeed");

    let mut ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), chunks.len());
}

#[test]
fn multibyte_text_uses_character_offsets() {
    let text = "héllo wörld ünïcode ✓✓✓";
    let chunks = chunk_text(text, 5, 2).expect("chunk_text should succeed");

    assert_eq!(chunks[0].text, "héllo");
    assert_eq!(chunks[1].start_offset, 3);
    assert_eq!(chunks[1].text, "lo wö");

    let rebuilt: String = chunks
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i == 0 {
                c.text.clone()
            } else {
                c.text.chars().skip(2).collect()
            }
        })
        .collect();
    assert_eq!(rebuilt, text);
}

#[test]
fn zero_overlap_tiles_text() {
    let text = "abcdefghij";
    let chunks = chunk_text(text, 4, 0).expect("chunk_text should succeed");

    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
}

#[test]
fn overlap_not_smaller_than_size_is_rejected() {
    assert!(matches!(
        chunk_text("some text", 100, 100),
        Err(QaError::Validation(_))
    ));
    assert!(matches!(
        chunk_text("some text", 100, 150),
        Err(QaError::Validation(_))
    ));
}

#[test]
fn zero_chunk_size_is_rejected() {
    assert!(matches!(
        chunk_text("some text", 0, 0),
        Err(QaError::Validation(_))
    ));
}

#[test]
fn chunking_is_deterministic() {
    let text = "Deterministic chunking. ".repeat(100);
    let first = chunk_text(&text, 200, 40).expect("chunk_text should succeed");
    let second = chunk_text(&text, 200, 40).expect("chunk_text should succeed");
    assert_eq!(first, second);
}

#[test]
fn config_defaults_and_stride() {
    let config = ChunkingConfig::default();
    assert_eq!(config.chunk_size, 1000);
    assert_eq!(config.overlap, 200);
    assert_eq!(config.stride(), 800);
    assert!(config.validate().is_ok());

    let chunks =
        chunk_with_config(&"z".repeat(2200), &config).expect("chunk_with_config should succeed");
    assert_eq!(starts(&chunks), vec![0, 800, 1600]);
}
