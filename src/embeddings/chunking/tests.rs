use super::*;

const ENGLISH_TEXT: &str = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota.";

#[test]
fn empty_input_yields_no_chunks() {
    assert!(chunk_text("", Language::Ja, 500, 50).is_empty());
    assert!(chunk_text("  \n\n \n", Language::En, 500, 50).is_empty());
}

#[test]
fn chunking_is_deterministic() {
    let text = "医療の現場では。電子カルテが使われています！\n診療報酬の改定は？毎年行われます。"
        .repeat(20);
    let first = chunk_text(&text, Language::Ja, 60, 20);
    let second = chunk_text(&text, Language::Ja, 60, 20);
    assert_eq!(first, second);
    assert!(first.len() > 1);
}

#[test]
fn greedy_accumulation_without_overlap() {
    let chunks = chunk_text(ENGLISH_TEXT, Language::En, 40, 0);
    assert_eq!(
        chunks,
        vec![
            "Alpha beta gamma. Delta epsilon zeta.".to_string(),
            "Eta theta iota.".to_string(),
        ]
    );
}

#[test]
fn overlap_carries_trailing_words() {
    // 20 chars of overlap approximates two words
    let chunks = chunk_text(ENGLISH_TEXT, Language::En, 40, 20);
    assert_eq!(
        chunks,
        vec![
            "Alpha beta gamma. Delta epsilon zeta.".to_string(),
            "epsilon zeta. Eta theta iota.".to_string(),
        ]
    );
}

#[test]
fn overlap_below_one_word_is_dropped() {
    let chunks = chunk_text(ENGLISH_TEXT, Language::En, 40, 9);
    assert_eq!(chunks[1], "Eta theta iota.");
}

#[test]
fn oversized_sentence_is_kept_whole() {
    let text = "This sentence is definitely longer than ten. Short.";
    let chunks = chunk_text(text, Language::En, 10, 0);
    assert_eq!(
        chunks,
        vec![
            "This sentence is definitely longer than ten.".to_string(),
            "Short.".to_string(),
        ]
    );
}

#[test]
fn japanese_overlap_carries_the_whole_unspaced_chunk() {
    let text = "今日はとても良い天気です。明日は雨が降るでしょう。";
    let chunks = chunk_text(text, Language::Ja, 15, 10);
    assert_eq!(
        chunks,
        vec![
            "今日はとても良い天気です。".to_string(),
            "今日はとても良い天気です。明日は雨が降るでしょう。".to_string(),
        ]
    );
}

#[test]
fn long_words_are_never_cut() {
    let text = "Electroencephalography antidisestablishmentarianism. Next sentence here.";
    let chunks = chunk_text(text, Language::En, 40, 20);
    assert_eq!(
        chunks,
        vec![
            "Electroencephalography antidisestablishmentarianism.".to_string(),
            "Electroencephalography antidisestablishmentarianism. Next sentence here."
                .to_string(),
        ]
    );
}

#[test]
fn japanese_sentences_join_without_spaces() {
    let text = "短い文。もう一つ。";
    let chunks = chunk_text(text, Language::Ja, 100, 0);
    assert_eq!(chunks, vec!["短い文。もう一つ。".to_string()]);
}

#[test]
fn every_sentence_is_covered_in_order() {
    let text = "One fish. Two fish! Red fish? Blue fish.\nThe end. ".repeat(15);
    let sentences = Language::En.policy().split_sentences(&text);
    let chunks = chunk_text(&text, Language::En, 45, 10);

    // Walk chunks and sentences together: each sentence must show up, in order
    let mut next = 0;
    for chunk in &chunks {
        let mut cursor = 0;
        while next < sentences.len() {
            match chunk[cursor..].find(sentences[next]) {
                Some(found) => {
                    cursor += found + sentences[next].len();
                    next += 1;
                }
                None => break,
            }
        }
    }
    assert_eq!(next, sentences.len(), "sentence {} was dropped", next);
}

#[test]
fn overlap_larger_than_chunk_size_is_accepted() {
    let chunks = chunk_text(ENGLISH_TEXT, Language::En, 20, 500);
    assert_eq!(chunks.len(), 3);
    assert!(chunks[1].ends_with("Delta epsilon zeta."));
    assert!(chunks[2].ends_with("Eta theta iota."));
}
