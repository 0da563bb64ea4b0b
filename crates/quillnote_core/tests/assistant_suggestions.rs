use quillnote_core::assistant::{suggest, suggest_summary, suggest_tags, suggest_title};

#[test]
fn title_takes_the_first_four_long_tokens_and_capitalizes() {
    let content = "the quick brown foxes jumped over extremely lazy watchdogs today";
    assert_eq!(
        suggest_title(content).unwrap(),
        "Quick brown foxes jumped"
    );
}

#[test]
fn title_ignores_short_tokens_entirely() {
    assert_eq!(suggest_title("one big word here now").unwrap(), "Word here");
    assert_eq!(suggest_title("a an it or"), None);
}

#[test]
fn summary_keeps_two_sentences_and_marks_truncation() {
    assert_eq!(
        suggest_summary("The quick brown fox jumps. It ran away. The end.").unwrap(),
        "The quick brown fox jumps. It ran away."
    );
}

#[test]
fn summary_without_further_sentences_has_no_trailing_period() {
    assert_eq!(suggest_summary("Only sentence").unwrap(), "Only sentence");
    assert_eq!(suggest_summary("First. Second.").unwrap(), "First. Second");
}

#[test]
fn summary_trims_fragment_padding() {
    assert_eq!(
        suggest_summary("  First thought .   Second thought.  ").unwrap(),
        "First thought. Second thought"
    );
}

#[test]
fn summary_of_blank_or_period_only_content_is_none() {
    assert_eq!(suggest_summary(""), None);
    assert_eq!(suggest_summary("   "), None);
    assert_eq!(suggest_summary("..."), None);
}

#[test]
fn tags_capitalize_long_unique_words() {
    assert_eq!(
        suggest_tags("elephant giraffe hippopotamus", &[]),
        ["Elephant", "Giraffe", "Hippopotamus"]
    );
}

#[test]
fn tags_dedupe_before_the_cap_and_exclude_existing_after_it() {
    let existing = vec!["Elephant".to_string()];
    assert_eq!(
        suggest_tags(
            "elephant elephant giraffe elephant hippopotamus walrus",
            &existing
        ),
        ["Giraffe", "Hippopotamus"]
    );
}

#[test]
fn tags_split_on_punctuation_and_skip_short_words() {
    assert_eq!(
        suggest_tags("planning, planning; budget?? roadmap! it go", &[]),
        ["Planning", "Budget", "Roadmap"]
    );
}

#[test]
fn tag_exclusion_is_case_sensitive_exact_match() {
    let existing = vec!["elephant".to_string()];
    // The capitalized suggestion differs from the lowercase existing tag.
    assert_eq!(suggest_tags("elephant stories", &existing), ["Elephant", "Stories"]);
}

#[test]
fn identical_input_yields_identical_bundles() {
    let content = "Quarterly planning starts now. Capacity numbers matter. Prioritize.";
    let first = suggest(content, &[]).unwrap();
    let second = suggest(content, &[]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn title_tokens_keep_attached_punctuation() {
    // Tokenization is whitespace-only; "far." qualifies with its period.
    assert_eq!(
        suggest_title("we went far. then home."),
        Some("Went far. then home.".to_string())
    );
}

#[test]
fn bundle_collects_all_three_parts() {
    let content = "elephant stories travel around the world. second sentence here.";
    let bundle = suggest(content, &[]).unwrap();
    assert_eq!(bundle.title, "Elephant stories travel around");
    assert_eq!(
        bundle.summary,
        "elephant stories travel around the world. second sentence here"
    );
    assert_eq!(bundle.suggested_tags, ["Elephant", "Stories", "Travel"]);
}
