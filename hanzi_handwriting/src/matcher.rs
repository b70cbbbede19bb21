use super::corpus::*;
use super::entities::*;
use super::error::{RecogError, RecogResult};
use super::match_collector::*;

/// Score multiplier for references with one stroke more or less than the input
pub const STROKE_MISMATCH_PENALTY: f32 = 0.8;

// Circular distance between opposite directions
const MAX_SEGMENT_DISTANCE: u32 = (DIRECTION_BUCKETS / 2) as u32;

/// Scores the candidate character against every compatible entry of the given corpora.
///
/// Strokes are compared in writing order. References with the same stroke count are
/// scored directly; references off by one stroke are scored with the best single stroke
/// left out, then penalized; all others are skipped. Returns at most `top_k` matches,
/// best first, ties in corpus order.
pub fn match_character(candidate: &[StrokeEncoding], corpora: &[&Corpus], top_k: usize) -> RecogResult<Vec<Match>> {
    if candidate.is_empty() {
        return Err(RecogError::InvalidInput("character has no strokes".to_string()));
    }
    if top_k == 0 {
        return Err(RecogError::InvalidInput("limit must be positive".to_string()));
    }
    let mut collector = MatchCollector::new(top_k);
    for corpus in corpora {
        for entry in corpus.entries() {
            if let Some(score) = entry_score(candidate, entry) {
                collector.file_match(Match {
                    hanzi: entry.hanzi,
                    score,
                });
            }
        }
    }
    Ok(collector.into_matches())
}

// Best score over the entry's variants; None if no variant has a compatible stroke count
fn entry_score(candidate: &[StrokeEncoding], entry: &CorpusEntry) -> Option<f32> {
    let mut best: Option<f32> = None;
    for variant in &entry.variants {
        if let Some(score) = variant_score(candidate, variant) {
            if best.map_or(true, |b| score > b) {
                best = Some(score);
            }
        }
    }
    best
}

fn variant_score(candidate: &[StrokeEncoding], reference: &[StrokeEncoding]) -> Option<f32> {
    let n = candidate.len();
    let m = reference.len();
    if n == m {
        let sum: f32 = candidate
            .iter()
            .zip(reference.iter())
            .map(|(a, b)| stroke_similarity(a, b))
            .sum();
        Some(sum / n as f32)
    } else if n + 1 == m {
        // Input is missing a stroke
        Some(sum_with_one_skipped(candidate, reference) / m as f32 * STROKE_MISMATCH_PENALTY)
    } else if m + 1 == n {
        // Input has an extra stroke
        Some(sum_with_one_skipped(reference, candidate) / n as f32 * STROKE_MISMATCH_PENALTY)
    } else {
        None
    }
}

// Aligns `shorter` with `longer` (one stroke longer) leaving out the one stroke of `longer`
// that gives the highest similarity sum. Linear: with stroke s left out, the sum is the
// straight alignment before s plus the shifted alignment after it.
fn sum_with_one_skipped(shorter: &[StrokeEncoding], longer: &[StrokeEncoding]) -> f32 {
    let k = shorter.len();
    let mut before = 0f32;
    let mut after: f32 = (0..k).map(|i| stroke_similarity(&shorter[i], &longer[i + 1])).sum();
    let mut best = before + after;
    for s in 0..k {
        before += stroke_similarity(&shorter[s], &longer[s]);
        after -= stroke_similarity(&shorter[s], &longer[s + 1]);
        best = best.max(before + after);
    }
    best
}

/// Similarity of two strokes in 0..=1; 1 means the same direction in every segment
pub fn stroke_similarity(a: &StrokeEncoding, b: &StrokeEncoding) -> f32 {
    let mut total: u32 = 0;
    for i in 0..SEGMENT_COUNT {
        total += segment_distance(a.directions[i], b.directions[i]);
    }
    1f32 - total as f32 / (SEGMENT_COUNT as u32 * MAX_SEGMENT_DISTANCE) as f32
}

// Circular distance between two buckets; a missing direction is as far as it gets from any direction
fn segment_distance(a: u8, b: u8) -> u32 {
    if a == b {
        return 0;
    }
    if a == NO_DIRECTION || b == NO_DIRECTION {
        return MAX_SEGMENT_DISTANCE;
    }
    let diff = (a as i32 - b as i32).unsigned_abs();
    diff.min(DIRECTION_BUCKETS as u32 - diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::normalizer::normalize;

    const H: StrokeEncoding = StrokeEncoding { directions: [0; SEGMENT_COUNT] };
    const D: StrokeEncoding = StrokeEncoding { directions: [2; SEGMENT_COUNT] };
    const V: StrokeEncoding = StrokeEncoding { directions: [4; SEGMENT_COUNT] };

    fn corpus(name: &str, entries: &[(char, Vec<StrokeEncoding>)]) -> Corpus {
        let mut builder = CorpusBuilder::new(name);
        for (hanzi, variant) in entries {
            builder.add_variant(*hanzi, variant.clone()).unwrap();
        }
        builder.build()
    }

    fn score_of(matches: &[Match], hanzi: char) -> Option<f32> {
        matches.iter().find(|m| m.hanzi == hanzi).map(|m| m.score)
    }

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{} != {}", a, b);
    }

    #[test]
    fn test_segment_distance() {
        assert_eq!(segment_distance(0, 0), 0);
        assert_eq!(segment_distance(1, 15), 2);
        assert_eq!(segment_distance(0, 8), 8);
        assert_eq!(segment_distance(NO_DIRECTION, NO_DIRECTION), 0);
        assert_eq!(segment_distance(NO_DIRECTION, 3), MAX_SEGMENT_DISTANCE);
    }

    #[test]
    fn test_stroke_similarity() {
        assert_close(stroke_similarity(&H, &H), 1.0);
        assert_close(stroke_similarity(&H, &V), 0.5);
        assert_close(stroke_similarity(&H, &D), 0.75);
    }

    #[test]
    fn test_vertical_beats_horizontal() {
        let c = corpus("mmah", &[('一', vec![H]), ('丨', vec![V])]);
        let drawn = normalize(&Stroke::new(vec![Point::new(100.0, 20.0), Point::new(101.0, 60.0), Point::new(100.0, 200.0)]));
        let matches = match_character(&[drawn], &[&c], 10).unwrap();
        assert_eq!(matches[0].hanzi, '丨');
        assert!(score_of(&matches, '丨').unwrap() > score_of(&matches, '一').unwrap());
    }

    #[test]
    fn test_stroke_count_penalty() {
        let c = corpus(
            "mmah",
            &[
                ('七', vec![H, V, D, H, V, D, H]),
                ('干', vec![H, V, D, H]),
                ('三', vec![H, V, D]),
            ],
        );
        let matches = match_character(&[H, V, D], &[&c], 10).unwrap();
        assert_close(score_of(&matches, '三').unwrap(), 1.0);
        assert_close(score_of(&matches, '干').unwrap(), 3.0 / 4.0 * STROKE_MISMATCH_PENALTY);
        // Far-off stroke counts are not scored at all
        assert!(score_of(&matches, '七').is_none());
        assert_eq!(matches[0].hanzi, '三');
    }

    #[test]
    fn test_best_stroke_left_out() {
        let c = corpus("mmah", &[('工', vec![H, D, V])]);
        // Missing middle stroke
        let matches = match_character(&[H, V], &[&c], 10).unwrap();
        assert_close(matches[0].score, 2.0 / 3.0 * STROKE_MISMATCH_PENALTY);
        // Extra stroke at the end
        let c = corpus("mmah", &[('二', vec![H, H])]);
        let matches = match_character(&[H, H, V], &[&c], 10).unwrap();
        assert_close(matches[0].score, 2.0 / 3.0 * STROKE_MISMATCH_PENALTY);
    }

    #[test]
    fn test_stroke_order_matters() {
        let c = corpus("mmah", &[('十', vec![H, V]), ('卜', vec![V, H])]);
        let matches = match_character(&[H, V], &[&c], 10).unwrap();
        assert_eq!(matches[0].hanzi, '十');
        assert!(matches[0].score > matches[1].score);
    }

    #[test]
    fn test_sorted_and_limited() {
        let c = corpus(
            "mmah",
            &[('一', vec![H]), ('丨', vec![V]), ('丿', vec![D]), ('二', vec![H, H]), ('十', vec![H, V])],
        );
        for top_k in 1..6 {
            let matches = match_character(&[D], &[&c], top_k).unwrap();
            assert!(matches.len() <= top_k);
            for pair in matches.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
        }
    }

    #[test]
    fn test_ties_in_corpus_order() {
        let c = corpus("mmah", &[('甲', vec![H]), ('乙', vec![H]), ('丙', vec![H])]);
        let matches = match_character(&[H], &[&c], 2).unwrap();
        let glyphs: Vec<char> = matches.iter().map(|m| m.hanzi).collect();
        assert_eq!(glyphs, vec!['甲', '乙']);
    }

    #[test]
    fn test_best_variant_and_corpus_wins() {
        let mmah = corpus("mmah", &[('一', vec![D])]);
        let orig = corpus("orig", &[('一', vec![V]), ('一', vec![H])]);
        let matches = match_character(&[H], &[&mmah, &orig], 5).unwrap();
        assert_eq!(matches.len(), 1);
        assert_close(matches[0].score, 1.0);
    }

    #[test]
    fn test_tap_matches_point_entry() {
        let c = corpus("mmah", &[('丶', vec![StrokeEncoding::point()]), ('一', vec![H])]);
        let tap = normalize(&Stroke::new(vec![Point::new(5.0, 5.0)]));
        let matches = match_character(&[tap], &[&c], 5).unwrap();
        assert_eq!(matches[0].hanzi, '丶');
        assert_close(matches[0].score, 1.0);
        assert_close(score_of(&matches, '一').unwrap(), 0.0);
    }

    #[test]
    fn test_invalid_input() {
        let c = corpus("mmah", &[('一', vec![H])]);
        assert!(matches!(match_character(&[], &[&c], 5), Err(RecogError::InvalidInput(_))));
        assert!(matches!(match_character(&[H], &[&c], 0), Err(RecogError::InvalidInput(_))));
        assert!(match_character(&[H], &[], 5).unwrap().is_empty());
    }
}
