//! Order-count extraction from POS window text.
//!
//! Two entry points share one idea: find the number of active delivery
//! orders inside noisy UI text. `extract_from_text` works on clean
//! accessibility-tree fragments and matches status keywords followed by a
//! digit. `extract_from_image` works on a recognized OCR blob and counts
//! delivery rows, tolerating the systematic single-character misreads
//! Tesseract produces for Hangul.

use regex::Regex;
use std::sync::OnceLock;

/// A matched count together with the text that produced it. A count
/// without its evidence is useless for pattern debugging, so the two are
/// never separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    pub count: u32,
    pub matched: String,
}

/// Result of the line-oriented OCR extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageExtraction {
    /// Number of delivery rows carrying an active-status keyword.
    pub count: u32,
    /// The rows that counted.
    pub active: Vec<String>,
    /// Delivery rows with no recognized active-status keyword. Reported
    /// for diagnosis, excluded from the count.
    pub unmatched: Vec<String>,
}

/// Status-keyword patterns in priority order. "처리중 3", "접수대기: 2",
/// "배달 5" and so on. The longer keywords come first inside the
/// alternation so "접수대기" is not eaten by "접수".
const STATUS_PATTERNS: [&str; 3] = [
    r"(?:처리중|진행중|조리중|접수대기|접수|대기)[\s:()]*(\d+)",
    r"배달\s*(\d+)",
    r"전체\s*(\d+)",
];

/// Generic "N건" fallback. Prone to false positives on totals and prices,
/// so it only runs after every fragment failed the status patterns.
const ITEM_COUNT_PATTERN: &str = r"(\d+)\s*건";

fn status_regexes() -> &'static Vec<Regex> {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        STATUS_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("status pattern is valid"))
            .collect()
    })
}

fn item_count_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(ITEM_COUNT_PATTERN).expect("item pattern is valid"))
}

/// Extracts an order count from accessibility-tree text fragments.
///
/// Pass 1 tests every fragment, in traversal order, against the status
/// patterns; the first fragment that matches wins. Pass 2 falls back to
/// the bare "N건" pattern only when no fragment matched a status keyword.
/// Evidence is the whole fragment, not just the matched substring.
pub fn extract_from_text(fragments: &[String]) -> Option<Evidence> {
    for fragment in fragments {
        for regex in status_regexes() {
            if let Some(caps) = regex.captures(fragment) {
                // Digit runs too long for u32 (order numbers, timestamps)
                // are not counts; skip the match, never abort the scan.
                let Ok(count) = caps[1].parse::<u32>() else {
                    continue;
                };
                return Some(Evidence {
                    count,
                    matched: fragment.clone(),
                });
            }
        }
    }

    for fragment in fragments {
        if let Some(caps) = item_count_regex().captures(fragment) {
            let Ok(count) = caps[1].parse::<u32>() else {
                continue;
            };
            return Some(Evidence {
                count,
                matched: fragment.clone(),
            });
        }
    }

    None
}

/// The literal marker identifying a delivery row.
const DELIVERY_MARKER: &str = "배달";

/// Misrenderings of "배달" that Tesseract produces on the small POS list
/// font. Collected from saved OCR transcripts; each is a single-character
/// substitution of the marker.
const DELIVERY_VARIANTS: [&str; 5] = ["배딜", "배탈", "베달", "매달", "빼달"];

/// Active-status keywords and their observed OCR misrenderings. A row
/// carrying any of these (by substring) has an unfinished order. Finished
/// statuses ("완료" on its own, "취소") are deliberately absent.
const ACTIVE_KEYWORDS: &[(&str, &[&str])] = &[
    ("접수대기", &["접수대끼", "접쑤대기"]),
    ("접수", &["접쑤", "전수"]),
    ("처리중", &["처리종", "처라중"]),
    ("진행중", &["진행종", "진헹중"]),
    ("조리시작", &["조리시직", "조라시작"]),
    ("조리완료", &["조리완묘", "조리완로"]),
    ("조리중", &["조리종", "조라중"]),
    ("배달중", &["배딜중", "배달종"]),
    ("픽업", &["필업", "픽엽"]),
    ("준비완료", &["준비완묘", "준비완로"]),
];

fn is_delivery_row(line: &str) -> bool {
    line.contains(DELIVERY_MARKER) || DELIVERY_VARIANTS.iter().any(|v| line.contains(v))
}

fn is_active_row(line: &str) -> bool {
    ACTIVE_KEYWORDS.iter().any(|(keyword, variants)| {
        line.contains(keyword) || variants.iter().any(|v| line.contains(v))
    })
}

/// Counts active delivery rows in a recognized text blob.
///
/// A line is a delivery row iff it contains the delivery marker or one of
/// its misrendering variants. A delivery row is active iff it also carries
/// an active-status keyword (exact or variant). Returns `None` when no
/// delivery row exists at all: that means the order-list region was not
/// recognized, not that there are zero orders, and the caller must retry
/// with another variant instead of publishing a false zero.
pub fn extract_from_image(blob: &str) -> Option<ImageExtraction> {
    let mut active = Vec::new();
    let mut unmatched = Vec::new();

    for line in blob.lines() {
        let line = line.trim();
        if line.is_empty() || !is_delivery_row(line) {
            continue;
        }
        if is_active_row(line) {
            active.push(line.to_string());
        } else {
            unmatched.push(line.to_string());
        }
    }

    if active.is_empty() && unmatched.is_empty() {
        return None;
    }

    Some(ImageExtraction {
        count: active.len() as u32,
        active,
        unmatched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_status_keyword_with_count() {
        let result = extract_from_text(&fragments(&["처리중 3"])).unwrap();
        assert_eq!(result.count, 3);
        assert_eq!(result.matched, "처리중 3");
    }

    #[test]
    fn test_status_keyword_separators() {
        assert_eq!(extract_from_text(&fragments(&["접수대기: 2"])).unwrap().count, 2);
        assert_eq!(extract_from_text(&fragments(&["진행중(4)"])).unwrap().count, 4);
        assert_eq!(extract_from_text(&fragments(&["조리중7"])).unwrap().count, 7);
    }

    #[test]
    fn test_status_beats_generic_item_pattern() {
        // "합계 10건" would match the generic 건 pattern, but the status
        // keyword fragment must win even though both are present.
        let result = extract_from_text(&fragments(&["메인", "처리중 3", "합계 10건"])).unwrap();
        assert_eq!(result.count, 3);
        assert_eq!(result.matched, "처리중 3");
    }

    #[test]
    fn test_status_beats_generic_even_when_generic_comes_first() {
        let result = extract_from_text(&fragments(&["합계 10건", "처리중 3"])).unwrap();
        assert_eq!(result.count, 3);
    }

    #[test]
    fn test_first_matching_fragment_wins() {
        let result = extract_from_text(&fragments(&["배달 5", "처리중 3"])).unwrap();
        assert_eq!(result.count, 5);
        assert_eq!(result.matched, "배달 5");
    }

    #[test]
    fn test_item_count_fallback() {
        let result = extract_from_text(&fragments(&["메인", "5건"])).unwrap();
        assert_eq!(result.count, 5);
        assert_eq!(result.matched, "5건");
    }

    #[test]
    fn test_no_match_returns_none() {
        assert!(extract_from_text(&fragments(&["메인", "설정", "12:30"])).is_none());
    }

    #[test]
    fn test_keyword_without_number_does_not_match() {
        assert!(extract_from_text(&fragments(&["처리중"])).is_none());
    }

    #[test]
    fn test_overlong_digit_run_skipped_not_fatal() {
        // An order number after a status keyword overflows u32; the scan
        // must move on to the fragment with the real count.
        let result =
            extract_from_text(&fragments(&["접수 20260828123045", "처리중 3"])).unwrap();
        assert_eq!(result.count, 3);
        assert_eq!(result.matched, "처리중 3");
    }

    #[test]
    fn test_overlong_digit_run_skipped_in_item_fallback() {
        let result = extract_from_text(&fragments(&["99999999999건", "5건"])).unwrap();
        assert_eq!(result.count, 5);
        assert_eq!(result.matched, "5건");
    }

    #[test]
    fn test_image_counts_active_delivery_rows() {
        let blob = "배달 접수\n배달 조리중\n테이블 5\n";
        let result = extract_from_image(blob).unwrap();
        assert_eq!(result.count, 2);
        assert!(result.unmatched.is_empty());
    }

    #[test]
    fn test_image_unmatched_row_excluded_from_count() {
        // "완료구문" is not a recognized active-status keyword or variant:
        // the row is reported but never counted.
        let blob = "배달 접수\n배달 완료구문\n테이블 5\n";
        let result = extract_from_image(blob).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.active, vec!["배달 접수"]);
        assert_eq!(result.unmatched, vec!["배달 완료구문"]);
    }

    #[test]
    fn test_image_no_delivery_rows_is_none_not_zero() {
        // No delivery marker anywhere means the order list was not
        // recognized, which must surface as a miss rather than "0 orders".
        assert!(extract_from_image("테이블 5\n합계 12000원\n").is_none());
        assert!(extract_from_image("").is_none());
    }

    #[test]
    fn test_image_marker_variant_recognized() {
        let blob = "배딜 접수\n매달 조리중\n";
        let result = extract_from_image(blob).unwrap();
        assert_eq!(result.count, 2);
    }

    #[test]
    fn test_image_status_variant_recognized() {
        let blob = "배달 접쑤\n배달 처리종\n";
        let result = extract_from_image(blob).unwrap();
        assert_eq!(result.count, 2);
    }

    #[test]
    fn test_image_all_rows_unmatched_is_zero_not_none() {
        // Delivery rows exist but none is active: a legitimate zero.
        let blob = "배달 완료\n배달 취소\n";
        let result = extract_from_image(blob).unwrap();
        assert_eq!(result.count, 0);
        assert_eq!(result.unmatched.len(), 2);
    }
}
