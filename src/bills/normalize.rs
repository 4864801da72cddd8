use std::sync::LazyLock;

use regex::Regex;

/// `[label](url)` markdown links.
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)\s]*)\)").unwrap());

/// Emphasis markers: bold, italic, strikethrough, code, spoiler.
static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[*_~`|]+").unwrap());

/// A bill number inside a SOZD bill page URL.
static SOZD_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sozd\.duma\.gov\.ru/bill/(\d{5,}-\d+)").unwrap());

/// A bare bill number that does not continue a longer digit run on the left.
static BILL_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{5,}-\d+)").unwrap());

/// Remove Telegram/markdown emphasis so that `*1052810-8*` reads as `1052810-8`.
///
/// Links keep both their label and their target, separated by a space, so a
/// link whose target is a bill page still yields the number.
pub fn strip_markup(text: &str) -> String {
    let text = LINK_RE.replace_all(text, "$1 $2");
    EMPHASIS_RE.replace_all(&text, "").into_owned()
}

/// Extract a bill number (`<5+ digits>-<digits>`) from free-form text.
///
/// A number found in a `sozd.duma.gov.ru/bill/` URL wins over a bare number
/// appearing anywhere else in the text.
pub fn extract_bill_number(text: Option<&str>) -> Option<String> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }

    let clean = strip_markup(text);

    if let Some(caps) = SOZD_URL_RE.captures(&clean) {
        return Some(caps[1].to_string());
    }

    BILL_NUMBER_RE
        .captures(&clean)
        .map(|caps| caps[1].to_string())
}

pub fn contains_bill_number(text: &str) -> bool {
    extract_bill_number(Some(text)).is_some()
}
