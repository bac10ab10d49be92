use std::sync::LazyLock;

use regex::Regex;

/// Quantity delivered when an order title names no number at all.
pub const DEFAULT_QUANTITY: u32 = 50;

static EXPLICIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tg_stars[:=]\s*([0-9]{1,6})").expect("valid regex"));

static MARKED: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        r"([0-9]{1,6})\s*(?:зв|зв[её]зд|⭐|stars?)",
        r"(?:зв[её]зд[а-я]*[^0-9]{0,10})?([0-9]{1,6})[^0-9]*(?:зв|⭐|stars?)",
        r"\b([0-9]{1,6})\b",
    ]
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
});

/// Extracts the number of stars an order is for from its title and
/// description. Never returns less than 1.
pub fn extract_quantity(title: &str, description: &str) -> u32 {
    let text = format!("{title} {description}").to_lowercase();

    std::iter::once(&*EXPLICIT)
        .chain(MARKED.iter())
        .find_map(|pattern| {
            pattern
                .captures(&text)
                .and_then(|caps| caps.get(1))
                .and_then(|digits| digits.as_str().parse::<u32>().ok())
        })
        .map(|quantity| quantity.max(1))
        .unwrap_or(DEFAULT_QUANTITY)
}
