//! Phone number normalization.
//!
//! User input arrives with arbitrary separators (`8 (916) 123-45-67`,
//! `+7 916 123 45 67`, bare ten digits). Everything is reduced to the
//! canonical `+<10..15 digits>` form before it is used as a CRM filter, so
//! equivalent inputs always produce identical lookups.

const MIN_DIGITS: usize = 10;
const MAX_DIGITS: usize = 15;

/// Returns true when the text contains enough digit characters to plausibly
/// be a phone number.
///
/// This is deliberately looser than [`normalize`]: phone-shaped input that
/// fails strict normalization should still be routed to the phone flow and
/// rejected with a clear message there, instead of being misread as an
/// opaque access code.
pub fn looks_like_phone(text: &str) -> bool {
    text.chars().filter(char::is_ascii_digit).count() >= MIN_DIGITS
}

/// Reduces raw input to canonical international form, or `None` when the
/// input is not an acceptable phone number.
///
/// Rules, applied to the digit sequence after separators are stripped:
/// - a leading `+` is preserved and the digits kept as-is;
/// - trunk form `8` + 10 digits is rewritten to `+7` + 10 digits;
/// - `7` + 10 digits gains the missing `+`;
/// - a bare 10-digit number is treated as national and prefixed with `+7`.
///
/// Anything that does not end up as `+` followed by 10 to 15 digits is
/// rejected.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();

    if digits.len() < MIN_DIGITS || digits.len() > MAX_DIGITS {
        return None;
    }

    let canonical = if has_plus {
        format!("+{digits}")
    } else if digits.len() == 11 && digits.starts_with('8') {
        format!("+7{}", &digits[1..])
    } else if digits.len() == 11 && digits.starts_with('7') {
        format!("+{digits}")
    } else if digits.len() == MIN_DIGITS {
        format!("+7{digits}")
    } else {
        return None;
    };

    let body = &canonical[1..];
    let acceptable = (MIN_DIGITS..=MAX_DIGITS).contains(&body.len())
        && body.chars().all(|ch| ch.is_ascii_digit());
    acceptable.then_some(canonical)
}
