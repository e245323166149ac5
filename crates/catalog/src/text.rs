//! String standardization helpers.

const BUCKET_ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Bucket assigned to names that do not start with a digit or letter.
pub const OTHER_BUCKET: u8 = 37;

/// Standardize a product name: keep ASCII letters and digits only, upper-cased.
pub fn standardize_product_name(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Trim and collapse every whitespace run into a single space.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove the `{`/`}` delimiters used by extension blobs.
pub fn strip_braces(raw: &str) -> String {
    raw.chars().filter(|c| *c != '{' && *c != '}').collect()
}

/// Partition key in `1..=37` derived from the first character.
///
/// Digits map to 1-10, letters (case-insensitive) to 11-36, anything else
/// (including an empty name) to 37.
pub fn name_bucket(name: &str) -> u8 {
    let Some(first) = name.chars().next() else {
        return OTHER_BUCKET;
    };
    let first = first.to_ascii_uppercase();
    BUCKET_ALPHABET
        .chars()
        .position(|c| c == first)
        .map(|idx| idx as u8 + 1)
        .unwrap_or(OTHER_BUCKET)
}
