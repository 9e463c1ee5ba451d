//! Publication identifiers: `SMU_P` followed by a decimal number
//!
//! Allocation itself lives in the stores, which keep a single counter row.
//! This module owns the format and the derivation used to seed that counter
//! from identifiers that already exist.

/// Prefix shared by every generated identifier
pub const PREFIX: &str = "SMU_P";

/// Number of the first identifier ever handed out
pub const SEED_NUMBER: u64 = 201_817_001;

/// Render a counter value as an identifier. No zero padding.
pub fn format(number: u64) -> String {
    format!("{}{}", PREFIX, number)
}

/// The first identifier, `SMU_P201817001`
pub fn seed() -> String {
    format(SEED_NUMBER)
}

/// Leading decimal digits after the prefix, if any
pub fn parse_number(id: &str) -> Option<u64> {
    let rest = id.strip_prefix(PREFIX)?;
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Number following the lexicographically greatest existing identifier.
///
/// Falls back to [`SEED_NUMBER`] when there is no such identifier or it does
/// not carry a parseable number.
pub fn next_after(greatest: Option<&str>) -> u64 {
    greatest
        .and_then(parse_number)
        .and_then(|n| n.checked_add(1))
        .unwrap_or(SEED_NUMBER)
}

/// Lexicographically greatest prefixed identifier among `ids`
pub fn greatest<'a, I>(ids: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    ids.into_iter().filter(|id| id.starts_with(PREFIX)).max()
}
