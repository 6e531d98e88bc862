//! Order declaration parsing.
//!
//! Two shorthand conventions coexist in the groups:
//! - portion form: `红烧肉 米饭，共2份`
//! - headcount-list form: `张三 李四 王五， 共3人` (either comma, any spacing)
//!
//! They are kept apart because headcount totals are later reconciled
//! against the number of listed names and portion totals are not.

use mealtally_core::message::OrderRecord;
use regex::Regex;
use std::sync::LazyLock;

static PORTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.+?)，共(\d+)份").expect("hardcoded regex"));

static DECIMAL_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d$").expect("hardcoded regex"));

static HEADCOUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.+?)[,，]\s*共(\d+)人").expect("hardcoded regex"));

/// A successfully parsed order declaration, not yet tied to a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOrder {
    pub description: String,
    pub declared_count: u32,
    pub is_headcount_list: bool,
}

impl ParsedOrder {
    pub fn into_record(self, sender: &str, timestamp: &str) -> OrderRecord {
        OrderRecord {
            sender: sender.to_string(),
            description: self.description,
            declared_count: self.declared_count,
            is_headcount_list: self.is_headcount_list,
            timestamp: timestamp.to_string(),
        }
    }
}

/// Classify `text` as an order declaration, or `None` if it is not one.
///
/// Text without a comma (ASCII or full-width) is never an order. The
/// portion form is tried first. A zero count or an empty description is
/// not an order.
pub fn parse_order(text: &str) -> Option<ParsedOrder> {
    if !text.contains([',', '，']) {
        return None;
    }

    if let Some(caps) = PORTION_PATTERN.captures(text) {
        return build(caps[1].to_string(), &caps[2], false);
    }

    if let Some(caps) = HEADCOUNT_PATTERN.captures(text) {
        return build(caps[1].trim().to_string(), &caps[2], true);
    }

    None
}

fn build(description: String, count: &str, is_headcount_list: bool) -> Option<ParsedOrder> {
    let declared_count = parse_count(count)?;
    if declared_count == 0 || description.trim().is_empty() {
        return None;
    }
    Some(ParsedOrder {
        description,
        declared_count,
        is_headcount_list,
    })
}

/// Parse a run of decimal digits from any script (`3`, `３`, `٣`).
///
/// `None` on overflow.
fn parse_count(digits: &str) -> Option<u32> {
    digits.chars().try_fold(0u32, |acc, c| {
        let d = decimal_value(c)?;
        acc.checked_mul(10)?.checked_add(d)
    })
}

/// Value of a Unicode decimal digit.
///
/// Decimal digits are assigned in contiguous runs of ten, zero first, so a
/// digit's value is its distance from the start of its run, modulo ten.
fn decimal_value(c: char) -> Option<u32> {
    if let Some(d) = c.to_digit(10) {
        return Some(d);
    }
    if !is_decimal(c) {
        return None;
    }
    let code = c as u32;
    let mut start = code;
    while let Some(prev) = start.checked_sub(1).and_then(char::from_u32) {
        if !is_decimal(prev) {
            break;
        }
        start -= 1;
    }
    Some((code - start) % 10)
}

fn is_decimal(c: char) -> bool {
    let mut buf = [0u8; 4];
    DECIMAL_DIGIT.is_match(c.encode_utf8(&mut buf))
}

/// Number of names in a headcount list (non-empty whitespace tokens).
pub fn listed_names(description: &str) -> u32 {
    description.split_whitespace().count() as u32
}
