//! Display helpers for addresses, nicknames and dates

use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::alias::{is_bit_domain, is_ens_domain, is_primitive_address};

/// Keep the first `head` and last `tail` characters, joined by `sep`.
///
/// Strings that are already short enough are returned unchanged.
pub fn truncate_middle(s: &str, head: usize, tail: usize, sep: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= head + tail {
        return s.to_string();
    }
    let start: String = chars[..head].iter().collect();
    let end: String = chars[chars.len() - tail..].iter().collect();
    format!("{start}{sep}{end}")
}

/// Address as shown in alias pickers.
///
/// Wallet addresses are shortened and lowercased, with `mail_domain`
/// filled in when the address has no domain; names are unchanged.
pub fn display_address(address: &str, mail_domain: &str) -> String {
    let (local, domain) = match address.split_once('@') {
        Some((local, domain)) => (local, domain),
        None => (address, ""),
    };
    if !is_primitive_address(local) {
        return address.to_string();
    }
    let domain = if domain.is_empty() { mail_domain } else { domain };
    format!("{}@{}", truncate_middle(local, 6, 4, "..."), domain).to_lowercase()
}

/// Nickname suggested for an account that has not set one
pub fn default_nickname(address: &str) -> String {
    let local = address.split('@').next().unwrap_or(address);
    if is_primitive_address(local) {
        truncate_middle(local, 6, 4, "_")
    } else if is_ens_domain(local) || is_bit_domain(local) {
        local.split('.').next().unwrap_or(local).to_string()
    } else {
        "nickname".to_string()
    }
}

/// `Jun 7 - Jun 14, 2022`, or with both years when they differ
pub fn format_date_range(start: Date, end: Date) -> String {
    let month_day = format_description!("[month repr:short] [day padding:none]");
    let full = format_description!("[month repr:short] [day padding:none], [year]");

    let end_str = end.format(full).unwrap_or_default();
    let start_str = if start.year() == end.year() {
        start.format(month_day).unwrap_or_default()
    } else {
        start.format(full).unwrap_or_default()
    };
    format!("{start_str} - {end_str}")
}

/// Message timestamp relative to `now`: time of day for today, month and
/// day within the year, full date otherwise
pub fn format_message_date(date: OffsetDateTime, now: OffsetDateTime) -> String {
    let date = date.to_offset(now.offset());
    let formatted = if date.date() == now.date() {
        date.format(format_description!("[hour]:[minute]"))
    } else if date.year() == now.year() {
        date.format(format_description!("[month repr:short] [day padding:none]"))
    } else {
        date.format(format_description!("[year]-[month]-[day]"))
    };
    formatted.unwrap_or_default()
}
