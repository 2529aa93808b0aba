use std::cmp::Ordering;
use std::net::Ipv4Addr;

/// Dotted-quad IPv4 check done before any ban/unban request.
///
/// The server validates again; this only catches typos early.
pub fn is_valid_ipv4(ip: &str) -> bool {
    ip.parse::<Ipv4Addr>().is_ok()
}

/// Parses the text of a numeric settings field.
///
/// Accepts non-negative whole numbers, with surrounding whitespace. A trailing
/// `.0` style fraction is accepted as long as the value is integral.
pub fn parse_non_negative(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<u64>() {
        return Some(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 => {
            Some(value as u64)
        },
        _ => None,
    }
}

/// Splits free text on commas and whitespace into (valid, invalid) addresses.
pub fn split_ip_list(input: &str) -> (Vec<String>, Vec<String>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();

    for token in input.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if is_valid_ipv4(token) {
            if !valid.iter().any(|ip| ip == token) {
                valid.push(token.to_string());
            }
        } else {
            invalid.push(token.to_string());
        }
    }

    (valid, invalid)
}

/// Numeric address order; entries that are not IPv4 sort last, by text.
pub fn sort_ips(ips: &mut [String]) {
    ips.sort_by(|a, b| {
        match (a.parse::<Ipv4Addr>(), b.parse::<Ipv4Addr>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => a.cmp(b),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_accepts_dotted_quads() {
        assert!(is_valid_ipv4("192.168.0.1"));
        assert!(is_valid_ipv4("0.0.0.0"));
        assert!(is_valid_ipv4("255.255.255.255"));
    }

    #[test]
    fn ipv4_rejects_garbage() {
        assert!(!is_valid_ipv4("999.1.1.1"));
        assert!(!is_valid_ipv4("1.2.3"));
        assert!(!is_valid_ipv4("abc.d.e.f"));
        assert!(!is_valid_ipv4(""));
        assert!(!is_valid_ipv4("1.2.3.4 "));
        assert!(!is_valid_ipv4("::1"));
    }

    #[test]
    fn non_negative_numbers() {
        assert_eq!(parse_non_negative("600"), Some(600));
        assert_eq!(parse_non_negative(" 42 "), Some(42));
        assert_eq!(parse_non_negative("3.0"), Some(3));
        assert_eq!(parse_non_negative("0"), Some(0));
        assert_eq!(parse_non_negative("-1"), None);
        assert_eq!(parse_non_negative("1.5"), None);
        assert_eq!(parse_non_negative("inf"), None);
        assert_eq!(parse_non_negative("NaN"), None);
        assert_eq!(parse_non_negative(""), None);
        assert_eq!(parse_non_negative("ten"), None);
    }

    #[test]
    fn ip_list_is_split_and_deduplicated() {
        let (valid, invalid) = split_ip_list("1.2.3.4, 5.6.7.8\n1.2.3.4  nope,,");
        assert_eq!(valid, vec!["1.2.3.4", "5.6.7.8"]);
        assert_eq!(invalid, vec!["nope"]);
    }

    #[test]
    fn ips_sort_numerically() {
        let mut ips = vec![
            "10.0.0.10".to_string(),
            "bogus".to_string(),
            "9.255.0.1".to_string(),
            "10.0.0.9".to_string(),
        ];
        sort_ips(&mut ips);
        assert_eq!(ips, vec!["9.255.0.1", "10.0.0.9", "10.0.0.10", "bogus"]);
    }
}
