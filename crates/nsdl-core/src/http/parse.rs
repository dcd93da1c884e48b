//! Parse HTTP response header lines into ResponseHead.

use super::ResponseHead;

/// Parse collected header lines (status line first) into ResponseHead.
///
/// Callers pass only the lines of the final response; lines from redirect
/// hops are dropped when a new status line arrives.
pub(crate) fn parse_headers(lines: &[String]) -> ResponseHead {
    let mut status = 0;
    let mut content_length = None;
    let mut content_type = None;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            if let Some(code) = line.split_whitespace().nth(1).and_then(|c| c.parse().ok()) {
                status = code;
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                if let Ok(n) = value.parse::<u64>() {
                    content_length = Some(n);
                }
            }
            if name.eq_ignore_ascii_case("content-type") {
                content_type = Some(value.to_string());
            }
        }
    }

    ResponseHead {
        status,
        content_length,
        content_type,
    }
}
