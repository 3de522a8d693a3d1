//! Char-boundary-safe string helpers shared by the summarizers and the
//! sanitizer.

/// Return the largest byte index `<= i` that is a valid char boundary.
pub fn floor_char_boundary(s: &str, i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    let mut pos = i;
    while pos > 0 && !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Keep at most `max` bytes of `s` (cut on a char boundary), no suffix.
pub fn clip(s: &str, max: usize) -> &str {
    &s[..floor_char_boundary(s, max)]
}

/// Truncate to at most `max` bytes, ending with `...` when cut.
pub fn truncate_ellipsis(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let safe = floor_char_boundary(s, max.saturating_sub(3));
        format!("{}...", &s[..safe])
    }
}

/// Append `item` to `list`, then evict from the front until `cap` holds.
pub fn push_bounded<T>(list: &mut Vec<T>, item: T, cap: usize) {
    list.push(item);
    evict_oldest(list, cap);
}

/// Drop the oldest (front) entries so that `list.len() <= cap`.
pub fn evict_oldest<T>(list: &mut Vec<T>, cap: usize) {
    if list.len() > cap {
        let excess = list.len() - cap;
        list.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_char_boundary_basic() {
        assert_eq!(floor_char_boundary("hello", 3), 3);
        assert_eq!(floor_char_boundary("hello", 100), 5);
        // '後' = 3 bytes
        let s = "ab後cd";
        assert_eq!(floor_char_boundary(s, 3), 2);
        assert_eq!(floor_char_boundary(s, 4), 2);
        assert_eq!(floor_char_boundary(s, 5), 5);
    }

    #[test]
    fn truncate_ellipsis_respects_limit() {
        assert_eq!(truncate_ellipsis("short", 10), "short");
        let out = truncate_ellipsis(&"a".repeat(50), 10);
        assert_eq!(out, "aaaaaaa...");
        assert!(out.len() <= 10);
    }

    #[test]
    fn clip_multibyte() {
        assert_eq!(clip("ab後cd", 4), "ab");
    }

    #[test]
    fn bounded_push_evicts_fifo() {
        let mut list = Vec::new();
        for i in 0..15 {
            push_bounded(&mut list, i, 10);
        }
        assert_eq!(list, (5..15).collect::<Vec<_>>());
    }
}
