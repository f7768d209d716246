//! Context windows around entity spans

/// Default number of characters captured on each side of an entity
pub const DEFAULT_CONTEXT_WIDTH: usize = 255;

/// Characters immediately before and after a byte span
///
/// Each side holds at most `width` characters and is clipped to the text.
/// Offsets past the end or inside a multi-byte character are clamped
/// rather than rejected.
pub fn context_window(text: &str, start: usize, end: usize, width: usize) -> (&str, &str) {
    let end = ceil_char_boundary(text, end.min(text.len()));
    let start = floor_char_boundary(text, start.min(end));

    if width == 0 {
        return ("", "");
    }

    let before = &text[..start];
    let pre_start = before
        .char_indices()
        .rev()
        .nth(width - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let after = &text[end..];
    let post_end = after
        .char_indices()
        .nth(width)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());

    (&text[pre_start..start], &text[end..post_end])
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_window_in_middle() {
        let text = "Troops left Basra at dawn.";
        let (pre, post) = context_window(text, 12, 17, 6);
        assert_eq!(pre, " left ");
        assert_eq!(post, " at da");
    }

    #[test]
    fn test_window_clipped_at_edges() {
        let text = "Baghdad Is A City.";
        let (pre, post) = context_window(text, 0, 7, 255);
        assert_eq!(pre, "");
        assert_eq!(post, " Is A City.");

        let (pre, post) = context_window(text, 13, 18, 255);
        assert_eq!(pre, "Baghdad Is A ");
        assert_eq!(post, "");
    }

    #[test]
    fn test_window_counts_characters_not_bytes() {
        let text = "Zürich—Genève";
        let start = text.find("Genève").unwrap();
        let (pre, post) = context_window(text, start, text.len(), 2);
        assert_eq!(pre, "h—");
        assert_eq!(post, "");
    }

    #[test]
    fn test_window_zero_width() {
        assert_eq!(context_window("Iraq", 0, 4, 0), ("", ""));
    }

    #[test]
    fn test_window_out_of_range_offsets() {
        let (pre, post) = context_window("Iraq", 10, 20, 3);
        assert_eq!(pre, "raq");
        assert_eq!(post, "");
    }

    proptest! {
        #[test]
        fn prop_window_stays_inside_text(
            text in "\\PC{0,120}",
            a in 0usize..400,
            b in 0usize..400,
            width in 0usize..300,
        ) {
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            let (pre, post) = context_window(&text, start, end, width);

            prop_assert!(pre.chars().count() <= width);
            prop_assert!(post.chars().count() <= width);

            let clamped_end = end.min(text.len());
            let mut pre_end = start.min(clamped_end);
            while !text.is_char_boundary(pre_end) {
                pre_end -= 1;
            }
            prop_assert!(text[..pre_end].ends_with(pre));

            let mut post_start = clamped_end;
            while !text.is_char_boundary(post_start) {
                post_start += 1;
            }
            prop_assert!(text[post_start..].starts_with(post));
        }
    }
}
