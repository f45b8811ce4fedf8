//! Page navigation. Pure index arithmetic, independent of rendering.

/// Advance one page, wrapping to the first page after the last.
pub fn next_page(current: usize, page_count: usize) -> usize {
    if current + 1 >= page_count {
        0
    } else {
        current + 1
    }
}

/// Go back one page, stopping at the first.
pub fn previous_page(current: usize) -> usize {
    current.saturating_sub(1)
}

/// "page 2 of 5 pages" (1-based for display).
pub fn page_label(current: usize, page_count: usize) -> String {
    format!("page {} of {} pages", current + 1, page_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_wraps_after_last_page() {
        assert_eq!(next_page(0, 3), 1);
        assert_eq!(next_page(1, 3), 2);
        assert_eq!(next_page(2, 3), 0);
    }

    #[test]
    fn n_nexts_return_to_start() {
        for pages in 1..=7 {
            let mut idx = 0;
            for _ in 0..pages {
                idx = next_page(idx, pages);
            }
            assert_eq!(idx, 0, "{pages} pages");
        }
    }

    #[test]
    fn next_on_empty_document_stays_at_zero() {
        assert_eq!(next_page(0, 0), 0);
    }

    #[test]
    fn previous_clamps_at_zero() {
        assert_eq!(previous_page(0), 0);
        assert_eq!(previous_page(4), 3);
    }

    #[test]
    fn label_is_one_based() {
        assert_eq!(page_label(0, 3), "page 1 of 3 pages");
    }
}
