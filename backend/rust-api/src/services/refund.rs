/// Pro-rata refund for an abandoned attempt.
///
/// Rounding is floor, so the platform never returns more than the unfinished
/// share; the retained amount always covers the questions already delivered.
/// A pool that somehow has zero questions refunds everything: no progress
/// was possible.
pub fn refund(credits_paid: i64, questions_submitted: i64, total_questions: i64) -> i64 {
    debug_assert!(credits_paid >= 0);
    debug_assert!(questions_submitted >= 0);
    debug_assert!(
        total_questions == 0 || questions_submitted < total_questions,
        "fully submitted attempts complete, they are not abandoned"
    );

    if total_questions == 0 {
        return credits_paid;
    }

    let remaining = total_questions.saturating_sub(questions_submitted).max(0);
    credits_paid * remaining / total_questions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_progress_refunds_everything() {
        assert_eq!(refund(1, 0, 10), 1);
        assert_eq!(refund(10, 0, 10), 10);
    }

    #[test]
    fn empty_pool_refunds_everything() {
        assert_eq!(refund(5, 0, 0), 5);
    }

    #[test]
    fn partial_progress_rounds_down() {
        // The worked examples: 4 of 10 submitted.
        assert_eq!(refund(1, 4, 10), 0);
        assert_eq!(refund(10, 4, 10), 6);

        assert_eq!(refund(3, 1, 2), 1);
        assert_eq!(refund(7, 2, 3), 2);
    }

    #[test]
    fn refund_never_exceeds_credits_paid() {
        for paid in 0..=10 {
            for total in 1..=10 {
                for submitted in 0..total {
                    let r = refund(paid, submitted, total);
                    assert!(r >= 0);
                    assert!(r <= paid);
                }
            }
        }
    }

    #[test]
    fn refund_is_monotonic_in_progress() {
        // More submitted questions can only shrink the refund.
        let mut last = refund(10, 0, 10);
        for submitted in 1..10 {
            let r = refund(10, submitted, 10);
            assert!(r <= last);
            last = r;
        }
    }
}
