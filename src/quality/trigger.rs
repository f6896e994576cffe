use super::thresholds::{DEEP_REVIEW_CADENCE, DEEP_REVIEW_MIN_SESSION, DEEP_REVIEW_QUALITY_FLOOR};

/// Deep-review trigger policy (§4.6), evaluated right after the quick
/// check. Any one rule firing is enough.
pub fn should_trigger_deep_review(
    session_number: i32,
    last_deep_reviewed_number: Option<i32>,
    quick_rating: i32,
) -> bool {
    if session_number >= DEEP_REVIEW_MIN_SESSION && session_number % DEEP_REVIEW_CADENCE == 0 {
        return true;
    }
    if last_deep_reviewed_number.is_none() && session_number >= DEEP_REVIEW_MIN_SESSION {
        return true;
    }
    if let Some(last) = last_deep_reviewed_number {
        if session_number - last >= DEEP_REVIEW_CADENCE {
            return true;
        }
    }
    if quick_rating < DEEP_REVIEW_QUALITY_FLOOR {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_at_exactly_session_five() {
        assert!(should_trigger_deep_review(5, None, 9));
    }

    #[test]
    fn does_not_fire_at_session_four() {
        assert!(!should_trigger_deep_review(4, Some(0), 9));
    }

    #[test]
    fn fires_when_behind_by_cadence() {
        assert!(!should_trigger_deep_review(9, Some(5), 9));
        assert!(should_trigger_deep_review(10, Some(5), 9));
    }

    #[test]
    fn fires_on_low_quality_regardless_of_cadence() {
        assert!(should_trigger_deep_review(11, Some(10), 5));
    }
}
