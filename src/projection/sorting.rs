//! Business ordering of outcomes within a market and markets within a match.

/// Rank for codes missing from the table. Ties keep their input order.
pub const UNKNOWN_OUTCOME_RANK: u32 = 1000;

/// Display rank of an outcome code name, compared case-insensitively.
pub fn outcome_rank(code_name: &str) -> u32 {
    match code_name.to_lowercase().as_str() {
        "yes" | "home" | "home_draw" | "over" | "odd" | "exact" | "in_90_minutes" => 10,
        "no" | "draw" | "home_away" | "under" | "even" | "range" | "in_extra_time" => 20,
        "none" => 21,
        "" => 22,
        "away" | "away_draw" | "more_than" | "on_penalties" => 30,

        "home-true" | "home_draw-true" | "over-true" | "odd-true" | "yes-true" => 10,
        "home-false" | "home_draw-false" | "over-false" | "odd-false" | "yes-false" => 15,
        "-true" | "home_away-true" | "under-true" | "even-true" | "no-true" => 20,
        "-false" | "home_away-false" | "under-false" | "even-false" | "no-false" => 25,
        "away-true" | "away_draw-true" => 30,
        "away-false" | "away_draw-false" => 35,

        "true" | "h" => 10,
        "false" | "d" => 20,
        "a" => 30,

        _ => UNKNOWN_OUTCOME_RANK,
    }
}

/// Position of `type_id` in the main-market order; unlisted types rank after
/// every listed one.
pub fn market_rank(type_id: &str, main_market_order: &[String]) -> usize {
    main_market_order
        .iter()
        .position(|t| t == type_id)
        .unwrap_or(main_market_order.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_way_outcomes_rank_home_draw_away() {
        assert!(outcome_rank("home") < outcome_rank("draw"));
        assert!(outcome_rank("draw") < outcome_rank("away"));
        assert_eq!(outcome_rank("HOME"), outcome_rank("home"));
    }

    #[test]
    fn boolean_suffixed_codes_interleave() {
        assert!(outcome_rank("home-true") < outcome_rank("home-false"));
        assert!(outcome_rank("home-false") < outcome_rank("-true"));
        assert!(outcome_rank("away-true") < outcome_rank("away-false"));
    }

    #[test]
    fn unknown_code_gets_fallback_rank() {
        assert_eq!(outcome_rank("first_goalscorer"), UNKNOWN_OUTCOME_RANK);
        assert!(outcome_rank("away") < UNKNOWN_OUTCOME_RANK);
    }

    #[test]
    fn unlisted_market_type_sorts_last() {
        let order = vec!["1X2".to_string(), "OU".to_string()];
        assert_eq!(market_rank("1X2", &order), 0);
        assert_eq!(market_rank("OU", &order), 1);
        assert_eq!(market_rank("UNKNOWN", &order), 2);
        assert_eq!(market_rank("", &order), 2);
    }
}
