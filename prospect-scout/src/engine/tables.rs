// Hand-tuned calibration tables: level defaults, tool weights, age brackets,
// career bands, and success curves.

use crate::model::Level;

// ---------------------------------------------------------------------------
// Level factors
// ---------------------------------------------------------------------------

pub const LEVEL_WEIGHT_MIN: f64 = 0.1;
pub const LEVEL_WEIGHT_MAX: f64 = 1.0;

/// Static level factor used before (or instead of) data-driven calibration.
pub fn default_level_factor(level: Level) -> f64 {
    match level {
        Level::Mlb => 1.0,
        Level::Aaa => 0.8,
        Level::Aa => 0.6,
        Level::HighA => 0.4,
        Level::A => 0.3,
        Level::Rookie => 0.2,
        Level::Ncaa => 0.2,
        Level::HighSchool => 0.1,
        Level::Unknown => 0.5,
    }
}

// ---------------------------------------------------------------------------
// Age factor
// ---------------------------------------------------------------------------

/// Developmental age multiplier: rises into the mid-twenties, plateaus
/// through 29, then declines 5% a year with a floor of 0.6.
pub fn age_factor(age: u32) -> f64 {
    match age {
        0..=19 => 0.7,
        20..=24 => 0.9,
        25..=29 => 1.0,
        _ => (1.0 - f64::from(age - 30) * 0.05).max(0.6),
    }
}

// ---------------------------------------------------------------------------
// Grades
// ---------------------------------------------------------------------------

pub const DEFAULT_TOOL_GRADE: f64 = 40.0;
pub const GRADE_MAX: f64 = 99.0;
pub const CONFIDENCE_MAX: f64 = 100.0;

/// Overall-rating weights for position players.
#[derive(Debug, Clone, Copy)]
pub struct HitterWeights {
    pub contact_left: f64,
    pub contact_right: f64,
    pub power_left: f64,
    pub power_right: f64,
    pub vision: f64,
    pub discipline: f64,
    pub fielding: f64,
    pub arm_strength: f64,
    pub arm_accuracy: f64,
    pub speed: f64,
    pub stealing: f64,
}

pub const HITTER_WEIGHTS: HitterWeights = HitterWeights {
    contact_left: 0.10,
    contact_right: 0.10,
    power_left: 0.10,
    power_right: 0.10,
    vision: 0.10,
    discipline: 0.10,
    fielding: 0.10,
    arm_strength: 0.05,
    arm_accuracy: 0.05,
    speed: 0.10,
    stealing: 0.05,
};

/// Overall-rating weights for pitchers. The defensive and baserunning tools
/// share the hitter grades.
#[derive(Debug, Clone, Copy)]
pub struct PitcherWeights {
    pub k_rating: f64,
    pub bb_rating: f64,
    pub gb_rating: f64,
    pub hr_rating: f64,
    pub command_rating: f64,
    pub fielding: f64,
    pub arm_strength: f64,
    pub speed: f64,
    pub stealing: f64,
}

pub const PITCHER_WEIGHTS: PitcherWeights = PitcherWeights {
    k_rating: 0.20,
    bb_rating: 0.20,
    gb_rating: 0.10,
    hr_rating: 0.10,
    command_rating: 0.20,
    fielding: 0.05,
    arm_strength: 0.05,
    speed: 0.05,
    stealing: 0.05,
};

/// Two-way overall: the stronger side counts for this share.
pub const TWO_WAY_PRIMARY_SHARE: f64 = 0.6;
pub const TWO_WAY_SECONDARY_SHARE: f64 = 0.4;

/// Comp growth only counts for comps with at least this many seasons.
pub const MIN_GROWTH_SEASONS: usize = 3;

// ---------------------------------------------------------------------------
// Career projection
// ---------------------------------------------------------------------------

/// Remaining productive seasons and rate decay for one age bracket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeBracket {
    /// Exclusive upper age bound; `None` for the last bracket.
    pub below: Option<u32>,
    pub remaining_years: f64,
    pub decay: f64,
}

pub const AGE_BRACKETS: [AgeBracket; 4] = [
    AgeBracket {
        below: Some(30),
        remaining_years: 8.0,
        decay: 0.8,
    },
    AgeBracket {
        below: Some(35),
        remaining_years: 4.0,
        decay: 0.6,
    },
    AgeBracket {
        below: Some(38),
        remaining_years: 2.0,
        decay: 0.35,
    },
    AgeBracket {
        below: None,
        remaining_years: 1.0,
        decay: 0.1,
    },
];

pub fn age_bracket(age: u32) -> AgeBracket {
    AGE_BRACKETS
        .into_iter()
        .find(|b| b.below.map_or(true, |limit| age < limit))
        .unwrap_or(AGE_BRACKETS[AGE_BRACKETS.len() - 1])
}

/// Seasons averaged for a graduated player's recent value rate.
pub const RECENT_RATE_SEASONS: usize = 3;

/// Prospect ETA offset when comparables give no debut-age signal.
pub const FALLBACK_ETA_YEARS: i32 = 2;

/// Ceiling and floor multiples of the projection when there are no comps.
pub const NO_COMP_CEILING_MULTIPLE: f64 = 1.5;
pub const NO_COMP_FLOOR_MULTIPLE: f64 = 0.5;

/// Career outcome bands, highest first. Values below the last threshold
/// fall into `BELOW_ALL_BANDS`.
pub const CAREER_BANDS: [(f64, &str); 6] = [
    (70.0, "Hall of Fame Candidate"),
    (50.0, "All-Star Level"),
    (30.0, "MLB Regular"),
    (15.0, "MLB Role Player"),
    (5.0, "MLB Bench Player"),
    (0.0, "Quad-A Player"),
];
pub const BELOW_ALL_BANDS: &str = "Minor League Player";

pub fn career_label(value: f64) -> &'static str {
    CAREER_BANDS
        .iter()
        .find(|(threshold, _)| value >= *threshold)
        .map_or(BELOW_ALL_BANDS, |(_, label)| label)
}

pub const HIGH_RISK_SPREAD: f64 = 20.0;
pub const MEDIUM_RISK_SPREAD: f64 = 10.0;

/// Logistic curve mapping projected cumulative value to a success
/// probability.
#[derive(Debug, Clone, Copy)]
pub struct SuccessCurve {
    pub midpoint: f64,
    pub slope: f64,
}

pub const PITCHER_SUCCESS_CURVE: SuccessCurve = SuccessCurve {
    midpoint: 50.0,
    slope: 0.18,
};

pub const HITTER_SUCCESS_CURVE: SuccessCurve = SuccessCurve {
    midpoint: 60.0,
    slope: 0.20,
};

pub const SUCCESS_PROBABILITY_CAP: f64 = 0.99;

impl SuccessCurve {
    pub fn probability(&self, projected: f64) -> f64 {
        let p = 1.0 / (1.0 + (-self.slope * (projected - self.midpoint)).exp());
        if p.is_finite() {
            p.clamp(0.0, SUCCESS_PROBABILITY_CAP)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn default_level_factors_are_bounded() {
        for level in Level::ALL {
            let f = default_level_factor(level);
            assert!((LEVEL_WEIGHT_MIN..=LEVEL_WEIGHT_MAX).contains(&f), "{level}: {f}");
        }
        assert!(approx_eq(default_level_factor(Level::Mlb), 1.0));
    }

    #[test]
    fn hitter_weights_sum_to_one() {
        let w = HITTER_WEIGHTS;
        let sum = w.contact_left
            + w.contact_right
            + w.power_left
            + w.power_right
            + w.vision
            + w.discipline
            + w.fielding
            + w.arm_strength
            + w.arm_accuracy
            + w.speed
            + w.stealing;
        assert!(approx_eq(sum, 1.0));
    }

    #[test]
    fn pitcher_weights_sum_to_one() {
        let w = PITCHER_WEIGHTS;
        let sum = w.k_rating
            + w.bb_rating
            + w.gb_rating
            + w.hr_rating
            + w.command_rating
            + w.fielding
            + w.arm_strength
            + w.speed
            + w.stealing;
        assert!(approx_eq(sum, 1.0));
    }

    #[test]
    fn age_factor_brackets() {
        assert!(approx_eq(age_factor(18), 0.7));
        assert!(approx_eq(age_factor(22), 0.9));
        assert!(approx_eq(age_factor(27), 1.0));
        assert!(approx_eq(age_factor(32), 0.9));
        assert!(approx_eq(age_factor(45), 0.6));
    }

    #[test]
    fn age_brackets_cover_all_ages() {
        assert!(approx_eq(age_bracket(24).remaining_years, 8.0));
        assert!(approx_eq(age_bracket(30).decay, 0.6));
        assert!(approx_eq(age_bracket(37).remaining_years, 2.0));
        assert!(approx_eq(age_bracket(38).decay, 0.1));
        assert!(approx_eq(age_bracket(60).remaining_years, 1.0));
    }

    #[test]
    fn career_labels_follow_bands() {
        assert_eq!(career_label(85.0), "Hall of Fame Candidate");
        assert_eq!(career_label(70.0), "Hall of Fame Candidate");
        assert_eq!(career_label(52.3), "All-Star Level");
        assert_eq!(career_label(30.0), "MLB Regular");
        assert_eq!(career_label(16.0), "MLB Role Player");
        assert_eq!(career_label(5.0), "MLB Bench Player");
        assert_eq!(career_label(0.0), "Quad-A Player");
        assert_eq!(career_label(-0.4), "Minor League Player");
    }

    #[test]
    fn success_curves_are_capped_and_ordered() {
        assert!(PITCHER_SUCCESS_CURVE.probability(500.0) <= SUCCESS_PROBABILITY_CAP);
        assert!(PITCHER_SUCCESS_CURVE.probability(-500.0) >= 0.0);
        assert!(approx_eq(PITCHER_SUCCESS_CURVE.probability(50.0), 0.5));
        assert!(approx_eq(HITTER_SUCCESS_CURVE.probability(60.0), 0.5));
        // At the same projected value, the lower pitcher midpoint wins.
        assert!(PITCHER_SUCCESS_CURVE.probability(40.0) > HITTER_SUCCESS_CURVE.probability(40.0));
    }
}
