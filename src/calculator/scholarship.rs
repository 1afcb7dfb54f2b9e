use thiserror::Error;

const MID_TERM_WEIGHT: f64 = 0.3;
const END_TERM_WEIGHT: f64 = 0.3;
const FINAL_WEIGHT: f64 = 0.4;

const RETAKE_TOTAL: f64 = 50.0;
const SCHOLARSHIP_TOTAL: f64 = 70.0;
const HIGH_SCHOLARSHIP_TOTAL: f64 = 90.0;
/// Lowest final-exam score that counts as passing the final at all.
const FINAL_EXAM_MINIMUM: f64 = 50.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("{0} is outside of 0..=100")]
    OutOfRange(f64),
}

/// Parses a grade percentage; accepts `,` as the decimal separator.
pub fn parse_grade(input: &str) -> Result<f64, ValidationError> {
    let normalized = input.trim().replace(',', ".");
    let value: f64 = normalized
        .parse()
        .map_err(|_| ValidationError::NotANumber(input.trim().to_string()))?;
    validate_grade(value)
}

fn validate_grade(value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::OutOfRange(value));
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    Reachable(f64),
    Unreachable,
}

/// Minimum final-exam percentages for each target, plus the best possible total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub current: f64,
    pub retake_threshold: f64,
    pub scholarship_threshold: f64,
    pub high_scholarship_threshold: Threshold,
    pub final_if_max: f64,
}

pub fn project(mid_term: f64, end_term: f64) -> Result<Projection, ValidationError> {
    let mid_term = validate_grade(mid_term)?;
    let end_term = validate_grade(end_term)?;

    let current = MID_TERM_WEIGHT * mid_term + END_TERM_WEIGHT * end_term;
    let needed = |target: f64| (target - current) / FINAL_WEIGHT;

    let high = needed(HIGH_SCHOLARSHIP_TOTAL).max(0.0);
    Ok(Projection {
        current,
        retake_threshold: needed(RETAKE_TOTAL).max(FINAL_EXAM_MINIMUM),
        scholarship_threshold: needed(SCHOLARSHIP_TOTAL).max(FINAL_EXAM_MINIMUM),
        high_scholarship_threshold: if high > 100.0 {
            Threshold::Unreachable
        } else {
            Threshold::Reachable(high)
        },
        final_if_max: current + FINAL_WEIGHT * 100.0,
    })
}

/// Absorbs binary rounding noise such as `99.99999999999999` before truncating.
const TRUNCATION_TOLERANCE: f64 = 1e-9;

/// Whole-percent display value; every figure is truncated the same way.
pub fn percent(value: f64) -> i64 {
    (value + TRUNCATION_TOLERANCE).trunc() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_project_fifty_fifty() {
        let p = project(50.0, 50.0).unwrap();
        assert!(approx(p.current, 30.0));
        assert!(approx(p.retake_threshold, 50.0));
        assert!(approx(p.scholarship_threshold, 100.0));
        assert_eq!(p.high_scholarship_threshold, Threshold::Unreachable);
        assert!(approx(p.final_if_max, 70.0));
    }

    #[test]
    fn test_project_ninety_ninety() {
        let p = project(90.0, 90.0).unwrap();
        assert!(approx(p.current, 54.0));
        assert!(approx(p.retake_threshold, 50.0));
        assert!(approx(p.scholarship_threshold, 50.0));
        match p.high_scholarship_threshold {
            Threshold::Reachable(v) => assert!(approx(v, 90.0)),
            Threshold::Unreachable => panic!("90% final should reach the high scholarship"),
        }
        assert!(approx(p.final_if_max, 94.0));
    }

    #[test]
    fn test_project_rejects_out_of_range() {
        assert_eq!(
            project(101.0, 50.0).unwrap_err(),
            ValidationError::OutOfRange(101.0)
        );
        assert!(project(50.0, -0.5).is_err());
        assert!(project(f64::NAN, 50.0).is_err());
    }

    #[test]
    fn test_perfect_attestations() {
        let p = project(100.0, 100.0).unwrap();
        assert!(approx(p.current, 60.0));
        assert_eq!(p.high_scholarship_threshold, Threshold::Reachable(75.0));
        assert_eq!(percent(p.final_if_max), 100);
    }

    #[test]
    fn test_parse_grade() {
        assert_eq!(parse_grade(" 87.5 "), Ok(87.5));
        assert_eq!(parse_grade("66,6"), Ok(66.6));
        assert_eq!(
            parse_grade("abc"),
            Err(ValidationError::NotANumber("abc".to_string()))
        );
        assert_eq!(parse_grade("150"), Err(ValidationError::OutOfRange(150.0)));
    }

    #[test]
    fn test_percent_truncates() {
        assert_eq!(percent(66.99), 66);
        assert_eq!(percent(50.0), 50);
        assert_eq!(percent(99.999_999_999_999_99), 100);
    }
}
