//! Navigation state snapshot.
//!
//! The front-end keeps the current phase, wizard step and drill parameters
//! in a query string. This module parses that snapshot, writes it back and
//! reconciles it with the session's own configuration.

use crate::{DrillConfig, Operation, Phase};
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;

/// Learning wizard step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Operation,
    BaseNumber,
    Range,
    Practice,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Operation => "operation",
            Step::BaseNumber => "baseNumber",
            Step::Range => "range",
            Step::Practice => "practice",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operation" => Ok(Step::Operation),
            "baseNumber" => Ok(Step::BaseNumber),
            "range" => Ok(Step::Range),
            "practice" => Ok(Step::Practice),
            other => Err(crate::Error::Other(format!("Unknown step: {}", other))),
        }
    }
}

/// Read-only view of the navigation state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NavState {
    pub phase: Phase,
    pub step: Option<Step>,
    pub operation: Option<Operation>,
    pub base_number: Option<i64>,
    pub range_min: Option<i64>,
    pub range_max: Option<i64>,
    pub is_square_numbers: bool,
    pub current_index: Option<usize>,
    pub profile_id: Option<String>,
    pub rainbow: bool,
}

impl NavState {
    /// Parse `phase=test&operation=addition&...`, with or without a leading `?`
    ///
    /// Values that do not parse are treated as absent.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut state = NavState::default();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "phase" => state.phase = value.parse().unwrap_or_default(),
                "step" => state.step = value.parse().ok(),
                "operation" => state.operation = value.parse().ok(),
                "baseNumber" => state.base_number = value.parse().ok(),
                "rangeMin" => state.range_min = value.parse().ok(),
                "rangeMax" => state.range_max = value.parse().ok(),
                "isSquareNumbers" => state.is_square_numbers = value == "true",
                "currentIndex" => state.current_index = value.parse().ok(),
                "profileId" => {
                    state.profile_id = Some(value.into_owned()).filter(|id| !id.is_empty())
                }
                "rainbow" => state.rainbow = value == "true",
                other => tracing::debug!("Ignoring navigation parameter {:?}", other),
            }
        }

        state
    }

    /// Serialize back to a query string (without the leading `?`)
    pub fn to_query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("phase", self.phase.as_str());
        if let Some(step) = self.step {
            query.append_pair("step", step.as_str());
        }
        if let Some(operation) = self.operation {
            query.append_pair("operation", operation.as_str());
        }
        if let Some(base) = self.base_number {
            query.append_pair("baseNumber", &base.to_string());
        }
        if let Some(min) = self.range_min {
            query.append_pair("rangeMin", &min.to_string());
        }
        if let Some(max) = self.range_max {
            query.append_pair("rangeMax", &max.to_string());
        }
        if self.is_square_numbers {
            query.append_pair("isSquareNumbers", "true");
        }
        if let Some(index) = self.current_index {
            query.append_pair("currentIndex", &index.to_string());
        }
        if let Some(id) = &self.profile_id {
            query.append_pair("profileId", id);
        }
        if self.rainbow {
            query.append_pair("rainbow", "true");
        }
        query.finish()
    }

    /// Enough parameters to generate a calculation set
    pub fn has_drill_parameters(&self) -> bool {
        self.operation.is_some() && (self.base_number.is_some() || self.is_square_numbers)
    }

    /// Merge with the session configuration
    ///
    /// Navigation values win where present and non-zero; the session's
    /// values fill the gaps. The result is clamped to the accepted drill
    /// bounds.
    pub fn reconcile(&self, session: &DrillConfig) -> DrillConfig {
        let pick = |nav: Option<i64>, fallback: i64| nav.filter(|v| *v != 0).unwrap_or(fallback);
        DrillConfig {
            operation: self.operation.or(session.operation),
            base_number: pick(self.base_number, session.base_number),
            range_min: pick(self.range_min, session.range_min),
            range_max: pick(self.range_max, session.range_max),
            is_square_numbers: self.is_square_numbers,
        }
        .clamped()
    }

    /// Snapshot describing a drill configuration in `phase`
    pub fn for_drill(phase: Phase, config: &DrillConfig) -> Self {
        NavState {
            phase,
            operation: config.operation,
            base_number: Some(config.base_number),
            range_min: Some(config.range_min),
            range_max: Some(config.range_max),
            is_square_numbers: config.is_square_numbers,
            ..NavState::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_query() {
        let nav = NavState::parse(
            "?phase=test&step=range&operation=division&baseNumber=7&rangeMin=2&rangeMax=20\
             &isSquareNumbers=false&currentIndex=3&profileId=1700000000000&rainbow=true",
        );
        assert_eq!(nav.phase, Phase::Test);
        assert_eq!(nav.step, Some(Step::Range));
        assert_eq!(nav.operation, Some(Operation::Division));
        assert_eq!(nav.base_number, Some(7));
        assert_eq!(nav.range_min, Some(2));
        assert_eq!(nav.range_max, Some(20));
        assert!(!nav.is_square_numbers);
        assert_eq!(nav.current_index, Some(3));
        assert_eq!(nav.profile_id.as_deref(), Some("1700000000000"));
        assert!(nav.rainbow);
    }

    #[test]
    fn test_parse_defaults_and_invalid_values() {
        let nav = NavState::parse("phase=bogus&operation=modulo&baseNumber=abc&unknown=1");
        assert_eq!(nav.phase, Phase::Learning);
        assert_eq!(nav.operation, None);
        assert_eq!(nav.base_number, None);
        assert!(!nav.rainbow);

        assert_eq!(NavState::parse(""), NavState::default());
    }

    #[test]
    fn test_query_roundtrip() {
        let nav = NavState {
            phase: Phase::Practice,
            step: Some(Step::BaseNumber),
            operation: Some(Operation::Multiplication),
            base_number: Some(3),
            is_square_numbers: true,
            profile_id: Some("guest".into()),
            ..NavState::default()
        };
        let query = nav.to_query();
        assert!(query.starts_with("phase=practice"));
        assert_eq!(NavState::parse(&query), nav);
    }

    #[test]
    fn test_reconcile_prefers_navigation() {
        let session = DrillConfig::new(Operation::Addition, 4, 3, 9);
        let nav = NavState::parse("operation=subtraction&rangeMax=15&baseNumber=0");
        let merged = nav.reconcile(&session);

        assert_eq!(merged.operation, Some(Operation::Subtraction));
        assert_eq!(merged.base_number, 4);
        assert_eq!(merged.range_min, 3);
        assert_eq!(merged.range_max, 15);
    }

    #[test]
    fn test_reconcile_clamps_out_of_bounds_values() {
        let nav = NavState::parse(
            "operation=multiplication&baseNumber=9223372036854775807&rangeMin=-5&rangeMax=100000",
        );
        let merged = nav.reconcile(&DrillConfig::default());

        assert_eq!(merged.base_number, 20);
        assert_eq!(merged.range_min, 2);
        assert_eq!(merged.range_max, 20);
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_drill_parameters() {
        assert!(!NavState::parse("operation=addition").has_drill_parameters());
        assert!(NavState::parse("operation=addition&baseNumber=2").has_drill_parameters());
        assert!(NavState::parse("operation=multiplication&isSquareNumbers=true")
            .has_drill_parameters());
        assert!(!NavState::parse("baseNumber=2").has_drill_parameters());
    }

    #[test]
    fn test_for_drill() {
        let config = DrillConfig::new(Operation::Division, 6, 2, 12);
        let nav = NavState::for_drill(Phase::Test, &config);
        assert_eq!(nav.reconcile(&DrillConfig::default()), config);
    }
}
