use std::fmt;

use serde::{Serialize, Serializer};

/// Sub-states of `running`, in route order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    ResolvingTime,
    ResolvingLocation,
    ResolvingLocationName,
    ResolvingNearbyPlaces,
    ResolvingWeather,
    SynthesizingPrompt,
    GeneratingArtifacts,
}

impl Step {
    /// Sub-state entered when `running` is entered.
    pub const INITIAL: Step = Step::ResolvingTime;

    pub const ALL: [Step; 7] = [
        Step::ResolvingTime,
        Step::ResolvingLocation,
        Step::ResolvingLocationName,
        Step::ResolvingNearbyPlaces,
        Step::ResolvingWeather,
        Step::SynthesizingPrompt,
        Step::GeneratingArtifacts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::ResolvingTime => "resolvingTime",
            Step::ResolvingLocation => "resolvingLocation",
            Step::ResolvingLocationName => "resolvingLocationName",
            Step::ResolvingNearbyPlaces => "resolvingNearbyPlaces",
            Step::ResolvingWeather => "resolvingWeather",
            Step::SynthesizingPrompt => "synthesizingPrompt",
            Step::GeneratingArtifacts => "generatingArtifacts",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Active leaf of the state tree, written as a path of tagged variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowState {
    Idle,
    Running(Step),
    Error,
}

impl FlowState {
    /// Every leaf of the tree.
    pub fn leaves() -> impl Iterator<Item = FlowState> {
        [FlowState::Idle, FlowState::Error]
            .into_iter()
            .chain(Step::ALL.into_iter().map(FlowState::Running))
    }

    pub fn is_running(&self) -> bool {
        matches!(self, FlowState::Running(_))
    }

    pub fn step(&self) -> Option<Step> {
        match self {
            FlowState::Running(step) => Some(*step),
            _ => None,
        }
    }

    /// Dotted path, e.g. `running.resolvingWeather`.
    pub fn path(&self) -> String {
        self.to_string()
    }

    /// True when this state is `ancestor` or nested below it.
    pub fn matches(&self, ancestor: &str) -> bool {
        let path = self.path();
        path == ancestor || path.starts_with(&format!("{}.", ancestor))
    }
}

impl Default for FlowState {
    fn default() -> Self {
        FlowState::Idle
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowState::Idle => write!(f, "idle"),
            FlowState::Running(step) => write!(f, "running.{}", step),
            FlowState::Error => write!(f, "error"),
        }
    }
}

impl From<&str> for FlowState {
    fn from(s: &str) -> Self {
        match s {
            "error" => FlowState::Error,
            "running" => FlowState::Running(Step::INITIAL),
            other => other
                .strip_prefix("running.")
                .and_then(|leaf| Step::ALL.into_iter().find(|step| step.as_str() == leaf))
                .map(FlowState::Running)
                .unwrap_or(FlowState::Idle),
        }
    }
}

impl Serialize for FlowState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_round_trip_through_from_str() {
        for state in FlowState::leaves() {
            assert_eq!(FlowState::from(state.path().as_str()), state);
        }
    }

    #[test]
    fn composite_matches_nested_leaf() {
        let state = FlowState::Running(Step::ResolvingWeather);
        assert!(state.matches("running"));
        assert!(state.matches("running.resolvingWeather"));
        assert!(!state.matches("runningX"));
        assert!(!FlowState::Idle.matches("running"));
    }

    #[test]
    fn unknown_path_falls_back_to_idle() {
        assert_eq!(FlowState::from("nowhere"), FlowState::Idle);
        assert_eq!(FlowState::from("running.nowhere"), FlowState::Idle);
    }
}
