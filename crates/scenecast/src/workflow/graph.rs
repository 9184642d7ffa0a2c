//! Static state graph.
//!
//! ```text
//! idle --START--> running
//!   running.resolvingTime          (entry: stamp time, after delay)
//!     -> resolvingLocation         (device-location route only)
//!     -> resolvingLocationName
//!     -> resolvingNearbyPlaces
//!     -> resolvingWeather
//!     -> synthesizingPrompt
//!     -> generatingArtifacts --> idle
//! any failure transition -------> error   (terminal)
//! ```

use std::collections::HashMap;
use std::time::Duration;

use super::event::EventKind;
use super::reducers::{self, Reducer};
use super::state::{FlowState, Step};

/// Delay between entering `resolvingTime` and leaving it.
pub const DEFAULT_TIME_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    StampTime,
}

/// The step invoker a state owns while it is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Invocation {
    ResolveLocation,
    ReverseGeocode,
    NearbyPlaces,
    Weather,
    SynthesizePrompt,
    GenerateArtifacts,
}

impl Invocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Invocation::ResolveLocation => "resolve_location",
            Invocation::ReverseGeocode => "reverse_geocode",
            Invocation::NearbyPlaces => "nearby_places",
            Invocation::Weather => "weather",
            Invocation::SynthesizePrompt => "synthesize_prompt",
            Invocation::GenerateArtifacts => "generate_artifacts",
        }
    }
}

/// Which state follows `resolvingTime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    /// Keep the context's coordinates and go straight to reverse geocoding.
    #[default]
    Default,
    /// Ask the location resolver for coordinates first.
    DeviceLocation,
}

#[derive(Debug, Clone, Default)]
pub struct StateNode {
    pub entry: Vec<EntryAction>,
    pub invoke: Option<Invocation>,
    /// Fires `DELAY_ELAPSED` this long after entry.
    pub after: Option<Duration>,
}

#[derive(Clone)]
pub struct Transition {
    pub target: FlowState,
    /// Applied in order, before the target is entered.
    pub reducers: Vec<Reducer>,
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("target", &self.target)
            .field("reducers", &self.reducers.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct StateGraph {
    route: Route,
    nodes: HashMap<FlowState, StateNode>,
    transitions: HashMap<(FlowState, EventKind), Transition>,
}

impl StateGraph {
    pub fn standard() -> Self {
        Self::new(Route::Default, DEFAULT_TIME_DELAY)
    }

    pub fn with_device_location() -> Self {
        Self::new(Route::DeviceLocation, DEFAULT_TIME_DELAY)
    }

    pub fn new(route: Route, time_delay: Duration) -> Self {
        use FlowState::{Error, Idle, Running};
        use Step::*;

        let mut graph = Self {
            route,
            nodes: HashMap::new(),
            transitions: HashMap::new(),
        };

        graph.on(Idle, EventKind::Start, Running(Step::INITIAL), &[]);

        graph.node(
            Running(ResolvingTime),
            StateNode {
                entry: vec![EntryAction::StampTime],
                invoke: None,
                after: Some(time_delay),
            },
        );
        let after_time = match route {
            Route::Default => Running(ResolvingLocationName),
            Route::DeviceLocation => Running(ResolvingLocation),
        };
        graph.on(Running(ResolvingTime), EventKind::DelayElapsed, after_time, &[]);

        graph.invoking(Running(ResolvingLocation), Invocation::ResolveLocation);
        graph.on(
            Running(ResolvingLocation),
            EventKind::LocationResolved,
            Running(ResolvingLocationName),
            &[reducers::set_location],
        );
        graph.on(
            Running(ResolvingLocation),
            EventKind::LocationFailed,
            Error,
            &[reducers::set_error],
        );

        graph.invoking(Running(ResolvingLocationName), Invocation::ReverseGeocode);
        graph.on(
            Running(ResolvingLocationName),
            EventKind::LocationNameResolved,
            Running(ResolvingNearbyPlaces),
            &[reducers::set_location_description],
        );
        graph.on(
            Running(ResolvingLocationName),
            EventKind::LocationNameFailed,
            Error,
            &[reducers::set_error],
        );

        graph.invoking(Running(ResolvingNearbyPlaces), Invocation::NearbyPlaces);
        graph.on(
            Running(ResolvingNearbyPlaces),
            EventKind::NearbyPlacesResolved,
            Running(ResolvingWeather),
            &[reducers::set_nearby_places],
        );
        // Best effort: nearby places only decorate the prompt.
        graph.on(
            Running(ResolvingNearbyPlaces),
            EventKind::NearbyPlacesFailed,
            Running(ResolvingWeather),
            &[reducers::clear_nearby_places],
        );

        graph.invoking(Running(ResolvingWeather), Invocation::Weather);
        graph.on(
            Running(ResolvingWeather),
            EventKind::WeatherResolved,
            Running(SynthesizingPrompt),
            &[reducers::set_weather, reducers::set_temperature],
        );
        graph.on(
            Running(ResolvingWeather),
            EventKind::WeatherFailed,
            Error,
            &[reducers::set_error],
        );

        graph.invoking(Running(SynthesizingPrompt), Invocation::SynthesizePrompt);
        graph.on(
            Running(SynthesizingPrompt),
            EventKind::PromptReady,
            Running(GeneratingArtifacts),
            &[reducers::set_prompt],
        );
        graph.on(
            Running(SynthesizingPrompt),
            EventKind::PromptFailed,
            Error,
            &[reducers::set_error],
        );

        graph.invoking(Running(GeneratingArtifacts), Invocation::GenerateArtifacts);
        graph.on(
            Running(GeneratingArtifacts),
            EventKind::ArtifactsGenerated,
            Idle,
            &[reducers::set_artifacts],
        );
        graph.on(
            Running(GeneratingArtifacts),
            EventKind::ArtifactsFailed,
            Error,
            &[reducers::set_error],
        );

        // `error` declares no transitions, so nothing leaves it.
        graph
    }

    fn node(&mut self, state: FlowState, node: StateNode) {
        self.nodes.insert(state, node);
    }

    fn invoking(&mut self, state: FlowState, invocation: Invocation) {
        self.node(
            state,
            StateNode {
                invoke: Some(invocation),
                ..StateNode::default()
            },
        );
    }

    fn on(&mut self, from: FlowState, event: EventKind, target: FlowState, reducers: &[Reducer]) {
        self.transitions.insert(
            (from, event),
            Transition {
                target,
                reducers: reducers.to_vec(),
            },
        );
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn initial(&self) -> FlowState {
        FlowState::Idle
    }

    /// Entry actions, invoker and timer of `state`. States without any are
    /// passive.
    pub fn state_node(&self, state: FlowState) -> Option<&StateNode> {
        self.nodes.get(&state)
    }

    /// The transition `state` declares for `event`, if any.
    pub fn transition(&self, state: FlowState, event: EventKind) -> Option<&Transition> {
        self.transitions.get(&(state, event))
    }

    /// Events `state` reacts to.
    pub fn accepted_events(&self, state: FlowState) -> Vec<EventKind> {
        let mut events: Vec<EventKind> = self
            .transitions
            .keys()
            .filter(|(from, _)| *from == state)
            .map(|(_, event)| *event)
            .collect();
        events.sort_by_key(|e| e.as_str());
        events
    }
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::standard()
    }
}
