//! The interpreter that drives a [`StateGraph`].
//!
//! It owns the current state and the context. Commands and step outcomes
//! are handled one at a time: reducers of the firing transition run first,
//! then the old state is exited (its timer or invoker is aborted) and the
//! target is entered (entry actions run, then its timer or invoker is
//! spawned). Spawned work reports back through a channel. Each report is
//! stamped with the epoch of the state that spawned it, and reports from a
//! state that has since been exited are dropped.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    collaborators::Collaborators,
    config::Config,
    metrics,
    workflow::{
        graph::{EntryAction, Invocation, StateGraph},
        reducers, Context, EventKind, FlowEvent, FlowState, StepExecutor,
    },
    Error, Result,
};

/// A step outcome tagged with the state entry that produced it.
#[derive(Debug)]
struct Envelope {
    epoch: u64,
    event: FlowEvent,
}

/// Point-in-time view of an orchestrator.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: Uuid,
    pub state: FlowState,
    pub context: Context,
}

impl Snapshot {
    pub fn to_json(&self, include_artifacts: bool) -> Value {
        serde_json::json!({
            "id": self.id.to_string(),
            "state": self.state,
            "context": self.context.to_json(include_artifacts),
        })
    }
}

struct Interpreter {
    id: Uuid,
    graph: StateGraph,
    executor: StepExecutor,
    state: FlowState,
    context: Context,
    epoch: u64,
    active: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<Envelope>,
}

impl Interpreter {
    /// Apply `event` against the current state. Returns whether a transition
    /// fired.
    fn process(&mut self, event: FlowEvent) -> bool {
        let kind = event.kind();
        let Some(transition) = self.graph.transition(self.state, kind).cloned() else {
            if kind == EventKind::Start {
                warn!("[{}] START ignored, orchestrator is {}", self.id, self.state);
            } else {
                debug!("[{}] Ignoring {} in state {}", self.id, kind, self.state);
            }
            metrics::EVENTS_IGNORED_TOTAL
                .with_label_values(&[kind.as_str(), "unhandled"])
                .inc();
            return false;
        };

        for reduce in &transition.reducers {
            if let Some(update) = reduce(&self.context, &event) {
                self.context.apply(update);
            }
        }

        let from = self.state;
        self.exit();
        self.enter(transition.target);
        self.record_run_outcome(from, kind);
        true
    }

    /// Deliver a step outcome unless its state has already been exited.
    fn dispatch(&mut self, envelope: Envelope) -> bool {
        if envelope.epoch != self.epoch {
            let kind = envelope.event.kind();
            debug!(
                "[{}] Dropping stale {} (epoch {} != {})",
                self.id, kind, envelope.epoch, self.epoch
            );
            metrics::EVENTS_IGNORED_TOTAL
                .with_label_values(&[kind.as_str(), "stale"])
                .inc();
            return false;
        }
        self.process(envelope.event)
    }

    fn exit(&mut self) {
        if let Some(task) = self.active.take() {
            task.abort();
        }
        self.epoch += 1;
    }

    fn enter(&mut self, target: FlowState) {
        info!("[{}] {} -> {}", self.id, self.state, target);
        self.state = target;
        metrics::STATES_ENTERED_TOTAL
            .with_label_values(&[target.path().as_str()])
            .inc();

        let Some(node) = self.graph.state_node(target).cloned() else {
            return;
        };

        for action in &node.entry {
            match action {
                EntryAction::StampTime => {
                    let now = self.executor.collaborators().clock.now();
                    if let Some(update) = reducers::stamp_time(&self.context, now) {
                        self.context.apply(update);
                    }
                }
            }
        }

        if let Some(delay) = node.after {
            self.active = Some(self.schedule_delay(delay));
        } else if let Some(invocation) = node.invoke {
            self.active = Some(self.invoke(invocation));
        }
    }

    fn schedule_delay(&self, delay: Duration) -> JoinHandle<()> {
        let tx = self.events_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Envelope {
                epoch,
                event: FlowEvent::DelayElapsed,
            });
        })
    }

    fn invoke(&self, invocation: Invocation) -> JoinHandle<()> {
        let tx = self.events_tx.clone();
        let epoch = self.epoch;
        let executor = self.executor.clone();
        let snapshot = self.context.clone();
        debug!("[{}] Invoking {}", self.id, invocation.as_str());
        tokio::spawn(async move {
            let event = executor.execute(invocation, &snapshot).await;
            let _ = tx.send(Envelope { epoch, event });
        })
    }

    fn record_run_outcome(&self, from: FlowState, kind: EventKind) {
        match (from.is_running(), self.state) {
            (false, FlowState::Running(_)) => metrics::RUNS_STARTED_TOTAL.inc(),
            (true, FlowState::Idle) => {
                info!("[{}] Run completed", self.id);
                metrics::RUNS_SUCCEEDED_TOTAL.inc();
            }
            (true, FlowState::Error) => {
                error!(
                    "[{}] Run failed in {} on {}: {}",
                    self.id,
                    from,
                    kind,
                    self.context.last_error.as_deref().unwrap_or("unknown error")
                );
                metrics::RUNS_FAILED_TOTAL.inc();
            }
            _ => {}
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            id: self.id,
            state: self.state,
            context: self.context.clone(),
        }
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        if let Some(task) = self.active.take() {
            task.abort();
        }
    }
}

/// Drives one workflow instance.
///
/// `start` and `handle_event` act synchronously and must be called from
/// within a Tokio runtime, because entering a state may spawn its timer or
/// invoker. Their results arrive on an internal queue that
/// [`Orchestrator::run_until_settled`] drains.
pub struct Orchestrator {
    machine: Interpreter,
    events_rx: mpsc::UnboundedReceiver<Envelope>,
}

impl Orchestrator {
    pub fn new(graph: StateGraph, collaborators: Collaborators, context: Context) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = graph.initial();
        Self {
            machine: Interpreter {
                id: Uuid::new_v4(),
                graph,
                executor: StepExecutor::new(collaborators),
                state,
                context,
                epoch: 0,
                active: None,
                events_tx,
            },
            events_rx,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.flow.graph(),
            Collaborators::from_config(config)?,
            Context::with_location(config.location.fallback),
        ))
    }

    pub fn id(&self) -> Uuid {
        self.machine.id
    }

    pub fn state(&self) -> FlowState {
        self.machine.state
    }

    pub fn context(&self) -> &Context {
        &self.machine.context
    }

    pub fn graph(&self) -> &StateGraph {
        &self.machine.graph
    }

    pub fn snapshot(&self) -> Snapshot {
        self.machine.snapshot()
    }

    /// Send `START`. Only `idle` reacts to it; anywhere else it is ignored.
    pub fn start(&mut self) -> bool {
        self.handle_event(FlowEvent::Start)
    }

    /// Deliver an event to the current state. Events the state declares no
    /// transition for are ignored and `false` is returned.
    pub fn handle_event(&mut self, event: FlowEvent) -> bool {
        self.machine.process(event)
    }

    /// Wait for the next queued step outcome and deliver it. Returns `None`
    /// when nothing is pending.
    pub async fn step(&mut self) -> Option<bool> {
        self.machine.active.as_ref()?;
        let envelope = self.events_rx.recv().await?;
        Some(self.machine.dispatch(envelope))
    }

    /// Deliver step outcomes until the orchestrator leaves `running`.
    pub async fn run_until_settled(&mut self) -> Snapshot {
        while self.machine.state.is_running() {
            if self.step().await.is_none() {
                break;
            }
        }
        self.snapshot()
    }

    /// Move the orchestrator onto its own task and control it through the
    /// returned handle.
    pub fn spawn(mut self) -> OrchestratorHandle {
        let id = self.machine.id;
        let (commands_tx, mut commands_rx) = mpsc::channel::<Command>(16);
        let (snapshots_tx, snapshots_rx) = watch::channel(self.snapshot());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    command = commands_rx.recv() => match command {
                        Some(Command::Event(event, reply)) => {
                            let fired = self.machine.process(event);
                            snapshots_tx.send_replace(self.machine.snapshot());
                            let _ = reply.send(fired);
                        }
                        None => break,
                    },
                    Some(envelope) = self.events_rx.recv() => {
                        if self.machine.dispatch(envelope) {
                            snapshots_tx.send_replace(self.machine.snapshot());
                        }
                    }
                }
            }
            debug!("[{}] Orchestrator task stopped", id);
        });

        OrchestratorHandle {
            id,
            commands: commands_tx,
            snapshots: snapshots_rx,
        }
    }
}

enum Command {
    Event(FlowEvent, oneshot::Sender<bool>),
}

/// Cloneable handle to a spawned [`Orchestrator`].
#[derive(Clone)]
pub struct OrchestratorHandle {
    id: Uuid,
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

impl OrchestratorHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn start(&self) -> Result<bool> {
        self.send(FlowEvent::Start).await
    }

    pub async fn send(&self, event: FlowEvent) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Event(event, reply_tx))
            .await
            .map_err(|_| Error::Internal("Orchestrator has stopped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| Error::Internal("Orchestrator dropped the reply".to_string()))
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Receives a new snapshot after every transition.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Wait until the orchestrator is no longer `running`.
    pub async fn settled(&self) -> Result<Snapshot> {
        let mut rx = self.subscribe();
        loop {
            {
                let current = rx.borrow_and_update();
                if !current.state.is_running() {
                    return Ok(current.clone());
                }
            }
            rx.changed()
                .await
                .map_err(|_| Error::Internal("Orchestrator has stopped".to_string()))?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        FixedClock, MockArtifactGenerator, MockLocationResolver, MockPlacesLookup,
        MockReverseGeocoder, MockWeatherLookup,
    };
    use crate::workflow::{
        prompt::{PromptSynthesizer, DEFAULT_PROMPT_TEMPLATE},
        Coordinates, LocationError, Step,
    };
    use chrono::{DateTime, FixedOffset, TimeZone};
    use serde_json::json;
    use std::sync::Arc;

    fn noon() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 5, 12, 30, 0)
            .unwrap()
    }

    struct Mocks {
        location: MockLocationResolver,
        geocoder: MockReverseGeocoder,
        places: MockPlacesLookup,
        weather: MockWeatherLookup,
        generator: MockArtifactGenerator,
    }

    impl Mocks {
        fn empty() -> Self {
            Self {
                location: MockLocationResolver::new(),
                geocoder: MockReverseGeocoder::new(),
                places: MockPlacesLookup::new(),
                weather: MockWeatherLookup::new(),
                generator: MockArtifactGenerator::new(),
            }
        }

        fn happy() -> Self {
            let mut mocks = Self::empty();
            mocks
                .location
                .expect_resolve()
                .returning(|| Ok(Coordinates::new(40.6892, -74.0445)));
            mocks
                .geocoder
                .expect_reverse()
                .returning(|_| Ok(json!({ "display_name": "Eiffel Tower, Paris" })));
            mocks.places.expect_nearby().returning(|_| {
                Ok(json!({ "features": [{ "properties": { "category": "monument, landmark" } }] }))
            });
            mocks.weather.expect_current().returning(|_| {
                Ok(json!({ "weather": [{ "description": "clear sky" }], "main": { "temp": 21.4 } }))
            });
            mocks
                .generator
                .expect_generate()
                .returning(|_| Ok(json!({ "artifacts": [{ "base64": "iVBORw0=" }] })));
            mocks
        }

        fn orchestrator(self, graph: StateGraph) -> Orchestrator {
            let collaborators = Collaborators {
                clock: Arc::new(FixedClock(noon())),
                location: Arc::new(self.location),
                geocoder: Arc::new(self.geocoder),
                places: Arc::new(self.places),
                weather: Arc::new(self.weather),
                generator: Arc::new(self.generator),
                prompts: Arc::new(PromptSynthesizer::new(DEFAULT_PROMPT_TEMPLATE).unwrap()),
            };
            Orchestrator::new(graph, collaborators, Context::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_enters_resolving_time_before_any_invocation() {
        // No expectations: any collaborator call would panic.
        let mut orchestrator = Mocks::empty().orchestrator(StateGraph::standard());
        assert!(orchestrator.start());
        assert_eq!(orchestrator.state(), FlowState::Running(Step::ResolvingTime));
        assert_eq!(orchestrator.context().timestamp, Some(noon()));
    }

    #[tokio::test(start_paused = true)]
    async fn happy_path_returns_to_idle_with_artifacts() {
        let mut orchestrator = Mocks::happy().orchestrator(StateGraph::standard());
        orchestrator.start();
        let snapshot = orchestrator.run_until_settled().await;

        assert_eq!(snapshot.state, FlowState::Idle);
        let ctx = snapshot.context;
        assert_eq!(ctx.place_name(), "Eiffel Tower, Paris");
        assert_eq!(ctx.nearby_place_categories, "monument");
        assert_eq!(ctx.temperature, Some(21.4));
        assert!(ctx.generated_prompt.contains("during afternoon at Eiffel Tower, Paris"));
        assert_eq!(ctx.generated_artifacts.len(), 1);
        assert!(ctx.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn delay_holds_resolving_time() {
        let mut orchestrator = Mocks::happy().orchestrator(StateGraph::standard());
        orchestrator.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(orchestrator.state(), FlowState::Running(Step::ResolvingTime));

        assert_eq!(orchestrator.step().await, Some(true));
        assert_eq!(
            orchestrator.state(),
            FlowState::Running(Step::ResolvingLocationName)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_events_are_ignored() {
        let mut orchestrator = Mocks::empty().orchestrator(StateGraph::standard());
        let before = orchestrator.context().clone();
        assert!(!orchestrator.handle_event(FlowEvent::WeatherResolved(json!({}))));
        assert!(!orchestrator.handle_event(FlowEvent::DelayElapsed));
        assert_eq!(orchestrator.state(), FlowState::Idle);
        assert_eq!(orchestrator.context(), &before);
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_is_ignored() {
        let mut orchestrator = Mocks::empty().orchestrator(StateGraph::standard());
        assert!(orchestrator.start());
        let epoch = orchestrator.machine.epoch;
        assert!(!orchestrator.start());
        assert_eq!(orchestrator.state(), FlowState::Running(Step::ResolvingTime));
        assert_eq!(orchestrator.machine.epoch, epoch);
    }

    #[tokio::test(start_paused = true)]
    async fn outcomes_from_exited_states_are_dropped() {
        let mut mocks = Mocks::empty();
        mocks
            .geocoder
            .expect_reverse()
            .times(1)
            .returning(|_| Ok(json!({ "display_name": "Real" })));
        let mut orchestrator = mocks.orchestrator(StateGraph::standard());
        orchestrator.start();
        let stale_epoch = orchestrator.machine.epoch;

        // Leave resolvingTime early; its timer is aborted.
        assert!(orchestrator.handle_event(FlowEvent::DelayElapsed));
        assert_eq!(
            orchestrator.state(),
            FlowState::Running(Step::ResolvingLocationName)
        );

        let stale = Envelope {
            epoch: stale_epoch,
            event: FlowEvent::LocationNameResolved(json!({ "display_name": "Stale" })),
        };
        assert!(!orchestrator.machine.dispatch(stale));
        assert_eq!(
            orchestrator.state(),
            FlowState::Running(Step::ResolvingLocationName)
        );

        assert_eq!(orchestrator.step().await, Some(true));
        assert_eq!(orchestrator.context().place_name(), "Real");
    }

    #[tokio::test(start_paused = true)]
    async fn denied_location_ends_in_error() {
        let mut mocks = Mocks::empty();
        mocks
            .location
            .expect_resolve()
            .times(1)
            .returning(|| Err(LocationError::user_denied()));
        let mut orchestrator = mocks.orchestrator(StateGraph::with_device_location());
        orchestrator.start();
        let snapshot = orchestrator.run_until_settled().await;

        assert_eq!(snapshot.state, FlowState::Error);
        assert_eq!(
            snapshot.context.last_error.as_deref(),
            Some("User denied permission to use Location")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn resolved_device_location_feeds_later_lookups() {
        let mut mocks = Mocks::happy();
        mocks.geocoder.checkpoint();
        mocks
            .geocoder
            .expect_reverse()
            .withf(|at| *at == Coordinates::new(40.6892, -74.0445))
            .times(1)
            .returning(|_| Ok(json!({ "display_name": "Liberty Island" })));
        let mut orchestrator = mocks.orchestrator(StateGraph::with_device_location());
        orchestrator.start();
        let snapshot = orchestrator.run_until_settled().await;

        assert_eq!(snapshot.state, FlowState::Idle);
        assert_eq!(snapshot.context.location, Coordinates::new(40.6892, -74.0445));
        assert_eq!(snapshot.context.place_name(), "Liberty Island");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_places_lookup_is_skipped() {
        let mut mocks = Mocks::happy();
        mocks.places.checkpoint();
        mocks
            .places
            .expect_nearby()
            .returning(|_| Err(Error::UpstreamFetch("places lookup returned 401".to_string())));
        let mut orchestrator = mocks.orchestrator(StateGraph::standard());
        orchestrator.start();
        let snapshot = orchestrator.run_until_settled().await;

        assert_eq!(snapshot.state, FlowState::Idle);
        assert_eq!(snapshot.context.nearby_place_categories, "");
        assert!(snapshot.context.generated_prompt.contains("Near by places are ."));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_weather_lookup_ends_in_error() {
        let mut mocks = Mocks::happy();
        mocks.weather.checkpoint();
        mocks
            .weather
            .expect_current()
            .returning(|_| Err(Error::UpstreamFetch("weather lookup returned 500".to_string())));
        mocks.generator.checkpoint();
        mocks.generator.expect_generate().never();
        let mut orchestrator = mocks.orchestrator(StateGraph::standard());
        orchestrator.start();
        let snapshot = orchestrator.run_until_settled().await;

        assert_eq!(snapshot.state, FlowState::Error);
        assert!(snapshot
            .context
            .last_error
            .as_deref()
            .unwrap()
            .contains("weather lookup returned 500"));
        // Partial results stay in the context.
        assert_eq!(snapshot.context.place_name(), "Eiffel Tower, Paris");
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_handle_reports_snapshots() {
        let handle = Mocks::happy()
            .orchestrator(StateGraph::standard())
            .spawn();
        assert_eq!(handle.snapshot().state, FlowState::Idle);

        assert!(handle.start().await.unwrap());
        assert!(handle.snapshot().state.is_running());
        assert!(!handle.start().await.unwrap());

        let snapshot = handle.settled().await.unwrap();
        assert_eq!(snapshot.state, FlowState::Idle);
        let json = snapshot.to_json(false);
        assert_eq!(json["state"], "idle");
        assert_eq!(json["context"]["generatedArtifactCount"], 1);
    }
}
