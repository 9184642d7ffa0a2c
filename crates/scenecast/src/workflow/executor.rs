use tracing::{debug, warn};

use crate::{
    collaborators::Collaborators,
    workflow::{graph::Invocation, prompt::PromptInputs, reducers, Context, FlowEvent},
};

/// Runs one step invocation and reports its outcome as an event.
///
/// Failures never escape as `Err`: each lookup's error becomes the matching
/// `*_FAILED` event so the graph decides what happens next.
#[derive(Clone)]
pub struct StepExecutor {
    collaborators: Collaborators,
}

impl StepExecutor {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// `context` is the snapshot taken when the invoking state was entered.
    pub async fn execute(&self, invocation: Invocation, context: &Context) -> FlowEvent {
        debug!("Executing step: {}", invocation.as_str());

        let event = match invocation {
            Invocation::ResolveLocation => match self.collaborators.location.resolve().await {
                Ok(coords) => FlowEvent::LocationResolved(coords),
                Err(e) => FlowEvent::LocationFailed(e),
            },
            Invocation::ReverseGeocode => {
                match self.collaborators.geocoder.reverse(context.location).await {
                    Ok(body) => FlowEvent::LocationNameResolved(body),
                    Err(e) => FlowEvent::LocationNameFailed(e.to_string()),
                }
            }
            Invocation::NearbyPlaces => match self.collaborators.places.nearby(context.location).await {
                Ok(body) => FlowEvent::NearbyPlacesResolved(body),
                Err(e) => FlowEvent::NearbyPlacesFailed(e.to_string()),
            },
            Invocation::Weather => match self.collaborators.weather.current(context.location).await {
                Ok(body) => FlowEvent::WeatherResolved(body),
                Err(e) => FlowEvent::WeatherFailed(e.to_string()),
            },
            Invocation::SynthesizePrompt => {
                let inputs = PromptInputs::from_context(context, self.collaborators.clock.now());
                match self.collaborators.prompts.synthesize(&inputs) {
                    Ok(prompt) => FlowEvent::PromptReady(prompt),
                    Err(e) => FlowEvent::PromptFailed(e.to_string()),
                }
            }
            Invocation::GenerateArtifacts => {
                match self
                    .collaborators
                    .generator
                    .generate(&context.generated_prompt)
                    .await
                {
                    Ok(body) if reducers::artifacts(&body).is_empty() => FlowEvent::ArtifactsFailed(
                        "artifact generation returned no decodable artifacts".to_string(),
                    ),
                    Ok(body) => FlowEvent::ArtifactsGenerated(body),
                    Err(e) => FlowEvent::ArtifactsFailed(e.to_string()),
                }
            }
        };

        if let Some(message) = event.failure_message() {
            warn!("Step {} failed: {}", invocation.as_str(), message);
        }
        event
    }
}
