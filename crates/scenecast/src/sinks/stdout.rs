use std::str::FromStr;

use async_trait::async_trait;

use super::Sink;
use crate::{template::Template, workflow::Snapshot, Error, Result};

/// Used by the text format when no template is given.
pub const DEFAULT_TEXT_TEMPLATE: &str = "{{ state }}: {{ context.generatedPrompt }}\
{% if context.lastError %} (error: {{ context.lastError }}){% endif %}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
    Text,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "pretty" => Ok(OutputFormat::Pretty),
            "text" => Ok(OutputFormat::Text),
            other => Err(Error::Validation(format!(
                "Invalid output format: {}. Must be 'json', 'pretty' or 'text'",
                other
            ))),
        }
    }
}

#[derive(Debug)]
pub struct StdoutSink {
    format: OutputFormat,
    template: Template,
}

impl StdoutSink {
    pub fn new(format: OutputFormat, template: Option<&str>) -> Result<Self> {
        Ok(Self {
            format,
            template: Template::parse(template.unwrap_or(DEFAULT_TEXT_TEMPLATE))?,
        })
    }

    /// The line `send` prints. Artifact bytes are never included.
    pub fn render(&self, snapshot: &Snapshot) -> Result<String> {
        let value = snapshot.to_json(false);
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string(&value)?),
            OutputFormat::Pretty => Ok(serde_json::to_string_pretty(&value)?),
            OutputFormat::Text => self.template.render(&value),
        }
    }
}

#[async_trait]
impl Sink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, snapshot: &Snapshot) -> Result<()> {
        println!("{}", self.render(snapshot)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{Context, FlowState};
    use uuid::Uuid;

    fn snapshot(state: FlowState, prompt: &str, error: Option<&str>) -> Snapshot {
        let mut context = Context::new();
        context.generated_prompt = prompt.to_string();
        context.last_error = error.map(str::to_string);
        Snapshot {
            id: Uuid::nil(),
            state,
            context,
        }
    }

    #[test]
    fn parses_formats() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("pretty".parse::<OutputFormat>().unwrap(), OutputFormat::Pretty);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn json_is_a_single_line() {
        let sink = StdoutSink::new(OutputFormat::Json, None).unwrap();
        let line = sink.render(&snapshot(FlowState::Idle, "a photo", None)).unwrap();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["context"]["generatedPrompt"], "a photo");
    }

    #[test]
    fn text_uses_default_template() {
        let sink = StdoutSink::new(OutputFormat::Text, None).unwrap();
        assert_eq!(
            sink.render(&snapshot(FlowState::Idle, "a photo", None)).unwrap(),
            "idle: a photo"
        );
        assert_eq!(
            sink.render(&snapshot(FlowState::Error, "", Some("boom"))).unwrap(),
            "error:  (error: boom)"
        );
    }

    #[test]
    fn text_accepts_custom_template() {
        let sink = StdoutSink::new(OutputFormat::Text, Some("{{ context.location.latitude }}")).unwrap();
        assert_eq!(
            sink.render(&snapshot(FlowState::Idle, "", None)).unwrap(),
            "48.8584"
        );
    }

    #[tokio::test]
    async fn send_prints() {
        let sink = StdoutSink::new(OutputFormat::Pretty, None).unwrap();
        assert!(sink.send(&snapshot(FlowState::Idle, "a photo", None)).await.is_ok());
    }
}
