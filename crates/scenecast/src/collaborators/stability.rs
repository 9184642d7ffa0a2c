use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::{http, ArtifactGenerator};
use crate::Result;

#[derive(Debug, Serialize)]
struct TextPrompt<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct TextToImageRequest<'a> {
    text_prompts: Vec<TextPrompt<'a>>,
    cfg_scale: u32,
    clip_guidance_preset: &'static str,
    height: u32,
    width: u32,
    samples: u32,
    steps: u32,
}

impl<'a> TextToImageRequest<'a> {
    fn new(prompt: &'a str) -> Self {
        Self {
            text_prompts: vec![TextPrompt { text: prompt }],
            cfg_scale: 7,
            clip_guidance_preset: "FAST_BLUE",
            height: 512,
            width: 512,
            samples: 1,
            steps: 30,
        }
    }
}

/// Stability AI text-to-image generation.
#[derive(Debug, Clone)]
pub struct StabilityGenerator {
    client: Client,
    base_url: Url,
    api_key: String,
    engine: String,
}

impl StabilityGenerator {
    pub fn new(client: Client, base_url: Url, api_key: String, engine: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            engine,
        }
    }
}

#[async_trait]
impl ArtifactGenerator for StabilityGenerator {
    async fn generate(&self, prompt: &str) -> Result<Value> {
        let path = format!("v1/generation/{}/text-to-image", self.engine);
        let url = http::endpoint(&self.base_url, &path)?;
        let request = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .bearer_auth(&self.api_key)
            .json(&TextToImageRequest::new(prompt));
        http::fetch_json(request, "artifact generation").await
    }
}
