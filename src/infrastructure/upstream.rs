use crate::domain::capability::Capability;
use crate::domain::generation::{GenerationRequest, UpstreamOutput};
use crate::domain::ports::UpstreamGenerator;
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use rand::Rng;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

const STORAGE_URL: &str = "https://mock-storage.example.com";

type Render = fn(&GenerationRequest) -> UpstreamOutput;

struct Handler {
    latency: Duration,
    render: Render,
}

/// Stand-in for the upstream AI providers.
///
/// One handler per capability is registered at construction; each sleeps for a
/// fixed latency and returns a synthetic asset URL.
pub struct MockUpstreamGenerator {
    handlers: HashMap<Capability, Handler>,
    simulate_latency: bool,
}

impl MockUpstreamGenerator {
    pub fn new() -> Self {
        Self::with_latency(true)
    }

    /// Responds immediately.
    pub fn instant() -> Self {
        Self::with_latency(false)
    }

    pub fn with_latency(simulate_latency: bool) -> Self {
        let handlers: [(Capability, u64, Render); 7] = [
            (Capability::StaticImage, 500, render_static_image),
            (Capability::AnimatedImage, 1000, render_animation),
            (Capability::VideoMorph, 2000, render_video_morph),
            (Capability::ContextualPhoto, 1500, render_contextual_photo),
            (Capability::AiScoring, 300, render_score),
            (Capability::VectorCreative, 500, render_vector),
            (Capability::BrandedSet, 1000, render_branded_set),
        ];
        let handlers = handlers
            .into_iter()
            .map(|(capability, millis, render)| {
                let handler = Handler {
                    latency: Duration::from_millis(millis),
                    render,
                };
                (capability, handler)
            })
            .collect();
        Self {
            handlers,
            simulate_latency,
        }
    }

    /// Latency the handler of `capability` simulates, if one is registered.
    pub fn latency(&self, capability: Capability) -> Option<Duration> {
        self.handlers.get(&capability).map(|h| h.latency)
    }
}

impl Default for MockUpstreamGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpstreamGenerator for MockUpstreamGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<UpstreamOutput> {
        let handler = self.handlers.get(&request.capability).ok_or_else(|| {
            BillingError::UpstreamFailure(format!("no engine handles {}", request.capability))
        })?;
        if self.simulate_latency {
            tokio::time::sleep(handler.latency).await;
        }
        Ok((handler.render)(request))
    }
}

fn asset_url(folder: &str, extension: &str) -> String {
    let id: u64 = rand::thread_rng().gen_range(0..1 << 48);
    format!("{STORAGE_URL}/{folder}/{id:012x}.{extension}")
}

fn render_static_image(request: &GenerationRequest) -> UpstreamOutput {
    UpstreamOutput {
        asset_url: asset_url("images", "jpg"),
        metadata: json!({"width": 1024, "height": 1024, "format": "jpg", "prompt": request.prompt}),
        score: None,
    }
}

fn render_animation(request: &GenerationRequest) -> UpstreamOutput {
    UpstreamOutput {
        asset_url: asset_url("animations", "gif"),
        metadata: json!({"duration_seconds": 3, "fps": 24, "format": "gif", "prompt": request.prompt}),
        score: None,
    }
}

fn render_video_morph(request: &GenerationRequest) -> UpstreamOutput {
    UpstreamOutput {
        asset_url: asset_url("videos", "mp4"),
        metadata: json!({
            "duration_seconds": 5,
            "format": "mp4",
            "start_image": request.param("start_image"),
            "end_image": request.param("end_image"),
        }),
        score: None,
    }
}

fn render_contextual_photo(request: &GenerationRequest) -> UpstreamOutput {
    UpstreamOutput {
        asset_url: asset_url("images", "jpg"),
        metadata: json!({
            "format": "jpg",
            "product_image": request.param("product_image"),
            "scene": request.prompt,
        }),
        score: None,
    }
}

fn render_score(request: &GenerationRequest) -> UpstreamOutput {
    let score: u8 = rand::thread_rng().gen_range(70..=95);
    UpstreamOutput {
        asset_url: asset_url("reports", "json"),
        metadata: json!({"creative": request.param("creative_url"), "scale": 100}),
        score: Some(score),
    }
}

fn render_vector(request: &GenerationRequest) -> UpstreamOutput {
    UpstreamOutput {
        asset_url: asset_url("vectors", "svg"),
        metadata: json!({"format": "svg", "prompt": request.prompt}),
        score: None,
    }
}

fn render_branded_set(request: &GenerationRequest) -> UpstreamOutput {
    UpstreamOutput {
        asset_url: asset_url("sets", "zip"),
        metadata: json!({
            "format": "zip",
            "brand_colors": request.parameters.get("brand_colors").cloned().unwrap_or_default(),
            "prompt": request.prompt,
        }),
        score: None,
    }
}
