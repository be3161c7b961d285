use crate::error::{BillingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A generation product the platform sells.
///
/// The set is closed: adding a product means adding a variant here and
/// registering one handler for it in the upstream generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    StaticImage,
    AnimatedImage,
    VideoMorph,
    ContextualPhoto,
    AiScoring,
    VectorCreative,
    BrandedSet,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::StaticImage,
        Capability::AnimatedImage,
        Capability::VideoMorph,
        Capability::ContextualPhoto,
        Capability::AiScoring,
        Capability::VectorCreative,
        Capability::BrandedSet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::StaticImage => "static_image",
            Capability::AnimatedImage => "animated_image",
            Capability::VideoMorph => "video_morph",
            Capability::ContextualPhoto => "contextual_photo",
            Capability::AiScoring => "ai_scoring",
            Capability::VectorCreative => "vector_creative",
            Capability::BrandedSet => "branded_set",
        }
    }

    /// Whether purchasing this capability needs a paid subscription tier.
    pub fn requires_subscription(&self) -> bool {
        matches!(
            self,
            Capability::VideoMorph
                | Capability::ContextualPhoto
                | Capability::AiScoring
                | Capability::BrandedSet
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            Capability::StaticImage => "High quality static image",
            Capability::AnimatedImage => "Animated image (GIF/MP4)",
            Capability::VideoMorph => "Video morph between two images",
            Capability::ContextualPhoto => "Contextual photo creative from a URL",
            Capability::AiScoring => "AI conversion scoring of a creative",
            Capability::VectorCreative => "Scalable vector creative (SVG)",
            Capability::BrandedSet => "Branded set: three creatives in one brand style",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| BillingError::InvalidParameter(format!("unknown capability '{s}'")))
    }
}
