//! Analysis surfaces, modes, and intent classification.
//!
//! Every request targets one [`Surface`]. Within a surface the concrete
//! [`Mode`] is always derived from the prompt text by [`classify`], never
//! taken from the caller. Chat messages are classified separately into a
//! [`ChatIntent`] by [`classify_chat`].

mod classifier;

pub use classifier::*;

use serde::{Deserialize, Serialize};

/// Analytical surface a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Customer segmentation into personas.
    Segmentation,
    /// Campaign performance scoring.
    Performance,
    /// Content recommendation.
    Content,
}

impl Surface {
    /// Get the surface name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Segmentation => "segmentation",
            Surface::Performance => "performance",
            Surface::Content => "content",
        }
    }

    /// Modes belonging to this surface, default first.
    pub fn modes(&self) -> &'static [Mode] {
        match self {
            Surface::Segmentation => &[Mode::Behavior, Mode::Campaign, Mode::SegmentEngagement],
            Surface::Performance => &[Mode::Roi, Mode::Conversion, Mode::PerformanceEngagement],
            Surface::Content => &[Mode::Strategy, Mode::Formats, Mode::Calendar],
        }
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Surface {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "segmentation" | "segment" | "customer_segmentation" => Ok(Surface::Segmentation),
            "performance" | "campaign_performance" => Ok(Surface::Performance),
            "content" | "content_recommendation" => Ok(Surface::Content),
            _ => Err(format!("Unknown insight type: {}", s)),
        }
    }
}

/// Discrete analysis mode.
///
/// The segmentation and performance surfaces both have an `engagement`
/// mode; they are distinct variants that share a wire name, so a mode is
/// only meaningful together with its [`Surface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Segmentation by purchasing behavior (segmentation default).
    Behavior,
    /// Segmentation for campaign targeting.
    Campaign,
    /// Segmentation by demographics and engagement.
    SegmentEngagement,
    /// Return on ad spend (performance default).
    Roi,
    /// Conversion rate.
    Conversion,
    /// Click-through and social engagement.
    PerformanceEngagement,
    /// Top-ranked content picks (content default).
    Strategy,
    /// Content grouped by format.
    Formats,
    /// Seven-day posting calendar.
    Calendar,
}

impl Mode {
    /// Wire name passed to the analyzer process.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Behavior => "behavior",
            Mode::Campaign => "campaign",
            Mode::SegmentEngagement => "engagement",
            Mode::Roi => "roi",
            Mode::Conversion => "conversion",
            Mode::PerformanceEngagement => "engagement",
            Mode::Strategy => "strategy",
            Mode::Formats => "formats",
            Mode::Calendar => "calendar",
        }
    }

    /// Surface this mode belongs to.
    pub fn surface(&self) -> Surface {
        match self {
            Mode::Behavior | Mode::Campaign | Mode::SegmentEngagement => Surface::Segmentation,
            Mode::Roi | Mode::Conversion | Mode::PerformanceEngagement => Surface::Performance,
            Mode::Strategy | Mode::Formats | Mode::Calendar => Surface::Content,
        }
    }

    /// Human-readable label used in insight titles.
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Behavior => "Behavior",
            Mode::Campaign => "Campaign Targeting",
            Mode::SegmentEngagement => "Demographics & Engagement",
            Mode::Roi => "Return on Ad Spend",
            Mode::Conversion => "Conversion",
            Mode::PerformanceEngagement => "Engagement",
            Mode::Strategy => "Strategy",
            Mode::Formats => "Formats",
            Mode::Calendar => "Calendar",
        }
    }

    /// Resolve a wire name within a surface.
    pub fn parse(surface: Surface, name: &str) -> Option<Mode> {
        let name = name.trim().to_lowercase();
        surface.modes().iter().copied().find(|m| m.as_str() == name)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Mode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Intent of a free-form chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatIntent {
    Performance,
    Content,
    Segmentation,
    Prediction,
    General,
}

impl ChatIntent {
    /// Get the intent name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatIntent::Performance => "performance",
            ChatIntent::Content => "content",
            ChatIntent::Segmentation => "segmentation",
            ChatIntent::Prediction => "prediction",
            ChatIntent::General => "general",
        }
    }
}

impl std::fmt::Display for ChatIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_from_str() {
        assert_eq!("segmentation".parse::<Surface>(), Ok(Surface::Segmentation));
        assert_eq!("Performance".parse::<Surface>(), Ok(Surface::Performance));
        assert_eq!(
            " content_recommendation ".parse::<Surface>(),
            Ok(Surface::Content)
        );
        assert!("weather".parse::<Surface>().is_err());
    }

    #[test]
    fn test_surface_default_mode_is_first() {
        assert_eq!(Surface::Segmentation.modes()[0], Mode::Behavior);
        assert_eq!(Surface::Performance.modes()[0], Mode::Roi);
        assert_eq!(Surface::Content.modes()[0], Mode::Strategy);
    }

    #[test]
    fn test_mode_surface_roundtrip() {
        for surface in [Surface::Segmentation, Surface::Performance, Surface::Content] {
            for mode in surface.modes() {
                assert_eq!(mode.surface(), surface);
                assert_eq!(Mode::parse(surface, mode.as_str()), Some(*mode));
            }
        }
    }

    #[test]
    fn test_engagement_namespaces_are_distinct() {
        assert_eq!(
            Mode::parse(Surface::Segmentation, "engagement"),
            Some(Mode::SegmentEngagement)
        );
        assert_eq!(
            Mode::parse(Surface::Performance, "engagement"),
            Some(Mode::PerformanceEngagement)
        );
        assert_ne!(Mode::SegmentEngagement, Mode::PerformanceEngagement);
        assert_eq!(Mode::parse(Surface::Content, "engagement"), None);
    }

    #[test]
    fn test_mode_serializes_as_wire_name() {
        let json = serde_json::to_string(&Mode::PerformanceEngagement).unwrap();
        assert_eq!(json, "\"engagement\"");
        assert_eq!(format!("{}", Mode::Calendar), "calendar");
    }

    #[test]
    fn test_chat_intent_serialize() {
        let json = serde_json::to_string(&ChatIntent::Prediction).unwrap();
        assert_eq!(json, "\"prediction\"");
    }
}
