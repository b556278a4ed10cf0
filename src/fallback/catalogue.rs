//! Fixed data the synthesizer draws from.
//!
//! Numbers are illustrative but shaped like real analyzer output so that a
//! fallback result renders identically to a live one.

use crate::modes::{ChatIntent, Mode};

/// A customer persona from the playbook.
#[derive(Debug, Clone, Copy)]
pub struct Persona {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub recommended_channels: &'static [&'static str],
}

pub static PERSONAS: [Persona; 3] = [
    Persona {
        key: "eco_lux",
        label: "Eco-Lux Loyalists",
        description: "High-value customers who prioritize premium, sustainable products",
        recommended_channels: &["Email", "Instagram", "Loyalty Program"],
    },
    Persona {
        key: "aspiring",
        label: "Aspiring Aesthetes",
        description: "Trend-conscious buyers seeking aesthetic appeal and quality",
        recommended_channels: &["Instagram", "TikTok", "Pinterest"],
    },
    Persona {
        key: "gift",
        label: "Eco-Gift Shoppers",
        description: "Occasional buyers focused on eco-friendly gift purchases",
        recommended_channels: &["Facebook", "Google Search", "Email"],
    },
];

/// Look up a persona by key.
pub fn persona(key: &str) -> Option<&'static Persona> {
    PERSONAS.iter().find(|p| p.key == key)
}

/// Per-cluster averages for a synthesized segment.
#[derive(Debug, Clone, Copy)]
pub struct SegmentProfile {
    pub persona_key: &'static str,
    pub count: u64,
    pub avg_age: f64,
    pub avg_monthly_spend: f64,
    pub avg_order_value: f64,
    pub avg_orders_per_month: f64,
    pub avg_visits_per_month: f64,
    pub avg_category_preference_score: f64,
}

pub static SEGMENT_PROFILES: [SegmentProfile; 3] = [
    SegmentProfile {
        persona_key: "eco_lux",
        count: 312,
        avg_age: 41.6,
        avg_monthly_spend: 286.4,
        avg_order_value: 118.9,
        avg_orders_per_month: 2.41,
        avg_visits_per_month: 6.8,
        avg_category_preference_score: 0.812,
    },
    SegmentProfile {
        persona_key: "aspiring",
        count: 447,
        avg_age: 28.3,
        avg_monthly_spend: 142.7,
        avg_order_value: 61.2,
        avg_orders_per_month: 2.33,
        avg_visits_per_month: 11.4,
        avg_category_preference_score: 0.744,
    },
    SegmentProfile {
        persona_key: "gift",
        count: 241,
        avg_age: 36.9,
        avg_monthly_spend: 97.5,
        avg_order_value: 84.1,
        avg_orders_per_month: 0.92,
        avg_visits_per_month: 2.7,
        avg_category_preference_score: 0.468,
    },
];

/// Persona match scores, in `SEGMENT_PROFILES` order, for a segmentation mode.
pub fn segment_scores(mode: Mode) -> [f64; 3] {
    match mode {
        Mode::Campaign => [0.684, 0.791, 0.612],
        Mode::SegmentEngagement => [0.597, 0.862, 0.433],
        _ => [0.873, 0.705, 0.648],
    }
}

/// Observed metrics for a synthesized campaign.
#[derive(Debug, Clone, Copy)]
pub struct CampaignProfile {
    pub campaign_id: &'static str,
    pub roas: f64,
    pub ctr: f64,
    pub conversion_rate: f64,
    pub cpc: f64,
}

pub static CAMPAIGNS: [CampaignProfile; 6] = [
    CampaignProfile {
        campaign_id: "CMP-1001",
        roas: 4.12,
        ctr: 0.0213,
        conversion_rate: 0.0384,
        cpc: 0.87,
    },
    CampaignProfile {
        campaign_id: "CMP-1002",
        roas: 2.65,
        ctr: 0.0341,
        conversion_rate: 0.0297,
        cpc: 0.54,
    },
    CampaignProfile {
        campaign_id: "CMP-1003",
        roas: 3.38,
        ctr: 0.0188,
        conversion_rate: 0.0452,
        cpc: 1.12,
    },
    CampaignProfile {
        campaign_id: "CMP-1004",
        roas: 1.94,
        ctr: 0.0279,
        conversion_rate: 0.0216,
        cpc: 0.61,
    },
    CampaignProfile {
        campaign_id: "CMP-1005",
        roas: 5.06,
        ctr: 0.0152,
        conversion_rate: 0.0511,
        cpc: 1.43,
    },
    CampaignProfile {
        campaign_id: "CMP-1006",
        roas: 2.21,
        ctr: 0.0402,
        conversion_rate: 0.0188,
        cpc: 0.39,
    },
];

/// Metric label reported for a performance mode.
pub fn metric_name(mode: Mode) -> &'static str {
    match mode {
        Mode::PerformanceEngagement => "Predicted Engagement (CTR)",
        Mode::Conversion => "Predicted Conversion Rate",
        _ => "Predicted ROAS",
    }
}

impl CampaignProfile {
    /// Model output for `mode`.
    pub fn predicted(&self, mode: Mode) -> f64 {
        match mode {
            Mode::PerformanceEngagement => self.ctr,
            Mode::Conversion => self.conversion_rate,
            _ => self.roas,
        }
    }
}

/// A content recommendation row.
#[derive(Debug, Clone, Copy)]
pub struct ContentProfile {
    pub content_id: &'static str,
    pub persona_key: &'static str,
    pub campaign_goal: &'static str,
    pub channel: &'static str,
    pub format: &'static str,
    pub predicted_score: f64,
}

pub static CONTENT: [ContentProfile; 10] = [
    ContentProfile {
        content_id: "C-101",
        persona_key: "aspiring",
        campaign_goal: "awareness",
        channel: "Instagram",
        format: "Reel",
        predicted_score: 8.74,
    },
    ContentProfile {
        content_id: "C-102",
        persona_key: "eco_lux",
        campaign_goal: "retention",
        channel: "Email",
        format: "Newsletter",
        predicted_score: 8.31,
    },
    ContentProfile {
        content_id: "C-103",
        persona_key: "aspiring",
        campaign_goal: "engagement",
        channel: "TikTok",
        format: "Short Video",
        predicted_score: 8.12,
    },
    ContentProfile {
        content_id: "C-104",
        persona_key: "gift",
        campaign_goal: "conversion",
        channel: "Google Search",
        format: "Search Ad",
        predicted_score: 7.66,
    },
    ContentProfile {
        content_id: "C-105",
        persona_key: "eco_lux",
        campaign_goal: "conversion",
        channel: "Instagram",
        format: "Carousel",
        predicted_score: 7.48,
    },
    ContentProfile {
        content_id: "C-106",
        persona_key: "aspiring",
        campaign_goal: "awareness",
        channel: "Pinterest",
        format: "Static Image",
        predicted_score: 7.05,
    },
    ContentProfile {
        content_id: "C-107",
        persona_key: "gift",
        campaign_goal: "awareness",
        channel: "Facebook",
        format: "Carousel",
        predicted_score: 6.72,
    },
    ContentProfile {
        content_id: "C-108",
        persona_key: "eco_lux",
        campaign_goal: "engagement",
        channel: "Instagram",
        format: "Reel",
        predicted_score: 6.58,
    },
    ContentProfile {
        content_id: "C-109",
        persona_key: "gift",
        campaign_goal: "retention",
        channel: "Email",
        format: "Newsletter",
        predicted_score: 6.19,
    },
    ContentProfile {
        content_id: "C-110",
        persona_key: "aspiring",
        campaign_goal: "conversion",
        channel: "Facebook",
        format: "Static Image",
        predicted_score: 5.83,
    },
];

/// Canned chat reply for an intent.
pub fn intent_reply(intent: ChatIntent) -> &'static str {
    match intent {
        ChatIntent::Performance => {
            "I can analyze your campaign performance using machine learning! Please provide metrics like impressions, clicks, spend, and conversions, and I'll predict your ROI, conversion rate, and engagement."
        }
        ChatIntent::Content => {
            "I can recommend content strategies using ML! Our models analyze engagement rates, conversion rates, ROAS, and sample sizes to suggest the best performing content types for your campaigns."
        }
        ChatIntent::Segmentation => {
            "I can segment your customers using machine learning! Provide customer data like spending patterns, order frequency, and engagement metrics, and I'll identify which persona group they belong to for targeted marketing."
        }
        ChatIntent::Prediction => {
            "Our AI can predict:\n• Campaign ROI and ROAS\n• Conversion rates and CTR\n• Customer lifetime value\n• Content performance scores\n\nProvide your metrics and I'll run them through our ML models for accurate predictions!"
        }
        ChatIntent::General => GENERAL_REPLY,
    }
}

pub const GENERAL_REPLY: &str = "I'm an AI assistant trained on your marketing data. I can analyze campaigns, predict performance, recommend content, and segment customers using machine learning. How can I help you optimize your marketing?";

pub const HELP_REPLY: &str = "I use trained ML models to help with:\n\n1. Performance Analysis - Predict ROI, conversions, and engagement\n2. Content Recommendations - Suggest best-performing content strategies\n3. Customer Segmentation - Identify customer personas for targeting\n4. Predictive Analytics - Forecast campaign outcomes\n\nAsk me anything about your marketing data!";

/// Phrases matched as substrings of a general message, before [`SMALL_TALK`].
pub static SMALL_TALK_PHRASES: [(&str, &str); 3] = [
    ("what can you do", HELP_REPLY),
    ("what do you do", HELP_REPLY),
    ("how can you help", HELP_REPLY),
];

/// Replies for small talk, matched on whole words of a general message.
pub static SMALL_TALK: [(&[&str], &str); 3] = [
    (
        &["hello", "hi", "hey"],
        "Hello! I'm your AI marketing assistant powered by machine learning. I can help you with:\n• Campaign performance predictions\n• Content recommendations\n• Customer segmentation\n• ROI forecasting\n\nWhat would you like to analyze today?",
    ),
    (&["help", "capabilities"], HELP_REPLY),
    (
        &["thank", "thanks"],
        "You're welcome! Let me know if you need more ML-powered insights for your campaigns.",
    ),
];
