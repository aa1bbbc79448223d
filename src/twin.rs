//! Health summary and chat endpoints of the digital twin.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::{ApiClient, SimpleHttpResponse};
use crate::error::{errors, ApiError, ApiResult};

/// Reply used when the twin answers without text
pub const FALLBACK_CHAT_REPLY: &str = "I'm here to help with educational insights only.";

/// Raw health inputs the twin evaluates.
///
/// Unknown fields are kept and sent as-is; the server accepts flat lab values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fasting_glucose: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bp_systolic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bp_diastolic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_minutes: Option<f64>,
    /// Earlier readings per lab, oldest first
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub history: BTreeMap<String, Vec<f64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HealthSnapshot {
    /// Demo inputs the dashboard shows before real data is connected
    pub fn sample() -> Self {
        let history = [
            ("fasting_glucose", vec![132.0, 125.0]),
            ("total_cholesterol", vec![210.0, 205.0]),
            ("ldl", vec![170.0, 160.0, 150.0]),
            ("triglycerides", vec![200.0, 190.0]),
            ("bmi", vec![31.0, 30.0]),
        ]
        .into_iter()
        .map(|(name, values)| (name.to_string(), values))
        .collect();

        Self {
            fasting_glucose: Some(118.0),
            bp_systolic: Some(118.0),
            bp_diastolic: Some(76.0),
            sleep_hours: Some(6.5),
            activity_minutes: Some(30.0),
            history,
            extra: Map::new(),
        }
    }
}

/// Coarse display status derived from a signal's severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Normal,
    Elevated,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalTrend {
    #[serde(default)]
    pub direction: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalExplanation {
    #[serde(default)]
    pub rule: Option<String>,
    #[serde(default)]
    pub why_it_matters: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sparkline {
    #[serde(default)]
    pub values: Vec<f64>,
}

/// One rule-based signal in the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSignal {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub trend: Option<SignalTrend>,
    #[serde(default)]
    pub explanation: Option<SignalExplanation>,
    #[serde(default)]
    pub sparkline: Option<Sparkline>,
}

impl HealthSignal {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Signal")
    }

    pub fn status(&self) -> SignalStatus {
        match self.severity.as_deref() {
            Some("moderate") => SignalStatus::Elevated,
            Some("high") | Some("critical") => SignalStatus::High,
            _ => SignalStatus::Normal,
        }
    }

    /// Sparkline values, oldest first
    pub fn history(&self) -> &[f64] {
        self.sparkline
            .as_ref()
            .map(|s| s.values.as_slice())
            .unwrap_or_default()
    }
}

/// Evaluated summary of a [`HealthSnapshot`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TwinSummary {
    pub signals: Vec<HealthSignal>,
    pub disclaimer: String,
}

#[derive(Deserialize)]
struct SignalList {
    #[serde(default)]
    signals: Vec<HealthSignal>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    question: &'a str,
    health_state: &'a HealthSnapshot,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    reply: Option<String>,
}

/// Summary and chat endpoints
#[derive(Clone)]
pub struct TwinApi {
    api: ApiClient,
}

impl TwinApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Evaluate `health` into rule-based signals
    pub async fn summary(&self, health: &HealthSnapshot) -> ApiResult<TwinSummary> {
        let response = self.api.post_json("/twin/summary", health).await?;
        expect_success(&response, "Summary failed")?;

        let data: Value = response.json()?;
        // The signals sit under `summary` when the server wraps them
        let body = data
            .get("summary")
            .filter(|summary| summary.is_object())
            .unwrap_or(&data);
        let SignalList { signals } = serde_json::from_value(body.clone())?;

        debug!(signals = signals.len(), "Loaded twin summary");
        Ok(TwinSummary {
            signals,
            disclaimer: data
                .get("disclaimer")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Ask the twin a question about `health`
    pub async fn chat(&self, question: &str, health: &HealthSnapshot) -> ApiResult<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ApiError::Validation("Question cannot be empty".into()));
        }

        let response = self
            .api
            .post_json(
                "/twin/chat",
                &ChatRequest {
                    question,
                    health_state: health,
                },
            )
            .await?;
        expect_success(&response, "Chat failed")?;

        let ChatReply { reply } = response.json()?;
        Ok(reply
            .filter(|reply| !reply.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_CHAT_REPLY.to_string()))
    }
}

fn expect_success(response: &SimpleHttpResponse, prefix: &str) -> ApiResult<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(errors::http_failure(
            response.status(),
            format!("{}: {}", prefix, response.status()),
        ))
    }
}
