//! Synchronous toxicity screening via the Google Perspective API.
//!
//! A comment is NSFW when any requested attribute's summary score exceeds
//! the threshold. Absent API key, network failure or a malformed response
//! all yield `false` — moderation absence never blocks posting.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;

const ANALYZE_URL: &str =
    "https://commentanalyzer.googleapis.com/v1alpha1/comments:analyze";

const TOXICITY_THRESHOLD: f64 = 0.7;

const REQUESTED_ATTRIBUTES: [&str; 5] = [
    "TOXICITY",
    "SEVERE_TOXICITY",
    "SEXUALLY_EXPLICIT",
    "INSULT",
    "PROFANITY",
];

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(rename = "attributeScores", default)]
    attribute_scores: HashMap<String, AttributeScore>,
}

#[derive(Debug, Deserialize)]
struct AttributeScore {
    #[serde(rename = "summaryScore")]
    summary_score: SummaryScore,
}

#[derive(Debug, Deserialize)]
struct SummaryScore {
    value: f64,
}

fn is_nsfw(response: &AnalyzeResponse) -> bool {
    REQUESTED_ATTRIBUTES.iter().any(|attr| {
        response
            .attribute_scores
            .get(*attr)
            .map(|score| score.summary_score.value)
            .unwrap_or(0.0)
            > TOXICITY_THRESHOLD
    })
}

pub async fn check_nsfw(client: &reqwest::Client, api_key: Option<&str>, text: &str) -> bool {
    let Some(api_key) = api_key else {
        return false;
    };

    let body = json!({
        "comment": { "text": text },
        "requestedAttributes": REQUESTED_ATTRIBUTES
            .iter()
            .map(|attr| (attr.to_string(), json!({})))
            .collect::<serde_json::Map<_, _>>(),
        "doNotStore": true,
    });

    let response = match client
        .post(format!("{ANALYZE_URL}?key={api_key}"))
        .json(&body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Perspective API request failed: {}", e);
            return false;
        }
    };

    match response.json::<AnalyzeResponse>().await {
        Ok(result) => is_nsfw(&result),
        Err(e) => {
            tracing::warn!("Perspective API returned malformed body: {}", e);
            false
        }
    }
}
