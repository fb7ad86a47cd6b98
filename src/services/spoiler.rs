//! Asynchronous spoiler classification via an OpenRouter-hosted LLM.
//!
//! Runs detached from the request that created the comment. The model is
//! instructed to answer with strict JSON; anything else — network error,
//! non-2xx status, empty content, missing or mistyped fields — abandons the
//! classification silently and the comment keeps its provisional state.

use serde::Deserialize;
use serde_json::json;

const COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const MODEL: &str = "openai/gpt-3.5-turbo";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpoilerVerdict {
    pub is_spoiler: bool,
    /// Clamped to [0, 1].
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(rename = "isSpoiler")]
    is_spoiler: bool,
    confidence: f64,
}

pub fn build_prompt(
    text: &str,
    book_title: Option<&str>,
    page: Option<i64>,
    page_range: Option<&str>,
) -> String {
    let page_info = match (page_range, page) {
        (Some(range), _) => format!("pages {range}"),
        (None, Some(page)) => format!("page {page}"),
        (None, None) => "unknown page".to_string(),
    };
    let book_info = book_title
        .map(|title| format!(" for the book \"{title}\""))
        .unwrap_or_default();

    format!(
        r#"You are analyzing a comment{book_info} at {page_info}. Determine if this comment reveals future plot information beyond the referenced page range.

Comment: "{text}"

Classification criteria:
- A spoiler is any information that reveals events, character outcomes, or plot developments occurring after the referenced page range
- General opinions, emotions, or themes are NOT spoilers
- Only classify as spoiler if it clearly reveals future plot points

Return ONLY valid JSON in this exact format:
{{
  "isSpoiler": true or false,
  "confidence": 0.0 to 1.0
}}"#
    )
}

/// Pull the verdict out of the model's reply. Models sometimes wrap the JSON
/// in prose, so everything from the first `{` to the last `}` is taken as
/// the candidate document.
fn parse_verdict(content: &str) -> Option<SpoilerVerdict> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }

    let raw: RawVerdict = serde_json::from_str(&content[start..=end]).ok()?;

    Some(SpoilerVerdict {
        is_spoiler: raw.is_spoiler,
        confidence: raw.confidence.clamp(0.0, 1.0),
    })
}

pub async fn classify_spoiler(
    client: &reqwest::Client,
    api_key: Option<&str>,
    text: &str,
    book_title: Option<&str>,
    page: Option<i64>,
    page_range: Option<&str>,
) -> Option<SpoilerVerdict> {
    let Some(api_key) = api_key else {
        tracing::debug!("OPENROUTER_API_KEY not set, skipping spoiler classification");
        return None;
    };

    let body = json!({
        "model": MODEL,
        "messages": [
            {
                "role": "system",
                "content": "You are a spoiler detection assistant. Always return valid JSON only, no additional text.",
            },
            {
                "role": "user",
                "content": build_prompt(text, book_title, page, page_range),
            },
        ],
        "max_tokens": 150,
        "temperature": 0.3,
    });

    let response = match client
        .post(COMPLETIONS_URL)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("LLM request failed: {}", e);
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::error!("LLM API error: {}", response.status());
        return None;
    }

    let data = match response.json::<CompletionsResponse>().await {
        Ok(data) => data,
        Err(e) => {
            tracing::error!("LLM returned malformed body: {}", e);
            return None;
        }
    };

    let content = data
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_deref())
        .map(str::trim)
        .filter(|content| !content.is_empty())?;

    let verdict = parse_verdict(content);
    if verdict.is_none() {
        tracing::error!("LLM response is not a valid verdict: {}", content);
    }
    verdict
}
