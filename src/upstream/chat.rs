//! Chat-completion client used for recipe suggestions.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{PostJson, Transport};
use crate::config::ChatConfig;
use crate::error::{LifekitError, Result};
use crate::models::RecipeItem;

const SYSTEM_PROMPT: &str = "You are a culinary assistant.";
const MAX_SUGGESTIONS: usize = 3;

/// Asks a chat-completion model for recipe ideas.
pub struct ChatClient {
    transport: Arc<dyn Transport>,
    url: String,
    api_key: String,
    model: String,
    temperature: f64,
    timeout: Duration,
}

impl ChatClient {
    /// Build a client, or `None` when no API key is configured.
    pub fn from_config(config: &ChatConfig, transport: Arc<dyn Transport>) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            transport,
            url: config.url.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Up to three recipes using only `ingredients`.
    pub async fn suggest_recipes(&self, ingredients: &[String]) -> Result<Vec<RecipeItem>> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": recipe_prompt(ingredients)},
            ],
            "temperature": self.temperature,
        });

        let reply = self
            .transport
            .post_json(PostJson {
                url: self.url.clone(),
                bearer: Some(self.api_key.clone()),
                body,
                timeout: self.timeout,
            })
            .await?;

        let content = reply
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| LifekitError::Upstream("chat reply has no message content".to_string()))?;

        parse_recipes(content)
    }
}

pub fn recipe_prompt(ingredients: &[String]) -> String {
    format!(
        "Suggest 3 simple, beginner-friendly recipes using only these ingredients: {}. \
         Respond as a JSON array of objects with 'title' and 'content'.",
        ingredients.join(", ")
    )
}

/// Parse the model's JSON array of `{title, content}` objects.
///
/// A surrounding Markdown code fence is tolerated. Missing titles become
/// "Recipe" and missing content becomes empty. An empty array is an error,
/// so the caller serves the template recipes instead of none.
pub fn parse_recipes(content: &str) -> Result<Vec<RecipeItem>> {
    let parsed: Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| LifekitError::Upstream(format!("chat content is not JSON: {}", e)))?;

    let items = parsed
        .as_array()
        .ok_or_else(|| LifekitError::Upstream("chat content is not a JSON array".to_string()))?;

    let recipes = items
        .iter()
        .take(MAX_SUGGESTIONS)
        .map(|item| -> Result<RecipeItem> {
            let obj = item
                .as_object()
                .ok_or_else(|| LifekitError::Upstream("recipe is not an object".to_string()))?;
            let field = |name: &str, default: &str| {
                obj.get(name)
                    .and_then(Value::as_str)
                    .unwrap_or(default)
                    .to_string()
            };
            Ok(RecipeItem {
                title: field("title", "Recipe"),
                content: field("content", ""),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if recipes.is_empty() {
        return Err(LifekitError::Upstream("chat returned no recipes".to_string()));
    }
    Ok(recipes)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            // Drop an optional language tag on the opening line
            let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
            body.trim_end().trim_end_matches("```").trim()
        }
        None => trimmed,
    }
}
