use anyhow::{anyhow, bail};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use tracing::{info, warn};

/// Recursive string-leaf translator over a structured analysis object.
///
/// Keys are never translated; non-string leaves pass through; a single
/// failing leaf falls back to its original text so one bad translation never
/// discards the rest of the result.
#[derive(Clone)]
pub struct Translator {
    client: reqwest::Client,
    base_url: String,
}

impl Translator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Target language `en` (any region suffix stripped) is a no-op.
    pub async fn translate_analysis(&self, value: Value, target_language: &str) -> Value {
        let lowered = target_language.to_lowercase();
        let code = lowered.split('-').next().unwrap_or("").to_string();
        if code.is_empty() || code == "en" {
            info!("Target language is English, skipping translation");
            return value;
        }

        info!("Attempting to translate analysis to: {}", code);
        self.translate_value(value, &code).await
    }

    fn translate_value<'a>(&'a self, value: Value, lang: &'a str) -> BoxFuture<'a, Value> {
        async move {
            match value {
                Value::String(s) => {
                    if s.trim().is_empty() {
                        return Value::String(s);
                    }
                    match self.translate_string(&s, lang).await {
                        Ok(translated) => Value::String(translated),
                        Err(e) => {
                            warn!(
                                "Translation failed for string snippet '{}...': {}. Returning original.",
                                s.chars().take(30).collect::<String>(),
                                e
                            );
                            Value::String(s)
                        }
                    }
                }
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.translate_value(item, lang).await);
                    }
                    Value::Array(out)
                }
                Value::Object(map) => {
                    let mut out = serde_json::Map::new();
                    for (key, nested) in map {
                        let translated = self.translate_value(nested, lang).await;
                        out.insert(key, translated);
                    }
                    Value::Object(out)
                }
                other => other,
            }
        }
        .boxed()
    }

    /// One leaf through the gtx endpoint. The payload is a nested array whose
    /// first element holds `[translated, original, ...]` segments.
    async fn translate_string(&self, text: &str, lang: &str) -> anyhow::Result<String> {
        let url = format!(
            "{}/translate_a/single?client=gtx&sl=auto&tl={}&dt=t&q={}",
            self.base_url,
            lang,
            urlencoding::encode(text)
        );

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let payload: Value = response.json().await?;

        let segments = payload
            .get(0)
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow!("unexpected translation payload shape"))?;

        let mut out = String::new();
        for segment in segments {
            if let Some(piece) = segment.get(0).and_then(|v| v.as_str()) {
                out.push_str(piece);
            }
        }

        if out.is_empty() {
            bail!("empty translation result");
        }
        Ok(out)
    }
}
