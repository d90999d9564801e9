use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::AnalysisResult;
use crate::response_parser::{parse_model_json, ParseFailure, RAW_SNIPPET_CHARS};

/// Input budget for a single text analysis request. Longer documents are
/// truncated with a visible marker before upload.
pub const MAX_TEXT_ANALYSIS_CHARS: usize = 200_000;

pub const TRUNCATION_MARKER: &str = "\n... [Content Truncated]";

const TEXT_ANALYSIS_PROMPT: &str = r#"Analyze the following medical report text and extract the information into a structured JSON format.
Be comprehensive but concise. If information for a field is not present, use `null` or an empty list `[]`.
Focus *only* on the information present in the text provided. Do not infer or add external knowledge.

YOUR RESPONSE MUST BE A SINGLE, VALID JSON OBJECT AND NOTHING ELSE.
DO NOT include any explanatory text before or after the JSON object.
DO NOT use markdown formatting like ```json.

JSON Format:
{
    "summary": "A concise summary of the main points of the medical report excerpt. Synthesize key findings.",
    "diagnosis": "Primary or potential diagnosis mentioned, or null.",
    "key_findings": ["List key observations, test results, or findings mentioned."],
    "causes": ["Possible causes mentioned for the condition, or null."],
    "recommendations": "Specific medical recommendations or next steps mentioned, or null.",
    "precautions": ["Any precautions advised in the text."],
    "remedies": ["Mentioned treatments, therapies, or remedies."],
    "important_notes": "Other significant details or notes from the report.",
    "treatment_plan": "Outline of the treatment plan if described, or null.",
    "lifestyle_changes": ["Specific lifestyle changes suggested."],
    "urgent_concerns": "Any explicitly mentioned urgent concerns or red flags, or null."
}

Medical Report Text:
--- START TEXT ---
"#;

const IMAGE_ANALYSIS_PROMPT: &str = r#"YOUR **ONLY** OUTPUT MUST BE A VALID JSON OBJECT.
DO NOT INCLUDE ANY INTRODUCTORY TEXT, EXPLANATIONS, NOTES, OR MARKDOWN FORMATTING (like ```json) BEFORE OR AFTER THE JSON OBJECT.

The JSON object MUST conform EXACTLY to the following format. If you cannot determine a value for a particular field based *only* on the visual information in the image, set it to null or an empty list [] if it's an array. Do not infer information not visually present.

JSON Format:
{
    "summary": "A detailed and comprehensive summary of the primary medical issue or abnormality visible in the image, covering location, extent, appearance, and relationship to surrounding structures.",
    "diagnosis": "Potential diagnosis based *only* on the visual evidence, or null if none can be determined from the image alone.",
    "key_findings": ["All significant visual observations, describing what is seen."],
    "precautions": ["General precautions relevant only to the visual findings, or null."],
    "remedies": ["Potential remedies or treatments suggested only by the visual findings, or null."],
    "urgent_concerns": "Any visually evident urgent concern, or null.",
    "anatomical_structures": ["Main visible anatomical structures identified in the image."]
}

Analyze the provided medical image and generate ONLY the JSON output based on the fields above."#;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Input text was empty.")]
    EmptyInput,

    #[error("Failed to process image data: {0}")]
    ImageProcessing(String),

    #[error("AI {context} request was blocked. Reason: {reason}")]
    Blocked {
        context: String,
        reason: String,
        safety_ratings: Option<Value>,
    },

    #[error("AI {context} generation stopped unexpectedly. Reason: {reason}")]
    Stopped {
        context: String,
        reason: String,
        safety_ratings: Option<Value>,
    },

    #[error("No text content received from the model for {context}")]
    NoContent { context: String },

    #[error("{0}")]
    Parse(#[from] ParseFailure),

    #[error("Gemini API communication error: {0}")]
    Api(String),
}

impl AnalysisError {
    pub fn safety_ratings(&self) -> Option<&Value> {
        match self {
            AnalysisError::Blocked { safety_ratings, .. }
            | AnalysisError::Stopped { safety_ratings, .. } => safety_ratings.as_ref(),
            _ => None,
        }
    }

    /// Structured error object exposed in `/analyze` error bodies.
    pub fn details(&self) -> Value {
        let mut details = serde_json::json!({"error": self.to_string()});
        if let Some(ratings) = self.safety_ratings() {
            details["safety_ratings"] = ratings.clone();
        }
        if let AnalysisError::Parse(failure) = self {
            details["raw_text_snippet"] = Value::String(failure.raw_text_snippet.clone());
        }
        details
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "safetySettings", skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<Blob>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Part {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn inline_data(mime_type: &str, data: String) -> Self {
        Part {
            text: None,
            inline_data: Some(Blob {
                mime_type: mime_type.to_string(),
                data,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct Blob {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

/// Relaxed thresholds for medical content; reports routinely trip the
/// default dangerous-content filters.
fn medical_safety_settings() -> Vec<SafetySetting> {
    vec![
        SafetySetting {
            category: "HARM_CATEGORY_HARASSMENT",
            threshold: "BLOCK_NONE",
        },
        SafetySetting {
            category: "HARM_CATEGORY_HATE_SPEECH",
            threshold: "BLOCK_NONE",
        },
        SafetySetting {
            category: "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            threshold: "BLOCK_LOW_AND_ABOVE",
        },
        SafetySetting {
            category: "HARM_CATEGORY_DANGEROUS_CONTENT",
            threshold: "BLOCK_NONE",
        },
    ]
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
    #[serde(rename = "safetyRatings")]
    safety_ratings: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
    #[serde(rename = "safetyRatings")]
    safety_ratings: Option<Value>,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Structured summary of a medical report's extracted text.
    pub async fn analyze_text(&self, text: &str) -> Result<AnalysisResult, AnalysisError> {
        if text.trim().is_empty() {
            warn!("analyze_text called with empty text");
            return Err(AnalysisError::EmptyInput);
        }

        let text = truncate_for_analysis(text);
        info!("Sending text to Gemini for structured analysis ({} chars)", text.len());

        let prompt = format!(
            "{}{}\n--- END TEXT ---\n\nNow, provide ONLY the JSON object based on the text above.",
            TEXT_ANALYSIS_PROMPT, text
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(prompt)],
            }],
            safety_settings: medical_safety_settings(),
        };

        let response = self.generate(&request).await?;
        self.parse_analysis(response, "text analysis")
    }

    /// Structured summary of a medical image, sent as inline JPEG data.
    pub async fn analyze_image(
        &self,
        image_data: &[u8],
        filename: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let context = format!("image analysis ({})", filename);
        let jpeg = prepare_image(image_data)?;
        info!(
            "Sending image '{}' to Gemini for visual analysis ({} bytes as JPEG)",
            filename,
            jpeg.len()
        );

        let encoded = base64::engine::general_purpose::STANDARD.encode(&jpeg);
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::inline_data("image/jpeg", encoded),
                    Part::text(IMAGE_ANALYSIS_PROMPT),
                ],
            }],
            safety_settings: medical_safety_settings(),
        };

        let response = self.generate(&request).await?;
        self.parse_analysis(response, &context)
    }

    /// Single-turn chat completion; returns the model's plain-text answer.
    pub async fn chat(&self, prompt: &str) -> Result<String, AnalysisError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(prompt)],
            }],
            safety_settings: Vec::new(),
        };

        let response = self.generate(&request).await?;
        match response_text(&response) {
            Some(text) => Ok(text),
            None => Err(failure_from(response, "chat")),
        }
    }

    fn parse_analysis(
        &self,
        response: GenerateContentResponse,
        context: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let raw = match response_text(&response) {
            Some(raw) => raw,
            None => return Err(failure_from(response, context)),
        };

        let value = parse_model_json(&raw, context)?;
        serde_json::from_value::<AnalysisResult>(value).map_err(|e| {
            warn!("AI {} response did not match the analysis schema: {}", context, e);
            AnalysisError::Parse(ParseFailure {
                message: format!("AI {} response did not match the expected schema", context),
                raw_text_snippet: raw.chars().take(RAW_SNIPPET_CHARS).collect(),
            })
        })
    }

    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AnalysisError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| AnalysisError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(RAW_SNIPPET_CHARS).collect();
            return Err(AnalysisError::Api(format!("HTTP {}: {}", status, snippet)));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| AnalysisError::Api(e.to_string()))
    }
}

fn response_text(response: &GenerateContentResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    let text: String = candidate
        .content
        .as_ref()?
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect();
    let text = text.trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Map a contentless response onto the block/finish reason it reported.
fn failure_from(response: GenerateContentResponse, context: &str) -> AnalysisError {
    if let Some(feedback) = response.prompt_feedback {
        if let Some(reason) = feedback.block_reason {
            return AnalysisError::Blocked {
                context: context.to_string(),
                reason,
                safety_ratings: feedback.safety_ratings,
            };
        }
    }

    if let Some(candidate) = response.candidates.into_iter().next() {
        let finish_reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
        if finish_reason != "STOP" {
            return AnalysisError::Stopped {
                context: context.to_string(),
                reason: finish_reason,
                safety_ratings: candidate.safety_ratings,
            };
        }
    }

    AnalysisError::NoContent {
        context: context.to_string(),
    }
}

fn truncate_for_analysis(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_ANALYSIS_CHARS {
        return text.to_string();
    }
    warn!(
        "Input text length exceeds limit ({} chars), truncating",
        MAX_TEXT_ANALYSIS_CHARS
    );
    let truncated: String = text.chars().take(MAX_TEXT_ANALYSIS_CHARS).collect();
    format!("{}{}", truncated, TRUNCATION_MARKER)
}

/// Normalize to RGB JPEG; alpha channels are composited onto white rather
/// than dropped so transparent scans stay legible.
fn prepare_image(image_data: &[u8]) -> Result<Vec<u8>, AnalysisError> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| AnalysisError::ImageProcessing(e.to_string()))?;

    let rgb = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        let mut flattened = image::RgbImage::new(rgba.width(), rgba.height());
        for (x, y, pixel) in rgba.enumerate_pixels() {
            let alpha = pixel[3] as u32;
            let blend = |channel: u8| -> u8 {
                ((channel as u32 * alpha + 255 * (255 - alpha)) / 255) as u8
            };
            flattened.put_pixel(x, y, image::Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
        }
        flattened
    } else {
        img.to_rgb8()
    };

    let mut buf = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 90);
    encoder
        .encode_image(&rgb)
        .map_err(|e| AnalysisError::ImageProcessing(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_appends_marker() {
        let text = "a".repeat(MAX_TEXT_ANALYSIS_CHARS + 10);
        let truncated = truncate_for_analysis(&text);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            truncated.chars().count(),
            MAX_TEXT_ANALYSIS_CHARS + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_for_analysis("short"), "short");
    }

    #[test]
    fn prepare_image_rejects_garbage() {
        let err = prepare_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, AnalysisError::ImageProcessing(_)));
    }

    #[test]
    fn prepare_image_flattens_alpha_onto_white() {
        let mut rgba = image::RgbaImage::new(2, 2);
        for pixel in rgba.pixels_mut() {
            *pixel = image::Rgba([0, 0, 0, 0]);
        }
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(rgba)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let jpeg = prepare_image(&png).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        // Fully transparent black should come out white, not black.
        assert!(decoded.get_pixel(0, 0)[0] > 200);
    }
}
