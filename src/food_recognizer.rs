use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::api_connection::endpoints::{
    ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl, MessageContent, Provider, VISION_MODELS,
};
use crate::error::RecognitionError;

/// Image types the recognizer accepts, matched case-insensitively on the extension.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 16 * 1024 * 1024;

/// One food reported by the recognition service, with its weight estimate if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedFood {
    pub name: String,
    pub estimated_grams: Option<f64>,
}

impl RecognizedFood {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            estimated_grams: None,
        }
    }
}

// Shape of one array element as the model writes it. Weights sometimes come
// back as strings or null, so they are read loosely.
#[derive(Debug, Deserialize)]
struct RawDetection {
    #[serde(default)]
    food: String,
    #[serde(default)]
    estimated_grams: Option<serde_json::Value>,
}

const RECOGNITION_PROMPT: &str = "Analyze this food photo and identify every food item visible on the plate.

Return a JSON array of objects with:
- \"food\": the name of the food item in English, as specific as possible (\"chicken breast\" rather than \"chicken\", \"cooked rice\" rather than \"rice\")
- \"estimated_grams\": the estimated portion size in grams

Example:
[
  {\"food\": \"chicken breast\", \"estimated_grams\": 150},
  {\"food\": \"cooked rice\", \"estimated_grams\": 200},
  {\"food\": \"steamed broccoli\", \"estimated_grams\": 100}
]

Return ONLY the JSON array, no other text. Return [] if no food is visible.";

/// MIME type for an image path, rejecting anything outside [`ALLOWED_EXTENSIONS`].
pub fn image_mime_type(path: &Path) -> Result<&'static str, RecognitionError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "gif" => Ok("image/gif"),
        _ => Err(RecognitionError::UnsupportedImage(path.display().to_string())),
    }
}

/// Reads the image and returns it as a base64 `data:` URL.
pub async fn encode_image_data_url(path: &Path, max_image_bytes: u64) -> Result<String, RecognitionError> {
    let mime_type = image_mime_type(path)?;

    let size = tokio::fs::metadata(path).await?.len();
    if size > max_image_bytes {
        return Err(RecognitionError::ImageTooLarge {
            size,
            limit: max_image_bytes,
        });
    }

    let bytes = tokio::fs::read(path).await?;
    Ok(format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes)))
}

pub fn build_recognition_request(model: &str, image_data_url: String) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![ChatMessage::user(MessageContent::Parts(vec![
            ContentPart::Text {
                text: RECOGNITION_PROMPT.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url: image_data_url },
            },
        ]))],
        temperature: Some(0.3),
        max_tokens: Some(500),
    }
}

fn grams_from_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().trim_end_matches('g').trim().parse().ok(),
        _ => None,
    }
}

/// Extracts the detected foods from the model's answer.
///
/// The answer may wrap the array in prose or a markdown fence, so the span from
/// the first `[` to the last `]` is parsed. Entries without a food name are dropped.
pub fn parse_recognition_response(content: &str) -> Result<Vec<RecognizedFood>, RecognitionError> {
    let start = content.find('[');
    let end = content.rfind(']');
    let json_span = match (start, end) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => {
            return Err(RecognitionError::Parse(format!(
                "no JSON array in response: {}",
                content
            )))
        }
    };

    let detections: Vec<RawDetection> =
        serde_json::from_str(json_span).map_err(|e| RecognitionError::Parse(e.to_string()))?;

    Ok(detections
        .into_iter()
        .filter(|detection| !detection.food.trim().is_empty())
        .map(|detection| RecognizedFood {
            estimated_grams: detection.estimated_grams.as_ref().and_then(grams_from_value),
            name: detection.food,
        })
        .collect())
}

/// Client for the external image-recognition service.
#[derive(Debug, Clone)]
pub struct FoodRecognizer {
    provider: Provider,
    model: String,
    max_image_bytes: u64,
}

impl FoodRecognizer {
    pub fn new(api_key_env_var: &str, model: &str, max_image_bytes: u64) -> Self {
        if !VISION_MODELS.iter().any(|known| known.model_name == model) {
            warn!("Model '{}' is not a known vision model; recognition may fail", model);
        }
        Self {
            provider: Provider::openrouter(api_key_env_var),
            model: model.to_string(),
            max_image_bytes,
        }
    }

    /// Sends the photo to the vision model and returns the foods it saw, in order.
    pub async fn recognize_image(&self, image_path: &Path) -> Result<Vec<RecognizedFood>, RecognitionError> {
        let data_url = encode_image_data_url(image_path, self.max_image_bytes).await?;
        info!("Sending {:?} to {} for food recognition", image_path, self.model);

        let request = build_recognition_request(&self.model, data_url);
        let response = self.provider.call_chat_completion(request).await?;
        let content = response.first_content().ok_or(RecognitionError::EmptyResponse)?;
        debug!("Raw recognition response: {}", content);

        let foods = parse_recognition_response(content)?;
        info!("Recognition returned {} food item(s)", foods.len());
        Ok(foods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type(Path::new("plate.PNG")).unwrap(), "image/png");
        assert_eq!(image_mime_type(Path::new("plate.jpeg")).unwrap(), "image/jpeg");
        assert_eq!(image_mime_type(Path::new("dir/plate.jpg")).unwrap(), "image/jpeg");
        assert_eq!(image_mime_type(Path::new("plate.gif")).unwrap(), "image/gif");
        assert!(matches!(
            image_mime_type(Path::new("plate.bmp")),
            Err(RecognitionError::UnsupportedImage(_))
        ));
        assert!(image_mime_type(Path::new("plate")).is_err());
    }

    #[test]
    fn test_parse_plain_array() {
        let foods = parse_recognition_response(
            r#"[{"food": "chicken breast", "estimated_grams": 150}, {"food": "cooked rice", "estimated_grams": 200.5}]"#,
        )
        .unwrap();
        assert_eq!(
            foods,
            vec![
                RecognizedFood { name: "chicken breast".into(), estimated_grams: Some(150.0) },
                RecognizedFood { name: "cooked rice".into(), estimated_grams: Some(200.5) },
            ]
        );
    }

    #[test]
    fn test_parse_fenced_array_with_prose() {
        let content = "Here is what I see:\n```json\n[{\"food\": \"apple\", \"estimated_grams\": \"120 g\"}, {\"food\": \"\"}, {\"food\": \"toast\", \"estimated_grams\": null}]\n```";
        let foods = parse_recognition_response(content).unwrap();
        assert_eq!(foods.len(), 2);
        assert_eq!(foods[0].estimated_grams, Some(120.0));
        assert_eq!(foods[1], RecognizedFood::named("toast"));
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_recognition_response("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(matches!(
            parse_recognition_response("I can't see any food."),
            Err(RecognitionError::Parse(_))
        ));
        assert!(matches!(
            parse_recognition_response("[not json]"),
            Err(RecognitionError::Parse(_))
        ));
    }

    #[test]
    fn test_build_recognition_request_carries_image() {
        let request = build_recognition_request("openai/gpt-4o", "data:image/png;base64,AAAA".to_string());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "openai/gpt-4o");
        assert_eq!(value["messages"][0]["content"][1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[tokio::test]
    async fn test_encode_image_data_url() {
        let mut file = Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"fake png").unwrap();
        file.flush().unwrap();

        let url = encode_image_data_url(file.path(), DEFAULT_MAX_IMAGE_BYTES).await.unwrap();
        assert_eq!(url, format!("data:image/png;base64,{}", STANDARD.encode(b"fake png")));
    }

    #[tokio::test]
    async fn test_encode_image_rejects_oversized_file() {
        let mut file = Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(&[0u8; 64]).unwrap();
        file.flush().unwrap();

        let result = encode_image_data_url(file.path(), 16).await;
        assert!(matches!(result, Err(RecognitionError::ImageTooLarge { size: 64, limit: 16 })));
    }
}
