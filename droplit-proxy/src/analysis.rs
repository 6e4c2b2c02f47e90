//! AI image-analysis proxy client.

use crate::config::ProxyConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::retry::send_with_retry;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What the vision model should do with the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisAction {
    /// Extract the text visible in the image.
    Ocr,
    /// Describe the image in prose.
    Describe,
}

impl AnalysisAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisAction::Ocr => "ocr",
            AnalysisAction::Describe => "describe",
        }
    }
}

/// Base64 image payload with its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub media_type: String,
    /// Standard base64, no data-URL prefix.
    pub data: String,
}

impl ImageInput {
    /// Accepts `data:<type>;base64,<data>` or bare base64.
    ///
    /// The payload must decode. For bare base64 the media type is inferred
    /// from the decoded magic bytes.
    pub fn parse(input: &str) -> ProxyResult<Self> {
        let input = input.trim();
        if let Some(rest) = input.strip_prefix("data:") {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| ProxyError::InvalidImage("data URL has no payload".into()))?;
            let media_type = header
                .strip_suffix(";base64")
                .ok_or_else(|| ProxyError::InvalidImage("data URL is not base64".into()))?;
            if media_type.is_empty() {
                return Err(ProxyError::InvalidImage("data URL has no media type".into()));
            }
            decode(data)?;
            return Ok(Self {
                media_type: media_type.to_string(),
                data: data.to_string(),
            });
        }

        let bytes = decode(input)?;
        Ok(Self {
            media_type: sniff_media_type(&bytes).to_string(),
            data: input.to_string(),
        })
    }

    /// Encodes raw image bytes, inferring the media type.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            media_type: sniff_media_type(bytes).to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

fn decode(data: &str) -> ProxyResult<Vec<u8>> {
    if data.is_empty() {
        return Err(ProxyError::InvalidImage("empty image".into()));
    }
    STANDARD
        .decode(data)
        .map_err(|e| ProxyError::InvalidImage(format!("bad base64: {e}")))
}

/// Media type from magic bytes, `image/jpeg` when unrecognized.
pub fn sniff_media_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

/// Token accounting reported by the proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub text: String,
    pub usage: Option<Usage>,
}

/// Anything that can turn an image into text.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        action: AnalysisAction,
        image: &ImageInput,
        prompt: Option<&str>,
    ) -> ProxyResult<AnalysisResult>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisRequest<'a> {
    action: AnalysisAction,
    image: &'a str,
    media_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
}

#[derive(Deserialize)]
struct AnalysisResponse {
    success: bool,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the image-analysis proxy.
pub struct AiProxyClient {
    client: Client,
    config: ProxyConfig,
    caller_token: String,
}

impl AiProxyClient {
    pub fn new(config: ProxyConfig, caller_token: impl Into<String>) -> ProxyResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            config,
            caller_token: caller_token.into(),
        })
    }
}

#[async_trait]
impl ImageAnalyzer for AiProxyClient {
    async fn analyze(
        &self,
        action: AnalysisAction,
        image: &ImageInput,
        prompt: Option<&str>,
    ) -> ProxyResult<AnalysisResult> {
        let body = AnalysisRequest {
            action,
            image: &image.data,
            media_type: &image.media_type,
            prompt,
        };
        let resp = send_with_retry(action.as_str(), self.config.retry_delay(), || {
            self.client
                .post(&self.config.analysis_url)
                .bearer_auth(&self.caller_token)
                .json(&body)
        })
        .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProxyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AnalysisResponse = resp.json().await?;
        if !parsed.success {
            return Err(ProxyError::AnalysisFailed(
                parsed.error.unwrap_or_else(|| "proxy reported failure".to_string()),
            ));
        }
        let text = parsed
            .result
            .ok_or_else(|| ProxyError::AnalysisFailed("response has no result".to_string()))?;

        debug!("{} returned {} chars", action.as_str(), text.len());
        Ok(AnalysisResult {
            text,
            usage: parsed.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[test]
    fn sniffs_known_formats() {
        assert_eq!(sniff_media_type(PNG_HEADER), "image/png");
        assert_eq!(sniff_media_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_media_type(b"GIF89a...."), "image/gif");
        assert_eq!(sniff_media_type(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(sniff_media_type(b"plain bytes"), "image/jpeg");
        assert_eq!(sniff_media_type(b"RIFF"), "image/jpeg");
    }

    #[test]
    fn parses_data_url() {
        let encoded = STANDARD.encode(PNG_HEADER);
        let input = ImageInput::parse(&format!("data:image/webp;base64,{encoded}")).unwrap();
        // Declared type wins over sniffing.
        assert_eq!(input.media_type, "image/webp");
        assert_eq!(input.data, encoded);
    }

    #[test]
    fn parses_bare_base64_with_sniffing() {
        let input = ImageInput::parse(&STANDARD.encode(PNG_HEADER)).unwrap();
        assert_eq!(input.media_type, "image/png");

        let gif = ImageInput::parse(&STANDARD.encode(b"GIF87a\x01\x00")).unwrap();
        assert_eq!(gif.media_type, "image/gif");
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in [
            "",
            "not base64!!",
            "data:image/png,abc",
            "data:;base64,AAAA",
            "data:image/png;base64",
            "data:image/png;base64,",
        ] {
            assert!(
                matches!(ImageInput::parse(bad), Err(ProxyError::InvalidImage(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn data_url_round_trip() {
        let input = ImageInput::from_bytes(PNG_HEADER);
        assert_eq!(ImageInput::parse(&input.to_data_url()).unwrap(), input);
    }

    #[test]
    fn action_wire_names() {
        assert_eq!(serde_json::to_string(&AnalysisAction::Ocr).unwrap(), "\"ocr\"");
        assert_eq!(
            serde_json::from_str::<AnalysisAction>("\"describe\"").unwrap(),
            AnalysisAction::Describe
        );
        assert!(serde_json::from_str::<AnalysisAction>("\"translate\"").is_err());
    }
}
