use assess_flow::{FlowError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::info;

use super::{ChatCompletion, ChatRequest, read_json, transport};
use crate::config::OpenAiConfig;

const MAX_TOKENS: u32 = 2048;
const TOP_P: f64 = 0.9;

/// Chat-completion client for an Azure OpenAI deployment.
pub struct AzureOpenAiClient {
    http: Client,
    config: OpenAiConfig,
}

impl AzureOpenAiClient {
    pub fn new(http: Client, config: OpenAiConfig) -> Self {
        Self { http, config }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment
        )
    }
}

/// Build the `messages` array: system prompt, then the user prompt with images inlined.
fn build_messages(request: &ChatRequest) -> Value {
    let user_content = if request.images.is_empty() {
        json!(request.user_prompt)
    } else {
        let mut content = vec![json!({
            "type": "text",
            "text": request.user_prompt
        })];
        content.extend(request.images.iter().map(|image| {
            json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:image/jpeg;base64,{}", image)
                }
            })
        }));
        Value::Array(content)
    };

    json!([
        { "role": "system", "content": request.system_prompt },
        { "role": "user", "content": user_content }
    ])
}

#[async_trait]
impl ChatCompletion for AzureOpenAiClient {
    fn ensure_configured(&self) -> Result<()> {
        if self.config.api_key_configured() {
            Ok(())
        } else {
            Err(FlowError::NotConfigured(
                "Azure OpenAI API key not configured. Please set AZURE_OPENAI_API_KEY in your .env file."
                    .to_string(),
            ))
        }
    }

    async fn complete(&self, request: ChatRequest) -> Result<String> {
        self.ensure_configured()?;
        let api_key = self.config.api_key.as_deref().unwrap_or_default();

        let payload = json!({
            "model": self.config.deployment,
            "messages": build_messages(&request),
            "max_tokens": MAX_TOKENS,
            "temperature": request.temperature,
            "top_p": TOP_P
        });

        info!(
            deployment = %self.config.deployment,
            images = request.images.len(),
            "Calling chat completion"
        );

        let response = self
            .http
            .post(self.completions_url())
            .query(&[("api-version", self.config.api_version.as_str())])
            .header("api-key", api_key)
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;

        let response_json: Value = read_json(response).await?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| FlowError::provider(200, "Invalid response format from LLM"))?;

        info!(reply_len = content.len(), "Chat completion returned");
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str, api_key: Option<&str>) -> OpenAiConfig {
        OpenAiConfig {
            endpoint: format!("{}/", endpoint),
            model: "gpt-4o".to_string(),
            deployment: "vision".to_string(),
            api_key: api_key.map(str::to_string),
            api_version: "2024-12-01-preview".to_string(),
        }
    }

    fn request(images: Vec<String>) -> ChatRequest {
        ChatRequest {
            system_prompt: "You are a pediatric assistant.".to_string(),
            user_prompt: "Assess this image.".to_string(),
            images,
            temperature: 0.3,
        }
    }

    #[test]
    fn images_are_inlined_as_data_urls() {
        let messages = build_messages(&request(vec!["QUJD".to_string()]));

        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"][0]["type"], "text");
        assert_eq!(
            messages[1]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,QUJD"
        );
    }

    #[test]
    fn text_only_requests_use_plain_content() {
        let messages = build_messages(&request(vec![]));
        assert_eq!(messages[1]["content"], "Assess this image.");
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/openai/deployments/vision/chat/completions"))
            .and(query_param("api-version", "2024-12-01-preview"))
            .and(header("api-key", "secret"))
            .and(body_partial_json(json!({ "max_tokens": 2048, "top_p": 0.9 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "{\"ok\": true}" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AzureOpenAiClient::new(Client::new(), config(&server.uri(), Some("secret")));
        let reply = client.complete(request(vec![])).await.unwrap();

        assert_eq!(reply, "{\"ok\": true}");
    }

    #[tokio::test]
    async fn provider_errors_carry_the_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string("Access denied due to invalid subscription key"),
            )
            .mount(&server)
            .await;

        let client = AzureOpenAiClient::new(Client::new(), config(&server.uri(), Some("wrong")));
        let err = client.complete(request(vec![])).await.unwrap_err();

        match err {
            FlowError::Provider { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("invalid subscription key"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_success_body_is_a_provider_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let client = AzureOpenAiClient::new(Client::new(), config(&server.uri(), Some("secret")));
        let err = client.complete(request(vec![])).await.unwrap_err();

        match err {
            FlowError::Provider { status, message } => {
                assert_eq!(status, 200);
                assert!(message.starts_with("Malformed response body"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_key_fails_without_a_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = AzureOpenAiClient::new(Client::new(), config(&server.uri(), None));
        let err = client.complete(request(vec![])).await.unwrap_err();

        assert!(matches!(err, FlowError::NotConfigured(_)));
    }
}
