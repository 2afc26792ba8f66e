/*!
 * Typed oracle client: one record in, one validated translated record out.
 */

use log::debug;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::errors::TranslationError;
use crate::providers::{ChatRequest, Provider};
use crate::translation::document::Document;
use crate::translation::prompts::{PromptTemplate, RenderedPrompt, render_schema};
use crate::validation::ResponseValidator;

/// Translates records of type `D` through a provider
#[derive(Debug)]
pub struct TranslationClient<D: Document> {
    provider: Arc<dyn Provider>,
    template: PromptTemplate,
    validator: ResponseValidator,
    schema: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    source_language: String,
    target_language: String,
    _record: PhantomData<fn() -> D>,
}

impl<D: Document> TranslationClient<D> {
    /// Create a client; languages are the names rendered into the prompt
    pub fn new(
        provider: Arc<dyn Provider>,
        template: PromptTemplate,
        model: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        lenient_json: bool,
    ) -> Self {
        let validator = ResponseValidator::for_document::<D>(&template, lenient_json);
        Self {
            provider,
            validator,
            template,
            schema: render_schema(D::fields()),
            model: model.into(),
            temperature: None,
            max_tokens: None,
            source_language: source_language.into(),
            target_language: target_language.into(),
            _record: PhantomData,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Render the prompt for a record
    pub fn render(&self, document: &D) -> Result<RenderedPrompt, TranslationError> {
        let payload = serde_json::to_string_pretty(&Value::Object(document.payload()))
            .map_err(|e| TranslationError::Unclassified(format!("cannot serialize record: {}", e)))?;

        Ok(self
            .template
            .render(&self.source_language, &self.target_language, &self.schema, &payload))
    }

    /// Build the provider request for a record
    pub fn build_request(&self, document: &D) -> Result<ChatRequest, TranslationError> {
        let prompt = self.render(document)?;
        let mut request = ChatRequest::new(&self.model)
            .system(prompt.system)
            .user(prompt.user)
            .json();
        if let Some(temperature) = self.temperature {
            request = request.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.max_tokens(max_tokens);
        }
        Ok(request)
    }

    /// One oracle call, parsed and validated
    pub async fn translate(&self, document: &D) -> Result<D, TranslationError> {
        let request = self.build_request(document)?;
        let response = self.provider.complete(request).await?;

        if let (Some(prompt), Some(completion)) = (response.prompt_tokens, response.completion_tokens) {
            debug!("{} call used {} prompt / {} completion tokens", self.provider.name(), prompt, completion);
        }

        let object = self.validator.validate(&response.text)?;
        Ok(document.translated(&object)?)
    }
}
