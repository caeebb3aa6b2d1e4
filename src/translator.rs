use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use serde_json::json;
use tera::{Context as TeraContext, Tera};
use tracing::debug;

use crate::backend::{TranslationBackend, TranslationFuture, non_empty};
use crate::languages::LanguageRegistry;
use crate::providers::{Provider, ProviderResponse, ProviderUsage, ToolSpec};

pub const SENTENCE_TOOL_NAME: &str = "deliver_sentence_translation";
pub const WORD_TOOL_NAME: &str = "deliver_word_translation";

const SENTENCE_SYSTEM_PROMPT: &str = "\
You translate one sentence from {{ source_name }} ({{ source_lang }}) to {{ target_name }} ({{ target_lang }}).
Keep the meaning and register of the original. Do not explain or annotate.
Return the result by calling the `{{ tool_name }}` tool.";

const WORD_SYSTEM_PROMPT: &str = "\
You translate a single word from {{ source_name }} ({{ source_lang }}) to {{ target_name }} ({{ target_lang }}).
Pick the sense the word has in the given sentence and answer with the word or short phrase a reader would look up.
Return the result by calling the `{{ tool_name }}` tool.";

const WORD_USER_PROMPT: &str = "\
Word: {{ word }}
Sentence: {{ sentence }}";

/// LLM-backed translation collaborator.
///
/// Clones share one token usage tally.
#[derive(Debug, Clone)]
pub struct Translator<P: Provider> {
    provider: P,
    registry: LanguageRegistry,
    usage: Arc<Mutex<ProviderUsage>>,
}

#[derive(Debug, Deserialize)]
struct ToolArgs {
    #[serde(default)]
    translation: Option<String>,
}

impl<P: Provider + 'static> Translator<P> {
    pub fn new(provider: P, registry: LanguageRegistry) -> Self {
        Self {
            provider,
            registry,
            usage: Arc::new(Mutex::new(ProviderUsage::default())),
        }
    }

    /// Tokens reported by the provider across all calls so far.
    pub fn usage(&self) -> ProviderUsage {
        self.usage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn call_tool(
        &self,
        tool: ToolSpec,
        system_prompt: String,
        user_input: String,
    ) -> Result<ProviderResponse> {
        let tool_name = tool.name.clone();
        let response = self
            .provider
            .clone()
            .register_tool(tool)
            .append_system_input(system_prompt)
            .append_user_input(user_input)
            .call_tool(&tool_name)
            .await?;
        if let Some(usage) = response.usage.as_ref() {
            self.usage
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .add(usage);
        }
        Ok(response)
    }

    pub async fn sentence(&self, sentence: &str, from: &str, to: &str) -> Result<Option<String>> {
        let system = render_prompt(
            SENTENCE_SYSTEM_PROMPT,
            &self.prompt_context(from, to, SENTENCE_TOOL_NAME),
        )?;
        let response = self
            .call_tool(tool_spec(SENTENCE_TOOL_NAME), system, sentence.to_string())
            .await?;
        parse_translation(response)
    }

    pub async fn word(
        &self,
        word: &str,
        sentence: &str,
        from: &str,
        to: &str,
    ) -> Result<Option<String>> {
        let mut context = self.prompt_context(from, to, WORD_TOOL_NAME);
        let system = render_prompt(WORD_SYSTEM_PROMPT, &context)?;
        context.insert("word", word);
        context.insert("sentence", sentence);
        let user = render_prompt(WORD_USER_PROMPT, &context)?;
        let response = self
            .call_tool(tool_spec(WORD_TOOL_NAME), system, user)
            .await?;
        parse_translation(response)
    }

    fn prompt_context(&self, from: &str, to: &str, tool_name: &str) -> TeraContext {
        let mut context = TeraContext::new();
        context.insert("source_lang", from);
        context.insert("target_lang", to);
        context.insert("source_name", &self.display_name(from));
        context.insert("target_name", &self.display_name(to));
        context.insert("tool_name", tool_name);
        context
    }

    fn display_name(&self, code: &str) -> String {
        self.registry
            .name(code)
            .map(str::to_string)
            .unwrap_or_else(|| code.to_string())
    }
}

impl<P: Provider + 'static> TranslationBackend for Translator<P> {
    fn translate_sentence(&self, sentence: &str, from: &str, to: &str) -> TranslationFuture {
        let translator = self.clone();
        let (sentence, from, to) = (sentence.to_string(), from.to_string(), to.to_string());
        Box::pin(async move { translator.sentence(&sentence, &from, &to).await })
    }

    fn translate_word_in_sentence(
        &self,
        word: &str,
        sentence: &str,
        from: &str,
        to: &str,
    ) -> TranslationFuture {
        let translator = self.clone();
        let (word, sentence) = (word.to_string(), sentence.to_string());
        let (from, to) = (from.to_string(), to.to_string());
        Box::pin(async move { translator.word(&word, &sentence, &from, &to).await })
    }
}

pub fn tool_spec(tool_name: &str) -> ToolSpec {
    ToolSpec {
        name: tool_name.to_string(),
        description: "Return the translation.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "translation": {"type": "string"}
            },
            "required": ["translation"]
        }),
    }
}

fn render_prompt(template: &str, context: &TeraContext) -> Result<String> {
    Tera::one_off(template, context, false).with_context(|| "failed to render prompt")
}

fn parse_translation(response: ProviderResponse) -> Result<Option<String>> {
    if let Some(model) = response.model.as_deref() {
        let total = response.usage.as_ref().and_then(|usage| usage.total_tokens);
        debug!("translation returned by {} ({:?} tokens)", model, total);
    }
    let args: ToolArgs =
        serde_json::from_value(response.args).with_context(|| "invalid tool arguments")?;
    Ok(non_empty(args.translation))
}
