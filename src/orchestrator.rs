//! Question answering pipeline for Sunno.
//!
//! One request runs through a fixed sequence of stages:
//! detect language, retrieve, assemble context, generate (or extract),
//! format. Retrieval or assembly coming back empty ends the request with the
//! localized no-result message. Nothing past this boundary surfaces an error;
//! the caller always gets an answer string and a (possibly empty) source list.

use crate::config::{GenerationProvider, LanguageTemplate, Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::index::EvidenceIndex;
use crate::language::{Language, LanguageIdentifier};
use crate::rag::{
    style_answer, AnswerGenerator, ContextAssembler, EvidenceBundle, ExtractiveOnly,
    FallbackExtractor, GenerationOutcome, Generator, HeuristicTokenizer, OpenAIGenerator,
    PromptBudget, SourceFormatter, TextGenerationClient, Tokenizer, WeakReason,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// A question from a consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// Number of hits to retrieve; the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// Final answer with the video links that support it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub answer: String,
    pub sources: Vec<String>,
}

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DetectLanguage,
    Retrieve,
    NoResult,
    AssembleContext,
    Generate,
    Extract,
    Format,
    Done,
}

fn enter(stage: Stage) {
    debug!(?stage, "Entering stage");
}

/// The answer pipeline. Build once, share across requests.
pub struct Orchestrator {
    prompts: Prompts,
    identifier: LanguageIdentifier,
    index: Arc<EvidenceIndex>,
    assembler: ContextAssembler,
    budget: PromptBudget,
    tokenizer: Arc<dyn Tokenizer>,
    generator: AnswerGenerator,
    extractor: FallbackExtractor,
    formatter: SourceFormatter,
    default_top_k: usize,
    max_meta_lines: usize,
    max_evidence_blocks: usize,
    append_sources: bool,
    decorate: bool,
    timeout: Duration,
}

impl Orchestrator {
    /// Create an orchestrator from settings, loading the index from disk.
    ///
    /// A missing or mismatched index does not fail construction; the index
    /// is marked unavailable and every question gets the no-result message.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        )?);
        let index = EvidenceIndex::open(&settings.index_dir(), embedder)
            .with_query_prefix(settings.embedding.query_prefix.clone());

        let backend = create_generator(settings)?;
        info!("Using {} generation backend", settings.generation.provider);

        Ok(Self::with_components(settings, prompts, Arc::new(index), backend))
    }

    /// Assemble an orchestrator from already constructed parts.
    pub fn with_components(
        settings: &Settings,
        prompts: Prompts,
        index: Arc<EvidenceIndex>,
        backend: Arc<dyn Generator>,
    ) -> Self {
        let retrieval = &settings.retrieval;
        let generation = &settings.generation;

        let assembler = ContextAssembler::new()
            .with_mode(retrieval.mode)
            .with_window(retrieval.window)
            .with_max_context_chars(retrieval.max_context_chars)
            .with_max_block_chars(retrieval.max_block_chars);

        let budget = PromptBudget::new(
            generation.max_context_tokens,
            generation.max_new_tokens,
            generation.safety_margin,
        )
        .with_max_block_chars(generation.max_block_chars);

        Self {
            prompts,
            identifier: LanguageIdentifier::new(),
            index,
            assembler,
            budget,
            tokenizer: Arc::new(HeuristicTokenizer::new(generation.chars_per_token)),
            generator: AnswerGenerator::new(backend, generation.options()),
            extractor: FallbackExtractor::new(),
            formatter: SourceFormatter::new(settings.answer.max_sources),
            default_top_k: retrieval.top_k,
            max_meta_lines: generation.max_meta_lines,
            max_evidence_blocks: generation.max_evidence_blocks,
            append_sources: settings.answer.append_sources,
            decorate: settings.answer.decorate,
            timeout: Duration::from_secs(settings.answer.request_timeout_secs),
        }
    }

    /// Use a different language identifier.
    pub fn with_identifier(mut self, identifier: LanguageIdentifier) -> Self {
        self.identifier = identifier;
        self
    }

    /// Use a model-specific tokenizer for prompt budgeting.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Override the overall request time limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The evidence index this orchestrator searches.
    pub fn index(&self) -> &Arc<EvidenceIndex> {
        &self.index
    }

    /// Answer a question. Never fails.
    #[instrument(skip(self, request), fields(request_id = %Uuid::new_v4()))]
    pub async fn answer(&self, request: &AskRequest) -> Response {
        match tokio::time::timeout(self.timeout, self.run(request)).await {
            Ok(response) => response,
            Err(_) => {
                warn!("Request timed out after {:?}", self.timeout);
                let language = self.identifier.detect(&request.question);
                Response {
                    answer: self.prompts.for_language(language).fallback_placeholder.clone(),
                    sources: Vec::new(),
                }
            }
        }
    }

    async fn run(&self, request: &AskRequest) -> Response {
        enter(Stage::DetectLanguage);
        let question = request.question.trim();
        let language = self.identifier.detect(question);
        let template = self.prompts.for_language(language);
        info!("Question language: {}", language);

        enter(Stage::Retrieve);
        if question.is_empty() {
            debug!("Blank question");
            return no_result(template);
        }
        let Some(snapshot) = self.index.snapshot() else {
            error!("Evidence index is not loaded");
            return no_result(template);
        };
        let top_k = request.top_k.unwrap_or(self.default_top_k);
        let hits = self.index.search_snapshot(&snapshot, question, top_k).await;
        if hits.is_empty() {
            return no_result(template);
        }

        enter(Stage::AssembleContext);
        let bundle = self.assembler.assemble(&hits, &snapshot);
        if bundle.is_empty() {
            return no_result(template);
        }
        let context = self.extractor.clean_context(&bundle.context_text());

        enter(Stage::Generate);
        let text = match self.generate(language, question, &bundle).await {
            GenerationOutcome::Accepted(text) => text,
            GenerationOutcome::Weak(reason) => {
                enter(Stage::Extract);
                info!("Falling back to extraction: {}", reason);
                self.extractor.extract(&context, &template.fallback_placeholder)
            }
        };

        enter(Stage::Format);
        let sources = self.formatter.select(&bundle.source_urls);
        let mut answer = if self.decorate {
            style_answer(&text, template)
        } else {
            text
        };
        if self.append_sources && !sources.is_empty() {
            answer.push_str("\n\n");
            answer.push_str(&self.formatter.format_block(&sources, template));
        }

        enter(Stage::Done);
        info!("Answered with {} sources", sources.len());
        Response { answer, sources }
    }

    async fn generate(
        &self,
        language: Language,
        question: &str,
        bundle: &EvidenceBundle,
    ) -> GenerationOutcome {
        let prefix = self.prompts.instruction(language, question);
        let meta: Vec<String> = bundle
            .meta_lines
            .iter()
            .take(self.max_meta_lines)
            .cloned()
            .collect();
        let evidence: Vec<String> = bundle
            .ordered_text_blocks
            .iter()
            .map(|block| self.extractor.clean_context(block))
            .filter(|block| !block.is_empty())
            .take(self.max_evidence_blocks)
            .collect();

        let plan = self
            .budget
            .trim(self.tokenizer.as_ref(), &prefix, &meta, &evidence);
        debug!(
            "Prompt plan: {} meta lines, {} evidence blocks",
            plan.kept_meta_lines.len(),
            plan.kept_evidence_blocks.len()
        );
        if !plan.has_evidence() {
            warn!("No evidence fits the prompt budget; skipping generation");
            return GenerationOutcome::Weak(WeakReason::Empty);
        }

        self.generator.generate(&plan.render()).await
    }
}

fn no_result(template: &LanguageTemplate) -> Response {
    enter(Stage::NoResult);
    Response {
        answer: template.no_result.clone(),
        sources: Vec::new(),
    }
}

/// Build the generation backend named in settings.
pub fn create_generator(settings: &Settings) -> Result<Arc<dyn Generator>> {
    let generation = &settings.generation;
    let backend: Arc<dyn Generator> = match generation.provider {
        GenerationProvider::OpenAI => Arc::new(OpenAIGenerator::new(&generation.model)?),
        GenerationProvider::Tgi => Arc::new(TextGenerationClient::new(
            &generation.endpoint,
            Duration::from_secs(settings.answer.request_timeout_secs),
        )?),
        GenerationProvider::Extractive => Arc::new(ExtractiveOnly),
    };
    Ok(backend)
}
