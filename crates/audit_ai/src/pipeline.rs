use std::path::Path;
use std::sync::Arc;

use audit_core::config::{AuditConfig, RetrievalMode, DEFAULT_TOP_K};
use audit_core::domain::{AuditRequest, AuditResult, Confidence, Intent, Judgment, Status};
use audit_core::error::AppError;
use audit_core::repo::ChunkStore;
use tracing::{info, warn};

use crate::breaker;
use crate::citations::verify_citations;
use crate::context::assemble;
use crate::embeddings::OpenAiEmbedder;
use crate::index::QdrantIndex;
use crate::intent::IntentRouter;
use crate::judge::JudgmentGenerator;
use crate::llm::{Llm, OpenAiLlm};
use crate::retrieve::Retriever;
use crate::store::SourceStore;

pub const REJECT_REASON: &str = "This query appears unrelated to banking compliance. Access denied.";

#[derive(Debug, Clone, PartialEq)]
pub struct AuditorSettings {
    pub bank_name: String,
    pub top_k: usize,
    pub mode: RetrievalMode,
}

impl Default for AuditorSettings {
    fn default() -> Self {
        Self {
            bank_name: "BAL".to_string(),
            top_k: DEFAULT_TOP_K as usize,
            mode: RetrievalMode::Ranked,
        }
    }
}

/// Runs one query through routing, retrieval, assembly, the circuit breaker,
/// generation and citation verification, strictly in that order.
///
/// Holds no per-query state; one auditor serves concurrent queries and only
/// the router's intent cache is shared between them.
pub struct ComplianceAuditor {
    router: IntentRouter,
    retriever: Retriever,
    generator: JudgmentGenerator,
    settings: AuditorSettings,
}

impl ComplianceAuditor {
    pub fn new(
        router: IntentRouter,
        retriever: Retriever,
        generator: JudgmentGenerator,
        settings: AuditorSettings,
    ) -> Self {
        Self {
            router,
            retriever,
            generator,
            settings,
        }
    }

    /// Open the chunk store at `cfg.db_path` and wire everything else from
    /// configuration.
    pub fn open(cfg: &AuditConfig) -> Result<Self, AppError> {
        cfg.validate()?;
        let store = ChunkStore::open(Path::new(&cfg.db_path))?;
        info!(db_path = %cfg.db_path, "opened chunk store");
        Self::from_config(cfg, Arc::new(store))
    }

    /// Wire the OpenAI and Qdrant adapters from configuration.
    pub fn from_config(cfg: &AuditConfig, store: Arc<dyn SourceStore>) -> Result<Self, AppError> {
        cfg.validate()?;
        let llm: Arc<dyn Llm> = Arc::new(OpenAiLlm::from_config(&cfg.openai, &cfg.retry)?);
        let embedder = Arc::new(OpenAiEmbedder::from_config(&cfg.openai, &cfg.retry)?);
        let index = Arc::new(QdrantIndex::from_config(&cfg.qdrant, &cfg.retry)?);

        let router = IntentRouter::new(llm.clone()).with_capacity(cfg.intent_cache_capacity);
        let retriever = Retriever::new(embedder, index, store)
            .with_min_score(cfg.retrieval.similarity_threshold);
        let generator = JudgmentGenerator::new(llm);
        let settings = AuditorSettings {
            bank_name: cfg.bank_name.clone(),
            top_k: cfg.retrieval.top_k as usize,
            mode: cfg.retrieval.mode,
        };
        Ok(Self::new(router, retriever, generator, settings))
    }

    pub fn router(&self) -> &IntentRouter {
        &self.router
    }

    pub fn analyze(&self, query: &str) -> AuditResult {
        self.run(query, None)
    }

    pub fn audit(&self, req: &AuditRequest) -> AuditResult {
        let policy = req.policy_id.as_deref().map(str::trim).filter(|p| !p.is_empty());
        self.run(&req.query, policy)
    }

    fn run(&self, query: &str, policy_filter: Option<&str>) -> AuditResult {
        let intent = self.router.classify(query);
        info!(intent = intent.as_str(), "query intent");

        match intent {
            Intent::Reject => {
                return AuditResult::Judgment(Judgment::inconclusive(REJECT_REASON, intent));
            }
            Intent::SystemMetadata => return AuditResult::Judgment(self.identity()),
            Intent::ComplianceAudit => {}
        }

        info!(policy_filter = ?policy_filter, "retrieving evidence");
        let evidence = match (self.settings.mode, policy_filter) {
            (RetrievalMode::Ranked, None) => self.retriever.retrieve(query, self.settings.top_k),
            _ => self
                .retriever
                .retrieve_balanced(query, self.settings.top_k, policy_filter),
        };

        let ctx = assemble(&evidence);
        if let Err(trip) = breaker::check(evidence.len(), &ctx.counts) {
            return AuditResult::Judgment(trip.judgment(intent));
        }

        match self.generator.judge(query, &ctx.text, intent) {
            Ok(judgment) => {
                let verified = verify_citations(judgment, &ctx.valid_labels());
                info!(
                    status = ?verified.status,
                    citations = verified.citations.len(),
                    "audit complete"
                );
                AuditResult::Judgment(verified)
            }
            Err(e) => {
                warn!(code = e.code(), error = %e, "audit ended with generator error");
                AuditResult::Failure(e.to_failure())
            }
        }
    }

    fn identity(&self) -> Judgment {
        Judgment {
            status: Status::Pass,
            confidence: Confidence::High,
            reasoning: format!("I am the {} Compliance Engine.", self.settings.bank_name),
            citations: Vec::new(),
            intent: Intent::SystemMetadata,
        }
    }
}
