//! The coordinator: one verdict per citation, input order, bounded fan-out.

use lexaudit_core::{
    AuditConfig, AuditError, AuditReport, CanonicalReference, EvidenceUnit, LocatorStep,
    RawCitationSpan, ResolutionResult, TrustLevel, UnitType, ValidationVerdict, VerdictStatus,
};
use lexaudit_debate::{AgentInvoker, DebateError, DebateOrchestrator, EvidenceContext};
use lexaudit_resolve::{ReferenceNormalizer, ResolutionService};
use lexaudit_retrieve::{RetrievalCache, RetrievalError, SearchService, SourceRetriever};
use lexaudit_segment::{LocateOutcome, SegmentCache, SegmentIndex};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct Inner {
    normalizer: ReferenceNormalizer,
    retriever: SourceRetriever,
    segments: SegmentCache,
    debate: DebateOrchestrator,
    /// Shared budget across retrieval and verifier calls.
    rate: Semaphore,
    cancel: watch::Receiver<bool>,
    config: AuditConfig,
}

/// The audit engine's front door. Owns the collaborators, the shared
/// retrieval cache, and the run-level cancellation signal.
pub struct AuditPipeline {
    inner: Arc<Inner>,
    cancel_tx: watch::Sender<bool>,
}

impl AuditPipeline {
    pub fn new(
        resolver: Arc<dyn ResolutionService>,
        search: Arc<dyn SearchService>,
        invoker: Arc<dyn AgentInvoker>,
        config: AuditConfig,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let cache = Arc::new(RetrievalCache::new(config.retrieval.cache_ttl));
        let retriever = SourceRetriever::new(search, cache, config.retrieval.clone())
            .with_cancellation(cancel_rx.clone());
        let debate = DebateOrchestrator::new(invoker, config.debate.clone())
            .with_cancellation(cancel_rx.clone());
        let normalizer =
            ReferenceNormalizer::new(resolver, config.resolution_confidence_threshold);
        Self {
            inner: Arc::new(Inner {
                normalizer,
                retriever,
                segments: SegmentCache::new(),
                debate,
                rate: Semaphore::new(config.request_rate_permits.max(1)),
                cancel: cancel_rx,
                config,
            }),
            cancel_tx,
        }
    }

    /// Signal cancellation: in-flight citations degrade to `Timeout` at
    /// their next stage boundary; no new external calls are started.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Audit every span. Exactly one verdict per input span, in input
    /// order; only infrastructure failures abort the run.
    pub async fn run(&self, spans: Vec<RawCitationSpan>) -> Result<AuditReport, AuditError> {
        let run_id = Uuid::new_v4();
        let total = spans.len();
        info!(%run_id, citations = total, "starting audit run");

        let worker_limit = Arc::new(Semaphore::new(self.inner.config.worker_concurrency.max(1)));
        let mut join_set = JoinSet::new();
        for (index, span) in spans.into_iter().enumerate() {
            let inner = self.inner.clone();
            let worker_limit = worker_limit.clone();
            join_set.spawn(async move {
                let _permit = match worker_limit.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            index,
                            ValidationVerdict::terminal(
                                &span.text,
                                None,
                                VerdictStatus::Timeout,
                                "worker pool shut down",
                            ),
                        )
                    }
                };
                let citation = span.text.clone();
                let budget = inner.config.citation_timeout;
                let verdict = match tokio::time::timeout(budget, audit_one(&inner, span)).await {
                    Ok(verdict) => verdict,
                    Err(_) => {
                        warn!(%citation, "citation exceeded its processing budget");
                        ValidationVerdict::terminal(
                            citation,
                            None,
                            VerdictStatus::Timeout,
                            "citation exceeded its processing budget",
                        )
                    }
                };
                (index, verdict)
            });
        }

        let mut slots: Vec<Option<ValidationVerdict>> = (0..total).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            let (index, verdict) = joined
                .map_err(|e| AuditError::Infrastructure(format!("citation worker panicked: {e}")))?;
            slots[index] = Some(verdict);
        }

        let mut verdicts = Vec::with_capacity(total);
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(verdict) => verdicts.push(verdict),
                None => {
                    return Err(AuditError::Infrastructure(format!(
                        "no verdict produced for citation {index}"
                    )))
                }
            }
        }
        let report = AuditReport { verdicts };
        info!(
            %run_id,
            correct = report.count(VerdictStatus::Correct),
            nonexistent = report.count(VerdictStatus::Nonexistent),
            "audit run finished"
        );
        Ok(report)
    }
}

/// Audit a single citation end to end. Infallible: every collaborator
/// failure folds into a terminal verdict.
async fn audit_one(inner: &Inner, span: RawCitationSpan) -> ValidationVerdict {
    if is_cancelled(inner) {
        return cancelled_verdict(&span.text, None);
    }

    // Stage 1: normalization.
    let (reference, low_confidence) = match inner.normalizer.normalize(&span).await {
        ResolutionResult::Resolved {
            reference,
            low_confidence,
            ..
        } => (reference, low_confidence),
        ResolutionResult::Ambiguous { candidates } => {
            let readings = candidates
                .iter()
                .map(|c| c.reference.instrument_key().urn())
                .collect::<Vec<_>>()
                .join(", ");
            let mut verdict = ValidationVerdict::terminal(
                &span.text,
                None,
                VerdictStatus::Ambiguous,
                format!("multiple instruments fit the citation: {readings}"),
            );
            verdict.confidence = 0.5;
            return verdict;
        }
        ResolutionResult::Unresolved { reason } => {
            return ValidationVerdict::terminal(
                &span.text,
                None,
                VerdictStatus::Nonexistent,
                format!("could not determine a unique legal instrument: {reason}"),
            );
        }
    };

    // Stage 2: retrieval, through the shared cache and rate budget.
    let key = reference.instrument_key();
    let fetched = {
        let _permit = match inner.rate.acquire().await {
            Ok(permit) => permit,
            Err(_) => return cancelled_verdict(&span.text, Some(reference)),
        };
        inner.retriever.fetch(&key).await
    };
    let record = match fetched {
        Ok(record) => record,
        Err(RetrievalError::NotFound(urn)) => {
            return ValidationVerdict::terminal(
                &span.text,
                Some(reference),
                VerdictStatus::Nonexistent,
                format!("no official source found for {urn}"),
            );
        }
        Err(err) => {
            return ValidationVerdict::terminal(
                &span.text,
                Some(reference),
                VerdictStatus::Timeout,
                format!("official text retrieval failed: {err}"),
            );
        }
    };
    if is_cancelled(inner) {
        return cancelled_verdict(&span.text, Some(reference));
    }

    // Stage 3: segmentation and locator lookup.
    let index = inner.segments.index_for(&record);
    let mut context = EvidenceContext {
        citation_text: span.text.clone(),
        instrument_urn: key.urn(),
        ..Default::default()
    };
    match index.locate(&reference.locator_path) {
        LocateOutcome::Located { units, renumbered } => {
            context.renumbered = renumbered;
            context.revoked = units.iter().any(|u| u.revoked);
            context.evidence = unit_snippets(inner, &index, &units);
        }
        LocateOutcome::Missing {
            nearest_article,
            highest_article,
        } => {
            let cited = cited_article(&reference);
            let highest = highest_article.as_deref().and_then(|v| v.parse::<u32>().ok());
            match (cited, highest) {
                // Cited past the end of the instrument: never existed.
                (Some(cited), Some(highest)) if cited > highest => {
                    return ValidationVerdict::terminal(
                        &span.text,
                        Some(reference),
                        VerdictStatus::Nonexistent,
                        format!(
                            "article {cited} does not exist in {}; the instrument's last article is {highest}",
                            key.urn()
                        ),
                    );
                }
                (_, None) => {
                    return ValidationVerdict::terminal(
                        &span.text,
                        Some(reference),
                        VerdictStatus::Nonexistent,
                        "the retrieved text contains no addressable provisions",
                    );
                }
                // A gap inside the numbering: the panel decides what
                // happened to it, grounded in the nearest article.
                _ => {
                    debug!(citation = %span.text, "locator missing, debating with surrounding context");
                    context.locator_missing = true;
                    if let Some(nearest) = nearest_article {
                        let step = LocatorStep::new(UnitType::Article, nearest);
                        if let LocateOutcome::Located { units, .. } =
                            index.locate(std::slice::from_ref(&step))
                        {
                            context.revoked = units.iter().any(|u| u.revoked);
                            context.evidence = unit_snippets(inner, &index, &units);
                        }
                    }
                    // Locators without an article step (a bare "parágrafo
                    // único", say) have no nearest article; the panel is
                    // anchored on the instrument's opening units instead so
                    // its verdict always carries quotable evidence.
                    if context.evidence.is_empty() {
                        let opening: Vec<_> = index.units().iter().take(3).cloned().collect();
                        context.evidence = unit_snippets(inner, &index, &opening);
                    }
                }
            }
        }
    }

    // Stage 4: adjudication.
    let outcome = {
        let _permit = match inner.rate.acquire().await {
            Ok(permit) => permit,
            Err(_) => return cancelled_verdict(&span.text, Some(reference)),
        };
        inner.debate.adjudicate(&context).await
    };
    match outcome {
        Ok(outcome) => {
            let mut confidence = outcome.confidence;
            let mut justification = outcome.justification;
            if record.trust_level == TrustLevel::Low
                && confidence > inner.config.low_trust_confidence_cap
            {
                confidence = inner.config.low_trust_confidence_cap;
                justification.push_str(" (non-official source; confidence capped)");
            }
            if low_confidence {
                justification.push_str(" (citation lacked a subdivision locator)");
            }
            ValidationVerdict {
                citation_text: span.text,
                reference: Some(reference),
                status: outcome.status,
                confidence,
                justification,
                evidence_quotes: outcome.evidence_quotes,
                source_urls: vec![record.source_url.clone()],
            }
        }
        Err(DebateError::Cancelled) => cancelled_verdict(&span.text, Some(reference)),
        Err(DebateError::Exhausted(reason)) => ValidationVerdict::terminal(
            &span.text,
            Some(reference),
            VerdictStatus::Timeout,
            format!("verifier panel unavailable: {reason}"),
        ),
    }
}

fn unit_snippets(inner: &Inner, index: &SegmentIndex, units: &[EvidenceUnit]) -> Vec<String> {
    units
        .iter()
        .map(|u| index.snippet(u, inner.config.snippet_min_chars, inner.config.snippet_max_chars))
        .collect()
}

fn is_cancelled(inner: &Inner) -> bool {
    *inner.cancel.borrow()
}

fn cancelled_verdict(citation: &str, reference: Option<CanonicalReference>) -> ValidationVerdict {
    ValidationVerdict::terminal(citation, reference, VerdictStatus::Timeout, "run cancelled")
}

fn cited_article(reference: &CanonicalReference) -> Option<u32> {
    reference
        .locator_path
        .first()
        .filter(|step| step.unit == UnitType::Article)
        .and_then(|step| {
            let digits: String = step
                .value
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lexaudit_core::RankedCandidate;
    use lexaudit_debate::{InvokeError, VerifierContext, VerifierFinding};
    use lexaudit_retrieve::{SearchError, SourceCandidate};
    use lexaudit_resolve::ResolveError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const CF_URN: &str = "urn:lex:br:federal:constituicao:1988";
    const LAW_URN: &str = "urn:lex:br:federal:lei:1990;8112";

    const CF_TEXT: &str = "\
TÍTULO II
CAPÍTULO I
Art. 1º A República Federativa do Brasil, formada pela união indissolúvel dos Estados e Municípios e do Distrito Federal, constitui-se em Estado Democrático de Direito.
Art. 5º Todos são iguais perante a lei, sem distinção de qualquer natureza, garantindo-se aos brasileiros e aos estrangeiros residentes no País a inviolabilidade do direito à vida, à liberdade, à igualdade, à segurança e à propriedade, nos termos seguintes:
X - são invioláveis a intimidade, a vida privada, a honra e a imagem das pessoas, assegurado o direito a indenização pelo dano material ou moral decorrente de sua violação;
XI - a casa é asilo inviolável do indivíduo, ninguém nela podendo penetrar sem consentimento do morador, salvo em caso de flagrante delito ou desastre, ou para prestar socorro, ou, durante o dia, por determinação judicial;
";

    const LAW_TEXT: &str = "\
Art. 1º Esta Lei institui o Regime Jurídico dos Servidores Públicos Civis da União, das autarquias e das fundações públicas federais.
Art. 2º Para os efeitos desta Lei, servidor é a pessoa legalmente investida em cargo público.
Art. 3º Cargo público é o conjunto de atribuições e responsabilidades previstas na estrutura organizacional que devem ser cometidas a um servidor.
Art. 5º São requisitos básicos para investidura em cargo público a nacionalidade brasileira, o gozo dos direitos políticos e a quitação com as obrigações militares e eleitorais.
Art. 7º A investidura em cargo público ocorrerá com a posse do servidor nomeado.
";

    /// Resolver that never recognizes anything the grammar could not parse.
    struct NullResolver;

    #[async_trait]
    impl ResolutionService for NullResolver {
        async fn resolve(
            &self,
            _citation_text: &str,
            _candidates: &[RankedCandidate],
        ) -> Result<Vec<RankedCandidate>, ResolveError> {
            Ok(Vec::new())
        }
    }

    /// Search stub serving canned texts keyed by URN.
    struct MappedSearch {
        texts: HashMap<String, String>,
        host: &'static str,
        fail_fetch: bool,
        find_calls: AtomicUsize,
    }

    impl MappedSearch {
        fn new(texts: &[(&str, &str)]) -> Self {
            Self {
                texts: texts
                    .iter()
                    .map(|(urn, text)| (urn.to_string(), text.to_string()))
                    .collect(),
                host: "www.planalto.gov.br",
                fail_fetch: false,
                find_calls: AtomicUsize::new(0),
            }
        }

        fn untrusted(mut self) -> Self {
            self.host = "blog.example.com";
            self
        }

        fn failing_fetch(mut self) -> Self {
            self.fail_fetch = true;
            self
        }
    }

    #[async_trait]
    impl SearchService for MappedSearch {
        async fn find_official_source(
            &self,
            key: &lexaudit_core::InstrumentKey,
        ) -> Result<Vec<SourceCandidate>, SearchError> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            let urn = key.urn();
            if self.texts.contains_key(&urn) {
                Ok(vec![SourceCandidate::new(format!(
                    "https://{}/{urn}",
                    self.host
                ))])
            } else {
                Err(SearchError::NotFound)
            }
        }

        async fn fetch(&self, url: &str) -> Result<String, SearchError> {
            if self.fail_fetch {
                return Err(SearchError::Transient("503".to_string()));
            }
            self.texts
                .iter()
                .find(|(urn, _)| url.ends_with(urn.as_str()))
                .map(|(_, text)| text.clone())
                .ok_or(SearchError::NotFound)
        }
    }

    /// Search stub that never answers for one instrument.
    struct StallSearch {
        texts: MappedSearch,
        stall_urn: &'static str,
    }

    #[async_trait]
    impl SearchService for StallSearch {
        async fn find_official_source(
            &self,
            key: &lexaudit_core::InstrumentKey,
        ) -> Result<Vec<SourceCandidate>, SearchError> {
            if key.urn() == self.stall_urn {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.texts.find_official_source(key).await
        }

        async fn fetch(&self, url: &str) -> Result<String, SearchError> {
            self.texts.fetch(url).await
        }
    }

    /// Verifier stub: always the given status, quoting the first snippet.
    struct EchoInvoker {
        status: VerdictStatus,
    }

    #[async_trait]
    impl AgentInvoker for EchoInvoker {
        async fn invoke_verifier(
            &self,
            context: &VerifierContext,
        ) -> Result<VerifierFinding, InvokeError> {
            Ok(VerifierFinding {
                verdict_candidate: self.status,
                rationale: format!("{} reading of the evidence", context.perspective),
                quoted_spans: context
                    .evidence
                    .evidence
                    .first()
                    .map(|snippet| vec![snippet.clone()])
                    .unwrap_or_default(),
            })
        }
    }

    fn test_config() -> AuditConfig {
        let mut config = AuditConfig::default();
        config.retrieval.backoff_base = Duration::from_millis(1);
        config.retrieval.backoff_cap = Duration::from_millis(4);
        config
    }

    fn pipeline_with(search: MappedSearch, status: VerdictStatus) -> (AuditPipeline, Arc<MappedSearch>) {
        let search = Arc::new(search);
        let pipeline = AuditPipeline::new(
            Arc::new(NullResolver),
            search.clone(),
            Arc::new(EchoInvoker { status }),
            test_config(),
        );
        (pipeline, search)
    }

    fn span(text: &str) -> RawCitationSpan {
        RawCitationSpan::new(text, 0, text.len())
    }

    #[tokio::test]
    async fn test_order_preserved_with_mixed_outcomes() {
        let (pipeline, _) = pipeline_with(
            MappedSearch::new(&[(CF_URN, CF_TEXT), (LAW_URN, LAW_TEXT)]),
            VerdictStatus::Correct,
        );
        let spans = vec![
            span("Art. 5º, inciso XI, da Constituição Federal"),
            span("vide nota supra"),
            span("Art. 999 da Lei nº 8.112, de 1990"),
        ];
        let texts: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();

        let report = pipeline.run(spans).await.unwrap();
        assert_eq!(report.len(), 3);
        for (verdict, text) in report.verdicts.iter().zip(&texts) {
            assert_eq!(&verdict.citation_text, text);
        }
        assert_eq!(report.verdicts[0].status, VerdictStatus::Correct);
        assert_eq!(report.verdicts[1].status, VerdictStatus::Nonexistent);
        assert_eq!(report.verdicts[2].status, VerdictStatus::Nonexistent);
    }

    #[tokio::test]
    async fn test_same_instrument_fetched_once() {
        let (pipeline, search) = pipeline_with(
            MappedSearch::new(&[(LAW_URN, LAW_TEXT)]),
            VerdictStatus::Correct,
        );
        let report = pipeline
            .run(vec![
                span("Art. 1º da Lei nº 8.112, de 1990"),
                span("Art. 2º da Lei nº 8.112, de 1990"),
                span("Art. 3º da Lei nº 8.112, de 1990"),
            ])
            .await
            .unwrap();

        assert_eq!(report.count(VerdictStatus::Correct), 3);
        assert_eq!(search.find_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_span_is_nonexistent() {
        let (pipeline, _) = pipeline_with(MappedSearch::new(&[]), VerdictStatus::Correct);
        let report = pipeline.run(vec![span("vide nota supra")]).await.unwrap();

        let verdict = &report.verdicts[0];
        assert_eq!(verdict.status, VerdictStatus::Nonexistent);
        assert!(verdict
            .justification
            .contains("could not determine a unique legal instrument"));
        assert!(verdict.reference.is_none());
    }

    #[tokio::test]
    async fn test_search_not_found_is_nonexistent() {
        // Search has no source for Law 9999.
        let (pipeline, _) = pipeline_with(
            MappedSearch::new(&[(LAW_URN, LAW_TEXT)]),
            VerdictStatus::Correct,
        );
        let report = pipeline
            .run(vec![span("Art. 1º da Lei nº 9.999, de 2001")])
            .await
            .unwrap();

        let verdict = &report.verdicts[0];
        assert_eq!(verdict.status, VerdictStatus::Nonexistent);
        assert!(verdict.justification.contains("no official source"));
        assert!(verdict.reference.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retrieval_is_timeout() {
        let (pipeline, _) = pipeline_with(
            MappedSearch::new(&[(LAW_URN, LAW_TEXT)]).failing_fetch(),
            VerdictStatus::Correct,
        );
        let report = pipeline
            .run(vec![span("Art. 1º da Lei nº 8.112, de 1990")])
            .await
            .unwrap();

        let verdict = &report.verdicts[0];
        assert_eq!(verdict.status, VerdictStatus::Timeout);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_article_beyond_last_is_nonexistent_naming_last() {
        let (pipeline, _) = pipeline_with(
            MappedSearch::new(&[(LAW_URN, LAW_TEXT)]),
            VerdictStatus::Correct,
        );
        let report = pipeline
            .run(vec![span("Art. 999 da Lei nº 8.112, de 1990")])
            .await
            .unwrap();

        let verdict = &report.verdicts[0];
        assert_eq!(verdict.status, VerdictStatus::Nonexistent);
        assert!(verdict.justification.contains("999"));
        assert!(verdict.justification.contains("last article is 7"));
    }

    #[tokio::test]
    async fn test_low_trust_source_caps_confidence() {
        let (pipeline, _) = pipeline_with(
            MappedSearch::new(&[(CF_URN, CF_TEXT)]).untrusted(),
            VerdictStatus::Correct,
        );
        let report = pipeline
            .run(vec![span("Art. 5º, inciso XI, da Constituição Federal")])
            .await
            .unwrap();

        let verdict = &report.verdicts[0];
        assert_eq!(verdict.status, VerdictStatus::Correct);
        assert_eq!(verdict.confidence, test_config().low_trust_confidence_cap);
        assert!(verdict.justification.contains("non-official source"));
    }

    #[tokio::test]
    async fn test_cancelled_run_degrades_to_timeout() {
        let (pipeline, search) = pipeline_with(
            MappedSearch::new(&[(CF_URN, CF_TEXT)]),
            VerdictStatus::Correct,
        );
        pipeline.cancel();
        let report = pipeline
            .run(vec![
                span("Art. 5º, inciso XI, da Constituição Federal"),
                span("Art. 1º da Lei nº 8.112, de 1990"),
            ])
            .await
            .unwrap();

        assert_eq!(report.count(VerdictStatus::Timeout), 2);
        // No external call was started after cancellation.
        assert_eq!(search.find_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_verdicts_carry_source_and_quotes() {
        let (pipeline, _) = pipeline_with(
            MappedSearch::new(&[(CF_URN, CF_TEXT)]),
            VerdictStatus::Correct,
        );
        let report = pipeline
            .run(vec![span("Art. 5º, inciso XI, da Constituição Federal")])
            .await
            .unwrap();

        let verdict = &report.verdicts[0];
        assert_eq!(verdict.source_urls.len(), 1);
        assert!(verdict.source_urls[0].contains("planalto.gov.br"));
        assert!(!verdict.evidence_quotes.is_empty());
        for quote in &verdict.evidence_quotes {
            assert!(CF_TEXT.contains(quote.as_str()));
        }
    }

    #[tokio::test]
    async fn test_locator_without_article_still_quotes_evidence() {
        let (pipeline, _) = pipeline_with(
            MappedSearch::new(&[(LAW_URN, LAW_TEXT)]),
            VerdictStatus::OutOfContext,
        );
        // No article step at all: the panel is anchored on the opening units.
        let report = pipeline
            .run(vec![span("Parágrafo único da Lei nº 8.112, de 1990")])
            .await
            .unwrap();

        let verdict = &report.verdicts[0];
        assert_eq!(verdict.status, VerdictStatus::OutOfContext);
        assert!(verdict.status.requires_evidence());
        assert!(!verdict.evidence_quotes.is_empty());
        for quote in &verdict.evidence_quotes {
            assert!(LAW_TEXT.contains(quote.as_str()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_citation_degrades_to_timeout() {
        let mut config = test_config();
        config.citation_timeout = Duration::from_millis(50);
        let pipeline = AuditPipeline::new(
            Arc::new(NullResolver),
            Arc::new(StallSearch {
                texts: MappedSearch::new(&[(CF_URN, CF_TEXT), (LAW_URN, LAW_TEXT)]),
                stall_urn: LAW_URN,
            }),
            Arc::new(EchoInvoker {
                status: VerdictStatus::Correct,
            }),
            config,
        );
        let report = pipeline
            .run(vec![
                span("Art. 1º da Lei nº 8.112, de 1990"),
                span("Art. 5º, inciso XI, da Constituição Federal"),
            ])
            .await
            .unwrap();

        let stalled = &report.verdicts[0];
        assert_eq!(stalled.status, VerdictStatus::Timeout);
        assert!(stalled.justification.contains("processing budget"));
        assert_eq!(report.verdicts[1].status, VerdictStatus::Correct);
    }

    mod ordering_property {
        use super::*;
        use proptest::prelude::*;

        fn pool() -> Vec<&'static str> {
            vec![
                "Art. 5º, inciso XI, da Constituição Federal",
                "Art. 1º da Lei nº 8.112, de 1990",
                "Art. 999 da Lei nº 8.112, de 1990",
                "vide nota supra",
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            #[test]
            fn report_order_matches_input_order(picks in proptest::collection::vec(0usize..4, 0..8)) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                runtime.block_on(async {
                    let (pipeline, _) = pipeline_with(
                        MappedSearch::new(&[(CF_URN, CF_TEXT), (LAW_URN, LAW_TEXT)]),
                        VerdictStatus::Correct,
                    );
                    let spans: Vec<RawCitationSpan> =
                        picks.iter().map(|&i| span(pool()[i])).collect();
                    let texts: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();

                    let report = pipeline.run(spans).await.unwrap();
                    prop_assert_eq!(report.len(), texts.len());
                    for (verdict, text) in report.verdicts.iter().zip(&texts) {
                        prop_assert_eq!(&verdict.citation_text, text);
                    }
                    Ok(())
                })?;
            }
        }
    }
}
