use crate::config::RunLimits;
use crate::gateway::ProviderGateway;
use crate::llm::StopReason;
use crate::prompt::{seed_prompt, ANALYST_SYSTEM_PROMPT};
use crate::report::{
    ChartArtifact, ChartRenderer, DocumentRenderer, NullRenderer, ReportRecord, ReportStore,
};
use crate::stream::StepStream;
use chrono::Utc;
use marketlens_core::{
    AnalysisResult, ContentBlock, ErrorCode, MarketlensResult, Step, StepKind, ToolCall,
    Transcript, Turn,
};
use marketlens_tools::{MarketAnalytics, Period, ToolDescriptor, ToolRegistry};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn, Instrument};

const STEP_CHANNEL_CAPACITY: usize = 64;

/// The Agent Runner: drives the analysis loop for one ticker at a time.
/// Transcript → model turn → tool calls → observations → repeat, until a final answer.
///
/// Cloning is cheap; every run gets its own task and its own [`RunState`].
#[derive(Clone)]
pub struct AgentRunner {
    gateway: Arc<ProviderGateway>,
    tools: Arc<ToolRegistry>,
    analytics: Arc<dyn MarketAnalytics>,
    charts: Arc<dyn ChartRenderer>,
    documents: Arc<dyn DocumentRenderer>,
    store: Arc<dyn ReportStore>,
}

impl AgentRunner {
    pub fn new(
        gateway: Arc<ProviderGateway>,
        tools: Arc<ToolRegistry>,
        analytics: Arc<dyn MarketAnalytics>,
        store: Arc<dyn ReportStore>,
    ) -> Self {
        Self {
            gateway,
            tools,
            analytics,
            charts: Arc::new(NullRenderer),
            documents: Arc::new(NullRenderer),
            store,
        }
    }

    pub fn with_chart_renderer(mut self, charts: Arc<dyn ChartRenderer>) -> Self {
        self.charts = charts;
        self
    }

    pub fn with_document_renderer(mut self, documents: Arc<dyn DocumentRenderer>) -> Self {
        self.documents = documents;
        self
    }

    pub fn gateway(&self) -> &ProviderGateway {
        &self.gateway
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Starts a run in the background and returns its step stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(&self, ticker: &str, limits: RunLimits) -> StepStream {
        let ticker = ticker.trim().to_ascii_uppercase();
        let (tx, rx) = mpsc::channel(STEP_CHANNEL_CAPACITY);
        let span = info_span!("run", ticker = %ticker);
        let run = Run {
            runner: self.clone(),
            state: RunState::new(&ticker),
            schemas: self.tools.schemas(),
            ticker,
            limits,
            tx,
        };
        tokio::spawn(run.execute().instrument(span));
        StepStream::new(rx)
    }
}

/// Process-local state of one run.
struct RunState {
    started: Instant,
    iteration: u32,
    steps: Vec<Step>,
    tool_calls: u32,
    transcript: Transcript,
}

impl RunState {
    fn new(ticker: &str) -> Self {
        Self {
            started: Instant::now(),
            iteration: 1,
            steps: Vec::new(),
            tool_calls: 0,
            transcript: Transcript::seeded(seed_prompt(ticker)),
        }
    }
}

enum RunPhase {
    Running,
    AwaitingResult(Vec<ToolCall>),
    Finalizing(Box<AnalysisResult>),
    Done,
}

struct Run {
    runner: AgentRunner,
    state: RunState,
    schemas: Vec<ToolDescriptor>,
    ticker: String,
    limits: RunLimits,
    tx: mpsc::Sender<Step>,
}

impl Run {
    async fn execute(mut self) {
        info!(
            max_iterations = self.limits.max_iterations,
            timeout_secs = self.limits.timeout_secs,
            "Starting analysis run"
        );

        let mut phase = RunPhase::Running;
        loop {
            phase = match phase {
                RunPhase::Running => self.model_turn().await,
                RunPhase::AwaitingResult(calls) => self.dispatch(calls).await,
                RunPhase::Finalizing(analysis) => self.finalize(*analysis).await,
                RunPhase::Done => break,
            };
        }

        debug!(steps = self.state.steps.len(), "Run finished");
    }

    async fn emit(&mut self, step: Step) {
        self.state.steps.push(step.clone());
        if self.tx.send(step).await.is_err() {
            debug!("Step stream dropped by consumer; run continues");
        }
    }

    async fn fail(&mut self, iteration: u32, code: ErrorCode, message: String) -> RunPhase {
        error!(iteration, code = %code, error = %message, "Run failed");
        self.emit(Step::error(iteration, code, message)).await;
        RunPhase::Done
    }

    async fn model_turn(&mut self) -> RunPhase {
        let iteration = self.state.iteration;

        if iteration > self.limits.max_iterations {
            let last = self.limits.max_iterations.max(1);
            let message = format!(
                "no final answer after {} iterations",
                self.limits.max_iterations
            );
            return self
                .fail(last, ErrorCode::IterationLimitExceeded, message)
                .await;
        }

        let elapsed = self.state.started.elapsed();
        if elapsed >= self.limits.timeout() {
            let message = format!(
                "analysis exceeded {}s time limit",
                self.limits.timeout_secs
            );
            return self.fail(iteration, ErrorCode::RunTimeout, message).await;
        }

        info!(iteration, "Agent loop iteration");

        let turn = match self
            .runner
            .gateway
            .next_turn(ANALYST_SYSTEM_PROMPT, &self.state.transcript, &self.schemas)
            .await
        {
            Ok(turn) => turn,
            Err(e) => {
                return self
                    .fail(iteration, ErrorCode::ProviderUnavailable, error_chain(&e))
                    .await;
            }
        };

        debug!(
            iteration,
            backend = %turn.backend,
            model = %turn.model,
            stop = ?turn.stop,
            blocks = turn.content.len(),
            "Model turn received"
        );

        for block in &turn.content {
            if let ContentBlock::Text { text } = block {
                if !text.trim().is_empty() {
                    self.emit(Step::reasoning(iteration, text.clone())).await;
                }
            }
        }

        let calls = turn.tool_calls();
        let stop = turn.stop;
        let answer = match (calls.is_empty(), stop) {
            (true, StopReason::EndOfTurn) => Some(parse_final_answer(&turn.content, &self.ticker)),
            _ => None,
        };
        self.state.transcript.push(Turn::assistant(turn.content));

        if !calls.is_empty() {
            return RunPhase::AwaitingResult(calls);
        }

        match answer {
            Some(Ok(analysis)) => RunPhase::Finalizing(Box::new(analysis)),
            Some(Err(e)) => {
                self.fail(iteration, ErrorCode::InvalidFinalAnswer, e.to_string())
                    .await
            }
            None => {
                warn!(iteration, stop = ?stop, "Turn ended without answer or tool calls; continuing");
                self.state.iteration += 1;
                RunPhase::Running
            }
        }
    }

    async fn dispatch(&mut self, calls: Vec<ToolCall>) -> RunPhase {
        let iteration = self.state.iteration;
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            info!(iteration, tool = %call.name, call_id = %call.id, "Executing tool call");
            self.emit(Step::tool_call(iteration, &call)).await;
            self.state.tool_calls += 1;

            let result = self.runner.tools.dispatch_call(&call).await;
            self.emit(Step::observation(iteration, &result)).await;
            results.push(result);
        }

        self.state.transcript.push(Turn::tool_results(results));
        self.state.iteration += 1;
        RunPhase::Running
    }

    async fn finalize(&mut self, mut analysis: AnalysisResult) -> RunPhase {
        let iteration = self.state.iteration;
        let generated_at = Utc::now();
        analysis.generated_at = Some(generated_at);

        let period = analysis
            .chart_config
            .period
            .parse::<Period>()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Unusable chart period; using default");
                Period::default()
            });
        analysis.chart_config.data = match self
            .runner
            .analytics
            .chart_series(&self.ticker, period)
            .await
        {
            Ok(series) => series,
            Err(e) => {
                warn!(error = %e, "Chart series unavailable");
                Vec::new()
            }
        };

        let chart = match self.runner.charts.render_chart(&analysis.chart_config).await {
            Ok(chart) => chart,
            Err(e) => {
                warn!(error = %e, "Chart rendering failed");
                ChartArtifact::default()
            }
        };

        let document_path = match self
            .runner
            .documents
            .render_document(&analysis, &chart, &self.state.steps)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Document rendering failed");
                None
            }
        };

        let run_id = new_run_id();
        let execution_time_ms = u64::try_from(self.state.started.elapsed().as_millis())
            .unwrap_or(u64::MAX);

        let record = ReportRecord {
            id: run_id.clone(),
            ticker: self.ticker.clone(),
            generated_at,
            analysis: analysis.clone(),
            reasoning_trace: self.state.steps.clone(),
            tool_calls_count: self.state.tool_calls,
            execution_time_ms,
            chart,
            document_path,
        };

        if let Err(e) = self.runner.store.save_report(&record).await {
            return self
                .fail(iteration, ErrorCode::PersistenceFailure, e.to_string())
                .await;
        }

        for (seq, step) in record.reasoning_trace.iter().enumerate() {
            if let Err(e) = self.runner.store.save_step(&run_id, step, seq).await {
                warn!(run_id = %run_id, seq, error = %e, "Failed to store step");
            }
        }

        info!(
            run_id = %run_id,
            tool_calls = self.state.tool_calls,
            execution_time_ms,
            "Analysis complete"
        );

        self.emit(Step::new(
            iteration,
            StepKind::Complete {
                run_id,
                analysis: Box::new(analysis),
                execution_time_ms,
                tool_calls_count: self.state.tool_calls,
            },
        ))
        .await;
        RunPhase::Done
    }
}

/// `rpt_` followed by 8 hex characters.
/// Parses the final answer from the last text block, falling back to all text joined,
/// so stray braces in earlier prose cannot corrupt the slice.
fn parse_final_answer(content: &[ContentBlock], ticker: &str) -> MarketlensResult<AnalysisResult> {
    let joined = content
        .iter()
        .filter_map(ContentBlock::as_text)
        .collect::<Vec<_>>()
        .join("\n");
    match content.iter().rev().find_map(ContentBlock::as_text) {
        Some(last) => AnalysisResult::from_model_text(last, ticker)
            .or_else(|_| AnalysisResult::from_model_text(&joined, ticker)),
        None => AnalysisResult::from_model_text(&joined, ticker),
    }
}

fn new_run_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("rpt_{}", &hex[..8])
}

/// The error followed by its source chain.
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
