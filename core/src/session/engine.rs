use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::context::window::{ModelLimits, TokenBudget, TokenCounter};
use crate::context::{HistoryStore, Turn};
use crate::llm::{
    primary_response_schema, GenerateRequest, ModelBackend, RetryDecision, RetryPolicy,
    StructuredReply, SystemWindowClock,
};
use crate::sql::{Database, QueryExecutor, QueryOutcome, QueryResult};
use crate::{QueryChatError, Result};

use super::config::SessionConfig;
use super::prompts;

/// Where a turn currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingPrimaryReply,
    AwaitingGroundedReply,
}

/// One conversation with the model: history, budget, rate-limit state and the
/// generate → execute → regenerate protocol.
pub struct SessionEngine {
    model: Arc<dyn ModelBackend>,
    executor: QueryExecutor,
    budget: TokenBudget,
    history: HistoryStore,
    retry: RetryPolicy,
    config: SessionConfig,
    system_instruction: String,
    response_schema: Value,
    state: SessionState,
    warnings: Vec<String>,
}

impl SessionEngine {
    pub fn new(
        model: Arc<dyn ModelBackend>,
        database: Arc<dyn Database>,
        counter: Arc<dyn TokenCounter>,
        limits: ModelLimits,
        create_statements: &[String],
        config: SessionConfig,
    ) -> Self {
        let system_instruction = prompts::primary_instruction(create_statements);
        let response_schema = primary_response_schema();
        let preamble = format!("{}\n{}", system_instruction, response_schema);

        let mut budget = TokenBudget::new(counter, limits, &preamble)
            .with_near_limit_ratio(config.near_limit_ratio);
        if let Some(limit) = config.context_limit {
            budget = budget.with_context_limit(limit);
        }
        info!(
            target: "session",
            input_limit = budget.input_limit(),
            output_limit = budget.output_limit(),
            context_limit = budget.context_limit(),
            tables = create_statements.len(),
            "Session created"
        );

        Self {
            model,
            executor: QueryExecutor::new(database, config.max_query_attempts),
            budget,
            history: HistoryStore::new(),
            retry: RetryPolicy::new(Arc::new(SystemWindowClock), config.rate_limit_window_secs),
            config,
            system_instruction,
            response_schema,
            state: SessionState::Idle,
            warnings: Vec::new(),
        }
    }

    /// Replace the rate-limit policy (e.g. to inject a clock)
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.config.debug = debug;
    }

    pub fn debug(&self) -> bool {
        self.config.debug
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Take the non-fatal warnings queued since the last call
    pub fn drain_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Forget the conversation
    pub fn reset(&mut self) {
        self.history.clear();
        self.retry.reset();
        self.warnings.clear();
        self.state = SessionState::Idle;
    }

    /// Run one turn. Every failure is turned into user-facing text.
    #[tracing::instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub async fn handle_turn(&mut self, prompt: &str) -> String {
        let result = self.run_turn(prompt).await;
        self.state = SessionState::Idle;
        match result {
            Ok(text) => text,
            Err(e) => {
                error!(target: "session", error = %e, "Turn aborted");
                user_message(&e)
            }
        }
    }

    async fn run_turn(&mut self, prompt: &str) -> Result<String> {
        self.check_budget(prompt)?;

        self.history.append(Turn::user(prompt));
        match self.exchange().await {
            Ok(message) => {
                self.history.append(Turn::model(message.clone()));
                Ok(message)
            }
            Err(e) => {
                self.history.pop_last();
                Err(e)
            }
        }
    }

    fn check_budget(&mut self, prompt: &str) -> Result<()> {
        let tokens = self.budget.cost(prompt);
        if tokens >= self.budget.input_limit() {
            return Err(QueryChatError::InputTooLong {
                tokens,
                limit: self.budget.input_limit(),
            });
        }

        if self.budget.is_over_limit(&self.history, prompt) {
            info!(target: "session", "Context window is full, therefore it will shrink");
            let removed = self.history.shrink_to_fit(prompt, &self.budget);
            if self.budget.is_over_limit(&self.history, prompt) {
                return Err(QueryChatError::ContextExhausted);
            }
            self.warnings.push(format!(
                "Context window was full; dropped the {removed} oldest messages."
            ));
        }

        if self.budget.is_near_limit(&self.history, prompt) {
            warn!(target: "session", "Context window is almost full");
            self.warnings
                .push("Warning: Context window is almost full.".to_string());
        }
        Ok(())
    }

    /// Primary call, optional database phase, optional grounding call
    async fn exchange(&mut self) -> Result<String> {
        self.state = SessionState::AwaitingPrimaryReply;
        let request = GenerateRequest {
            system_instruction: self.system_instruction.clone(),
            response_schema: Some(self.response_schema.clone()),
            contents: self.history.serialize(),
        };
        let raw = self.generate_with_retry(&request).await?;
        let reply = StructuredReply::parse(&raw)
            .map_err(|e| QueryChatError::MalformedReply(e.to_string()))?;
        debug!(target: "session", certainty = reply.certainty, sql = %reply.sql, "Primary reply");

        let mut message = if self.config.debug {
            format!("{}\n{}", raw, reply.message)
        } else {
            reply.message.clone()
        };

        if !reply.wants_query(self.config.certainty_threshold) {
            return Ok(message);
        }

        let schema: Value = serde_json::from_str(&reply.output_schema).map_err(|e| {
            QueryChatError::MalformedReply(format!("output schema is not valid JSON: {e}"))
        })?;

        let Some((result, schema)) = self.query_with_corrections(&reply, schema, &mut message).await
        else {
            return Ok(message);
        };
        if result.is_empty() {
            debug!(target: "session", "Query returned no rows; skipping grounding");
            return Ok(message);
        }

        self.state = SessionState::AwaitingGroundedReply;
        match self.ground(&result, schema).await {
            Ok(grounded) => {
                let pretty = serde_json::to_string_pretty(&grounded)?;
                message.push('\n');
                message.push_str(&pretty);
            }
            Err(e) => {
                warn!(target: "session", error = %e, "Grounding failed; returning primary message only");
            }
        }
        Ok(message)
    }

    /// Execute the reply's SQL; on a retryable failure ask the model for a
    /// corrected statement and try again.
    async fn query_with_corrections(
        &mut self,
        reply: &StructuredReply,
        mut schema: Value,
        message: &mut String,
    ) -> Option<(QueryResult, Value)> {
        let mut sql = reply.sql.clone();
        let mut attempt = 0;

        loop {
            match self.executor.execute(&sql, attempt).await {
                QueryOutcome::Rows(result) => return Some((result, schema)),
                QueryOutcome::Failed(e) => {
                    message.push_str(&format!(
                        "\nCan not query the database based on the given prompt: {e}"
                    ));
                    return None;
                }
                QueryOutcome::Retry(e) => {
                    let request = GenerateRequest {
                        system_instruction: self.system_instruction.clone(),
                        response_schema: Some(self.response_schema.clone()),
                        contents: format!(
                            "{}\n{}",
                            self.history.serialize(),
                            prompts::correction_turn(&sql, &e)
                        ),
                    };
                    let fixed = match self.generate_with_retry(&request).await {
                        Ok(raw) => StructuredReply::parse(&raw)
                            .map_err(|pe| QueryChatError::MalformedReply(pe.to_string())),
                        Err(err) => Err(err),
                    };
                    match fixed {
                        Ok(fixed) if fixed.wants_query(self.config.certainty_threshold) => {
                            if let Ok(s) = serde_json::from_str(&fixed.output_schema) {
                                schema = s;
                            }
                            sql = fixed.sql;
                            attempt += 1;
                        }
                        Ok(_) => {
                            info!(target: "session", "Corrected reply declined to query");
                            return None;
                        }
                        Err(err) => {
                            warn!(target: "session", error = %err, "Query correction failed");
                            return None;
                        }
                    }
                }
            }
        }
    }

    /// Second call: answer from the query output only
    async fn ground(&mut self, result: &QueryResult, schema: Value) -> Result<Value> {
        let request = GenerateRequest {
            system_instruction: prompts::GROUNDING_INSTRUCTION.to_string(),
            response_schema: Some(schema),
            contents: prompts::grounding_contents(result),
        };
        let raw = self.generate_with_retry(&request).await?;
        serde_json::from_str(&raw).map_err(|e| QueryChatError::MalformedReply(e.to_string()))
    }

    /// Send `request`, sleeping and re-sending while the policy says so.
    /// Rate-limit tracking never outlives one model call.
    async fn generate_with_retry(&mut self, request: &GenerateRequest) -> Result<String> {
        let result = self.generate_with_backoff(request).await;
        self.retry.reset();
        result
    }

    async fn generate_with_backoff(&mut self, request: &GenerateRequest) -> Result<String> {
        let mut retries = 0;
        let mut waited = Duration::ZERO;

        loop {
            match self.model.generate(request).await {
                Ok(text) => {
                    if retries > 0 {
                        info!(target: "session", retries, waited_secs = waited.as_secs(), "Model call succeeded after rate limiting");
                    }
                    return Ok(text);
                }
                Err(err) => match self.retry.classify(&err) {
                    RetryDecision::Retry(wait) if retries < self.config.max_rate_limit_retries => {
                        retries += 1;
                        waited += wait;
                        warn!(target: "session", retries, wait_secs = wait.as_secs(), "Rate limited; waiting before retry");
                        tokio::time::sleep(wait).await;
                    }
                    RetryDecision::Retry(_) => {
                        return Err(QueryChatError::RateLimited {
                            attempts: retries + 1,
                            source: err,
                        });
                    }
                    RetryDecision::Fatal => return Err(QueryChatError::Api(err)),
                },
            }
        }
    }
}

fn user_message(err: &QueryChatError) -> String {
    match err {
        QueryChatError::InputTooLong { .. } => {
            "Input window is full, please enter a shorter text.".to_string()
        }
        QueryChatError::ContextExhausted => {
            "Context window is full even without history, please enter a shorter text."
                .to_string()
        }
        QueryChatError::MalformedReply(m) => format!("The model returned a malformed reply: {m}"),
        other => format!("An error occurred: {other}"),
    }
}
