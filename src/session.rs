//! Agent session controller.
//!
//! Owns everything one run of the program needs to answer queries: the
//! model client, the MCP toolset, the conversation history and the usage
//! log. Built once by [`SessionController::initialize`], used through
//! [`Ask`], and closed with [`SessionController::shutdown`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::agent::{AgentLoop, Context, LlmClient, Message, ModelSpec, ProviderRegistry};
use crate::config::Config;
use crate::logging::LogContext;
use crate::mcp::{McpToolset, ToolEndpoint};
use crate::usage::{QueryRecord, Usage, UsageLog};
use crate::Result;

/// A successful answer to one query.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub usage: Usage,
    pub duration: Duration,
}

/// Something that answers queries one at a time.
#[async_trait]
pub trait Ask: Send {
    async fn ask(&mut self, prompt: &str) -> Result<Answer>;
}

/// Conversation state of one program run.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub history: Vec<Message>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            history: Vec::new(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SessionController {
    agent: AgentLoop<Box<dyn LlmClient>>,
    context: Context,
    session: Session,
    model: String,
    usage_log: Option<UsageLog>,
    toolset: Option<Arc<McpToolset>>,
    log: LogContext,
}

impl SessionController {
    /// Resolve the model, connect to the tool endpoint and build the agent.
    ///
    /// Errors are startup errors: [`crate::Error::Config`] for a bad model,
    /// missing credentials or a malformed URL, [`crate::Error::Connection`]
    /// when the endpoint cannot be reached.
    pub async fn initialize(config: &Config, log: LogContext) -> Result<Self> {
        let spec = ModelSpec::parse(&config.model)?;
        let client = ProviderRegistry::create(&spec, &config.providers)?;
        let endpoint = ToolEndpoint::parse(&config.mcp_url, config.transport)?;

        let toolset = Arc::new(
            McpToolset::connect(endpoint, config.mcp_timeout())
                .instrument(log.span().clone())
                .await?,
        );

        let context = Context::new(
            config.instructions.clone(),
            toolset.clone(),
            config.add_datetime,
        );
        let agent = AgentLoop::new(client, config.max_iterations, config.tool_retries);
        let usage_log = config.usage_log.as_ref().map(UsageLog::new);

        let mut controller = Self::from_parts(agent, context, config.model.clone(), usage_log, log);
        controller.toolset = Some(toolset);

        info!(
            parent: controller.log.span(),
            model = %spec,
            tools = controller.context.tool_definitions().len(),
            "Agent ready"
        );
        Ok(controller)
    }

    /// Assemble a controller from already built parts.
    pub fn from_parts(
        agent: AgentLoop<Box<dyn LlmClient>>,
        context: Context,
        model: String,
        usage_log: Option<UsageLog>,
        log: LogContext,
    ) -> Self {
        let session = Session::new();
        log.span().record("id", tracing::field::display(session.id));

        Self {
            agent,
            context,
            session,
            model,
            usage_log,
            toolset: None,
            log,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn usage_log(&self) -> Option<&UsageLog> {
        self.usage_log.as_ref()
    }

    /// Close the tool connection.
    pub async fn shutdown(self) {
        if let Some(ref toolset) = self.toolset {
            toolset.shutdown().instrument(self.log.span().clone()).await;
        }
        debug!(parent: self.log.span(), "Session closed");
    }

    async fn run_query(&mut self, prompt: &str) -> Result<Answer> {
        let started = Instant::now();
        info!(query = %prompt, "Running query");

        let response = self
            .agent
            .run(&self.session.history, Message::user(prompt), &self.context)
            .await
            .map_err(|e| {
                warn!("Query failed: {}", e);
                e
            })?;
        let duration = started.elapsed();

        // Providers reject empty assistant turns, so a blank answer is not
        // carried into the next query.
        if response.content.trim().is_empty() {
            warn!("Model returned an empty answer");
        } else {
            self.session.history.push(Message::user(prompt));
            self.session.history.push(Message::assistant(response.content.clone()));
        }

        if let Some(ref log) = self.usage_log {
            let record = QueryRecord::new(&self.model, prompt, duration, &response.usage);
            if let Err(e) = log.append(&record) {
                warn!("Failed to write usage log {}: {}", log.path().display(), e);
            }
        }

        info!(
            duration_ms = duration.as_millis() as u64,
            usage = %response.usage,
            "Query completed"
        );

        Ok(Answer {
            text: response.content,
            usage: response.usage,
            duration,
        })
    }
}

#[async_trait]
impl Ask for SessionController {
    async fn ask(&mut self, prompt: &str) -> Result<Answer> {
        let span = self.log.span().clone();
        self.run_query(prompt).instrument(span).await
    }
}
