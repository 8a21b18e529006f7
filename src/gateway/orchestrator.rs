//! Call orchestrator: retries against one endpoint, then fails over

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::traits::{ChatBackend, ChatCompletionRequest, ChatMessage};
use crate::error::{AppError, Result};
use crate::pool::{CallPolicy, Endpoint, EndpointRegistry};

/// Successful upstream call
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub response: Value,
    pub endpoint_id: String,
}

/// Drives endpoint selection, per-endpoint retries and cross-endpoint failover
pub struct CallOrchestrator {
    registry: Arc<EndpointRegistry>,
    backend: Arc<dyn ChatBackend>,
}

impl CallOrchestrator {
    pub fn new(registry: Arc<EndpointRegistry>, backend: Arc<dyn ChatBackend>) -> Self {
        Self { registry, backend }
    }

    /// Send `messages` upstream.
    ///
    /// Each endpoint gets `retry_count + 1` attempts. On exhaustion the
    /// failure is recorded and the next selected endpoint takes over, at most
    /// once per endpoint that was enabled when the call started.
    pub async fn call(&self, messages: &[ChatMessage]) -> Result<CallOutcome> {
        let selected = self
            .registry
            .select()
            .await?
            .ok_or(AppError::NoEndpointAvailable)?;

        let max_hops = selected.enabled_count.max(1);
        let mut endpoint = selected.endpoint;
        let mut policy = selected.policy;
        let mut hops = 0;

        loop {
            info!(
                endpoint = %endpoint.name,
                used = endpoint.success_count,
                quota = endpoint.max_success_count,
                "Using endpoint"
            );

            let request = ChatCompletionRequest {
                messages: messages.to_vec(),
                model: endpoint.model.clone(),
            };

            let last_error = match self.attempt_with_retries(&endpoint, &request, &policy).await {
                Ok(response) => {
                    self.record(&endpoint.id, true).await;
                    info!(endpoint = %endpoint.name, "Request succeeded");
                    return Ok(CallOutcome {
                        response,
                        endpoint_id: endpoint.id,
                    });
                }
                Err(e) => e,
            };

            self.record(&endpoint.id, false).await;
            hops += 1;

            let next = match self.registry.select().await {
                Ok(next) => next,
                Err(e) => {
                    warn!(error = %e, "Endpoint selection failed during failover");
                    None
                }
            };

            match next {
                Some(next) if next.endpoint.id != endpoint.id && hops < max_hops => {
                    info!(from = %endpoint.name, to = %next.endpoint.name, hop = hops, "Failing over");
                    endpoint = next.endpoint;
                    policy = next.policy;
                }
                _ => {
                    return Err(AppError::EndpointsExhausted {
                        endpoint: endpoint.name,
                        last_error: last_error.to_string(),
                    })
                }
            }
        }
    }

    async fn attempt_with_retries(
        &self,
        endpoint: &Endpoint,
        request: &ChatCompletionRequest,
        policy: &CallPolicy,
    ) -> Result<Value> {
        let mut attempt = 0;
        loop {
            let error = match self.backend.chat_completion(endpoint, request, policy).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            warn!(endpoint = %endpoint.name, attempt = attempt + 1, error = %error, "Upstream attempt failed");

            if attempt >= policy.retry_count || !error.is_retryable() {
                return Err(error);
            }

            attempt += 1;
            info!(endpoint = %endpoint.name, retry = attempt, of = policy.retry_count, "Retrying");
            tokio::time::sleep(policy.retry_delay).await;
        }
    }

    /// Outcome bookkeeping must not turn a finished call into a failure
    async fn record(&self, id: &str, success: bool) {
        if let Err(e) = self.registry.record_outcome(id, success).await {
            warn!(endpoint_id = %id, success, error = %e, "Failed to record call outcome");
        }
    }
}
