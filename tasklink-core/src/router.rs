//! Command router for agent-initiated requests
//!
//! Each request names a `request_id` that is answered exactly once:
//! the router dispatches to the matching collaborator, turns the outcome
//! into a `request_response` and sends it back over the sync channel.
//! Answers that cannot be sent are kept and re-sent after a reconnect.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::channel::SyncChannel;
use crate::collab::Collaborators;
use crate::error::{CollaboratorError, ProtocolError};
use crate::events::{RemoteRequest, RequestKind, RequestResponse};

/// Answered requests remembered for duplicate detection
pub const DEFAULT_ANSWERED_HISTORY: usize = 1024;

/// Lifecycle of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Received; no response has reached the channel yet
    AwaitingResponse,
    /// The response was sent; any further answer is a protocol error
    Responded,
}

/// A request the router has seen
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub request: RemoteRequest,
    pub status: RequestStatus,
    /// Answer produced for the request, kept until it is delivered
    pub response: Option<RequestResponse>,
    pub received_at: DateTime<Utc>,
}

/// Routes remote requests to local collaborators
pub struct CommandRouter {
    channel: Arc<dyn SyncChannel>,
    collaborators: Collaborators,
    timeout: Option<Duration>,
    requests: HashMap<String, PendingRequest>,
    /// Answered ids, oldest first; unanswered requests are never pruned
    answered: VecDeque<String>,
    history: usize,
}

impl CommandRouter {
    pub fn new(
        channel: Arc<dyn SyncChannel>,
        collaborators: Collaborators,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            channel,
            collaborators,
            timeout,
            requests: HashMap::new(),
            answered: VecDeque::new(),
            history: DEFAULT_ANSWERED_HISTORY,
        }
    }

    /// Remember at most `history` answered requests
    ///
    /// Older answered ids are forgotten, so a request reusing one of them
    /// is treated as new.
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    /// Look up a request by id
    pub fn request(&self, request_id: &str) -> Option<&PendingRequest> {
        self.requests.get(request_id)
    }

    /// Requests currently remembered, answered or not
    pub fn tracked(&self) -> usize {
        self.requests.len()
    }

    /// Requests whose answer has not been delivered
    pub fn unanswered(&self) -> usize {
        self.requests
            .values()
            .filter(|r| r.status == RequestStatus::AwaitingResponse)
            .count()
    }

    /// Dispatch a request and send its response
    ///
    /// The response is returned even when sending it failed; it stays
    /// queued for [`resend_unanswered`](Self::resend_unanswered).
    #[instrument(skip(self, request), fields(request_id = request.request_id(), kind = request.kind().as_str()))]
    pub async fn handle(&mut self, request: RemoteRequest) -> Result<RequestResponse, ProtocolError> {
        let request_id = request.request_id().to_string();
        if self.requests.contains_key(&request_id) {
            warn!("Ignoring repeated request id");
            return Err(ProtocolError::DuplicateRequest(request_id));
        }
        self.requests.insert(
            request_id.clone(),
            PendingRequest {
                request: request.clone(),
                status: RequestStatus::AwaitingResponse,
                response: None,
                received_at: Utc::now(),
            },
        );

        let response = self.dispatch(&request).await;
        if let Err(e) = self.respond(response.clone()).await {
            warn!(error = %e, "Response not delivered");
        }
        Ok(response)
    }

    /// Send the answer for a pending request
    ///
    /// Fails with `UnknownRequest` if the id was never received and with
    /// `DuplicateResponse` if it was already answered; the first answer
    /// stands.
    pub async fn respond(&mut self, response: RequestResponse) -> Result<(), ProtocolError> {
        let request_id = response.request_id.clone();
        let Some(entry) = self.requests.get_mut(&request_id) else {
            warn!(request_id = %request_id, "Response for unknown request");
            return Err(ProtocolError::UnknownRequest(request_id));
        };
        if entry.status == RequestStatus::Responded {
            warn!(request_id = %request_id, "Request already answered");
            return Err(ProtocolError::DuplicateResponse(request_id));
        }
        if entry.response.is_none() {
            entry.response = Some(response.clone());
        }

        self.channel.respond_to_request(response).await?;
        if let Some(entry) = self.requests.get_mut(&request_id) {
            entry.status = RequestStatus::Responded;
        }
        debug!(request_id = %request_id, "Response sent");
        self.answered.push_back(request_id);
        self.prune_answered();
        Ok(())
    }

    fn prune_answered(&mut self) {
        while self.answered.len() > self.history {
            if let Some(oldest) = self.answered.pop_front() {
                self.requests.remove(&oldest);
            }
        }
    }

    /// Re-send answers that could not be delivered
    pub async fn resend_unanswered(&mut self) -> usize {
        let queued: Vec<RequestResponse> = self
            .requests
            .values()
            .filter(|r| r.status == RequestStatus::AwaitingResponse)
            .filter_map(|r| r.response.clone())
            .collect();

        let mut sent = 0;
        for response in queued {
            match self.respond(response).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(error = %e, "Re-send failed");
                    break;
                }
            }
        }
        sent
    }

    async fn dispatch(&self, request: &RemoteRequest) -> RequestResponse {
        let request_id = request.request_id();
        match self.limited(self.invoke(request)).await {
            Ok(response) => {
                info!(kind = request.kind().as_str(), "Request handled");
                response
            }
            Err(e) => {
                warn!(kind = request.kind().as_str(), error = %e, "Request failed");
                RequestResponse::error(request_id, format!("{} failed: {}", label(request.kind()), e))
            }
        }
    }

    async fn invoke(&self, request: &RemoteRequest) -> Result<RequestResponse, CollaboratorError> {
        let Collaborators {
            editor,
            executor,
            diff_view,
        } = &self.collaborators;

        match request {
            RemoteRequest::OpenFile(r) => {
                editor.open_file(&r.file_path, r.task_id.as_deref()).await?;
                Ok(RequestResponse::success(
                    &r.request_id,
                    format!("Opened {}", r.file_path),
                ))
            }
            RemoteRequest::EditCode(r) => {
                editor
                    .apply_edits(&r.file_path, &r.changes, r.task_id.as_deref())
                    .await?;
                Ok(RequestResponse::success(
                    &r.request_id,
                    format!("Applied edits to {}", r.file_path),
                ))
            }
            RemoteRequest::RunCommand(r) => {
                let output = executor.run(&r.command, r.working_dir.as_deref()).await?;
                let message = match output.exit_code {
                    Some(0) => "Command executed".to_string(),
                    Some(code) => format!("Command exited with status {}", code),
                    None => "Command terminated by signal".to_string(),
                };
                Ok(RequestResponse::success(&r.request_id, message).with_output(output.combined()))
            }
            RemoteRequest::ShowDiff(r) => {
                diff_view
                    .show_diff(&r.before, &r.after, r.file_path.as_deref())
                    .await?;
                Ok(RequestResponse::success(&r.request_id, "Diff view shown"))
            }
        }
    }

    async fn limited<T>(
        &self,
        fut: impl Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<T, CollaboratorError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or_else(|_| Err(CollaboratorError::TimedOut(limit.as_secs()))),
            None => fut.await,
        }
    }
}

fn label(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::OpenFile => "Open file",
        RequestKind::EditCode => "Edit",
        RequestKind::RunCommand => "Command",
        RequestKind::ShowDiff => "Diff",
    }
}
