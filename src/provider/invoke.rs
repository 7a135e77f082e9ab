use crate::config::SandboxConfig;
use crate::events::{field, EventFields, EventKind, EventSink};
use crate::provider::{
    build_invocation, parse_anthropic_output, parse_openai_output, ProviderKind, RunnerBinaries,
};
use crate::queue::PathMapping;
use crate::sandbox::{run_sandboxed, Permits, SandboxError, SandboxRequest};
use crate::shared::atomic_write_file;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

pub const TEAMMATES_FILE_NAME: &str = "teammates.json";

#[derive(Debug, Clone, Serialize)]
pub struct TeammateInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct TeamContext {
    pub team_id: String,
    pub team_name: String,
    pub teammates: Vec<TeammateInfo>,
}

#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub agent_id: String,
    pub provider: ProviderKind,
    pub model: String,
    pub message: String,
    pub working_dir: PathBuf,
    pub sandbox: SandboxConfig,
    pub reset: bool,
    pub team: Option<TeamContext>,
}

#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub response: String,
    pub duration_ms: u64,
    pub path_mappings: Vec<PathMapping>,
}

/// Runs one provider invocation: builds the argv, applies the global
/// container permit, delegates to the sandbox runner, and parses stdout.
pub struct Invoker {
    binaries: RunnerBinaries,
    permits: Permits,
}

impl Invoker {
    pub fn new(binaries: RunnerBinaries, max_concurrency: usize) -> Self {
        Self {
            binaries,
            permits: Permits::new(max_concurrency),
        }
    }

    pub fn invoke(
        &self,
        request: &InvocationRequest,
        events: &dyn EventSink,
    ) -> Result<InvocationOutcome, SandboxError> {
        fs::create_dir_all(&request.working_dir).map_err(|err| {
            SandboxError::transient(
                format!(
                    "failed to create agent directory {}: {err}",
                    request.working_dir.display()
                ),
                "The agent workspace could not be prepared. Please try again.",
            )
        })?;
        if let Some(team) = &request.team {
            refresh_teammates_file(&request.working_dir, team);
        }

        let spec = build_invocation(
            request.provider,
            &self.binaries,
            &request.model,
            &request.message,
            request.reset,
        );

        let _permit = if request.sandbox.mode.is_container() {
            Some(self.permits.acquire())
        } else {
            None
        };

        events.emit(
            EventKind::SandboxInvocationStart,
            EventFields::from([
                field("agent", request.agent_id.as_str()),
                field("provider", request.provider.to_string()),
                field("mode", request.sandbox.mode.as_str()),
                field("model", spec.resolved_model.as_str()),
            ]),
        );

        let run = run_sandboxed(&SandboxRequest {
            agent_id: request.agent_id.clone(),
            provider: request.provider,
            command: spec.binary,
            args: spec.args,
            working_dir: request.working_dir.clone(),
            sandbox: request.sandbox.clone(),
        });

        match run {
            Ok(run) => {
                events.emit(
                    EventKind::SandboxInvocationEnd,
                    EventFields::from([
                        field("agent", request.agent_id.as_str()),
                        field("mode", run.mode.as_str()),
                        field("durationMs", run.duration_ms),
                    ]),
                );
                let response = match request.provider {
                    ProviderKind::Anthropic => parse_anthropic_output(&run.stdout),
                    ProviderKind::OpenAi => parse_openai_output(&run.stdout),
                };
                Ok(InvocationOutcome {
                    response,
                    duration_ms: run.duration_ms,
                    path_mappings: run.path_mappings,
                })
            }
            Err(err) => {
                events.emit(
                    EventKind::SandboxInvocationError,
                    EventFields::from([
                        field("agent", request.agent_id.as_str()),
                        field("mode", request.sandbox.mode.as_str()),
                        field("classification", err.classification().as_str()),
                        field("error", err.to_string()),
                    ]),
                );
                Err(err)
            }
        }
    }
}

#[derive(Serialize)]
struct TeammatesFile<'a> {
    team: &'a str,
    team_name: &'a str,
    teammates: &'a [TeammateInfo],
}

/// Best effort: the metadata helps the agent address teammates, but a
/// write failure must not block the invocation.
fn refresh_teammates_file(working_dir: &std::path::Path, team: &TeamContext) {
    let body = serde_json::to_vec_pretty(&TeammatesFile {
        team: &team.team_id,
        team_name: &team.team_name,
        teammates: &team.teammates,
    });
    if let Ok(body) = body {
        let _ = atomic_write_file(&working_dir.join(TEAMMATES_FILE_NAME), &body);
    }
}
