use super::recovery::recover_processing_queue_entries;
use super::state_paths::{bootstrap_state_root, StatePaths};
use super::RuntimeError;
use crate::config::Settings;
use crate::events::{field, EventFields, EventKind, EventSink, FileEventSink};
use crate::orchestration::{parse_routing, ChainRunner, MULTI_TARGET_AGENT_ID};
use crate::provider::{Invoker, RunnerBinaries};
use crate::queue::{self, ClaimedMessage, DeadLetterRecord, OutgoingMessage, QueuePaths};
use crate::sandbox::{ErrorClass, SandboxError};
use crate::shared::{append_queue_log_line, redact_secrets};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const POLL_INTERVAL_MS: u64 = 1000;
const HEARTBEAT_DEDUP_WINDOW: Duration = Duration::from_secs(60);
const HEARTBEAT_DEDUP_PREFIX_CHARS: usize = 160;

struct ProcessorShared {
    state_root: PathBuf,
    settings: Settings,
    queue: QueuePaths,
    invoker: Invoker,
    events: FileEventSink,
    queued: Mutex<HashSet<String>>,
    heartbeat_seen: Mutex<HashMap<String, Instant>>,
}

impl ProcessorShared {
    fn new(state_root: &Path, settings: Settings, binaries: RunnerBinaries) -> Self {
        let max_concurrency = settings.sandbox.max_concurrency;
        Self {
            state_root: state_root.to_path_buf(),
            settings,
            queue: QueuePaths::from_state_root(state_root),
            invoker: Invoker::new(binaries, max_concurrency),
            events: FileEventSink::new(state_root.join("events")),
            queued: Mutex::new(HashSet::new()),
            heartbeat_seen: Mutex::new(HashMap::new()),
        }
    }
}

struct AgentWorker {
    tx: Sender<String>,
    handle: JoinHandle<()>,
}

/// The processor loop: a 1 Hz poller classifies new incoming files by
/// target agent and feeds one FIFO worker per agent, so work for the
/// same agent is strictly serialized while different agents run in
/// parallel. Returns once `stop` is set and the workers have finished
/// their in-flight files.
pub fn run_queue_processor(
    state_root: &Path,
    settings: Settings,
    stop: Arc<AtomicBool>,
) -> Result<(), RuntimeError> {
    let paths = StatePaths::new(state_root);
    bootstrap_state_root(&paths)?;

    let recovered =
        recover_processing_queue_entries(state_root).map_err(RuntimeError::Recovery)?;
    for path in &recovered {
        let _ = append_queue_log_line(
            state_root,
            "info",
            &format!("recovered {} back to incoming", path.display()),
        );
    }

    let shared = Arc::new(ProcessorShared::new(
        state_root,
        settings,
        RunnerBinaries::from_env(),
    ));
    shared.events.emit(
        EventKind::ProcessorStart,
        EventFields::from([field("recovered", recovered.len() as i64)]),
    );

    let mut workers: HashMap<String, AgentWorker> = HashMap::new();
    while !stop.load(Ordering::Relaxed) {
        dispatch_tick(&shared, &mut workers);
        if !sleep_with_stop(&stop, Duration::from_millis(POLL_INTERVAL_MS)) {
            break;
        }
    }

    // Workers drain their channels and exit; claimed files they did not
    // reach stay in `incoming`, in-flight ones in `processing` for the
    // next start's recovery sweep.
    for (_, worker) in workers {
        drop(worker.tx);
        let _ = worker.handle.join();
    }
    Ok(())
}

/// Processes the messages currently visible in `incoming` on the calling
/// thread, oldest first. Returns how many produced a response.
pub fn drain_incoming_once(state_root: &Path, settings: &Settings) -> Result<usize, RuntimeError> {
    let paths = StatePaths::new(state_root);
    bootstrap_state_root(&paths)?;

    let shared = ProcessorShared::new(state_root, settings.clone(), RunnerBinaries::from_env());
    let names = queue::list_incoming(&shared.queue)?;
    let mut processed = 0usize;
    for name in names {
        if process_one(&shared, &name) {
            processed += 1;
        }
    }
    Ok(processed)
}

fn dispatch_tick(shared: &Arc<ProcessorShared>, workers: &mut HashMap<String, AgentWorker>) {
    let names = match queue::list_incoming(&shared.queue) {
        Ok(names) => names,
        Err(err) => {
            let _ = append_queue_log_line(
                &shared.state_root,
                "warn",
                &format!("failed to scan incoming queue: {err}"),
            );
            return;
        }
    };

    for name in names {
        if shared
            .queued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&name)
        {
            continue;
        }

        let payload = match queue::peek_incoming(&shared.queue, &name) {
            Ok(Some(payload)) => payload,
            Ok(None) => continue,
            Err(err) => {
                let _ = append_queue_log_line(
                    &shared.state_root,
                    "warn",
                    &format!("failed to peek {name}: {err}"),
                );
                continue;
            }
        };
        let target = classify_target(&shared.settings, &payload);

        shared
            .queued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.clone());

        let worker = workers
            .entry(target)
            .or_insert_with(|| spawn_agent_worker(shared.clone()));
        if worker.tx.send(name.clone()).is_err() {
            shared
                .queued
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&name);
        }
    }
}

fn spawn_agent_worker(shared: Arc<ProcessorShared>) -> AgentWorker {
    let (tx, rx) = mpsc::channel::<String>();
    let handle = thread::spawn(move || {
        for name in rx {
            process_one(&shared, &name);
            shared
                .queued
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&name);
        }
    });
    AgentWorker { tx, handle }
}

/// Pre-routed messages go to their named agent when it exists; everything
/// else is classified by the `@` prefix.
fn classify_target(settings: &Settings, payload: &queue::IncomingMessage) -> String {
    if let Some(agent) = payload
        .agent
        .as_ref()
        .filter(|agent| settings.agents.contains_key(agent.as_str()))
    {
        return agent.clone();
    }
    parse_routing(&payload.message, &settings.agents, &settings.teams).agent_id
}

fn process_one(shared: &ProcessorShared, name: &str) -> bool {
    let claimed = match queue::claim(&shared.queue, name) {
        Ok(Some(claimed)) => claimed,
        Ok(None) => return false,
        Err(err) => {
            let _ = append_queue_log_line(
                &shared.state_root,
                "warn",
                &format!("failed to claim {name}: {err}"),
            );
            return false;
        }
    };

    shared.events.emit(
        EventKind::MessageReceived,
        EventFields::from([
            field("channel", claimed.payload.channel.as_str()),
            field("messageId", claimed.payload.message_id.as_str()),
        ]),
    );

    let (target_agent, message) = match claimed
        .payload
        .agent
        .as_ref()
        .filter(|agent| shared.settings.agents.contains_key(agent.as_str()))
    {
        Some(agent) => (agent.clone(), claimed.payload.message.clone()),
        None => {
            let routed = parse_routing(
                &claimed.payload.message,
                &shared.settings.agents,
                &shared.settings.teams,
            );
            (routed.agent_id, routed.message)
        }
    };

    shared.events.emit(
        EventKind::AgentRouted,
        EventFields::from([
            field("agent", target_agent.as_str()),
            field("messageId", claimed.payload.message_id.as_str()),
        ]),
    );

    // Multi-target prefixes short-circuit: one canned response, no
    // invocation.
    if target_agent == MULTI_TARGET_AGENT_ID {
        return finalize_response(shared, &claimed, &target_agent, &message, Vec::new());
    }

    let runner = ChainRunner {
        settings: &shared.settings,
        state_root: &shared.state_root,
        invoker: &shared.invoker,
        events: &shared.events,
    };

    match runner.run(&target_agent, &message) {
        Ok(outcome) => {
            let content =
                queue::prepare_outbound_content(&outcome.aggregated, &outcome.path_mappings);
            finalize_response(
                shared,
                &claimed,
                &outcome.final_agent,
                &content.message,
                content.files,
            )
        }
        Err(err) => handle_failure(shared, &claimed, &target_agent, err),
    }
}

fn finalize_response(
    shared: &ProcessorShared,
    claimed: &ClaimedMessage,
    agent_id: &str,
    message: &str,
    files: Vec<String>,
) -> bool {
    let outgoing = OutgoingMessage {
        channel: claimed.payload.channel.clone(),
        sender: claimed.payload.sender.clone(),
        message_id: claimed.payload.message_id.clone(),
        message: redact_secrets(message),
        original_message: claimed.payload.message.clone(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        agent: agent_id.to_string(),
        files,
    };

    if let Err(err) = queue::write_outgoing(&shared.queue, &outgoing) {
        return handle_failure(
            shared,
            claimed,
            agent_id,
            SandboxError::transient(
                format!("failed to write response: {err}"),
                "The response could not be delivered. Please try again.",
            ),
        );
    }
    if let Err(err) = queue::complete(&shared.queue, claimed) {
        let _ = append_queue_log_line(
            &shared.state_root,
            "warn",
            &format!("failed to remove processing file {}: {err}", claimed.name),
        );
    }

    shared.events.emit(
        EventKind::ResponseReady,
        EventFields::from([
            field("agent", agent_id),
            field("channel", claimed.payload.channel.as_str()),
            field("messageId", claimed.payload.message_id.as_str()),
        ]),
    );
    true
}

fn handle_failure(
    shared: &ProcessorShared,
    claimed: &ClaimedMessage,
    target_agent: &str,
    error: SandboxError,
) -> bool {
    let class = error.classification();
    let reason = redact_secrets(&error.to_string());
    let max_attempts = shared.settings.sandbox.max_attempts;
    let failure_attempt = claimed.payload.attempt + 1;

    if class == ErrorClass::Transient && failure_attempt < max_attempts {
        let mut updated = claimed.payload.clone();
        updated.attempt = failure_attempt;
        updated.error_class = Some(class.as_str().to_string());
        match queue::requeue(&shared.queue, claimed, &updated) {
            Ok(_) => log_message_error(
                shared,
                &claimed.payload.channel,
                "warn",
                &reason,
                &format!(
                    "retrying {} (attempt {failure_attempt}/{max_attempts}): {reason}",
                    claimed.name
                ),
            ),
            Err(err) => log_message_error(
                shared,
                &claimed.payload.channel,
                "warn",
                &reason,
                &format!("failed to requeue {}: {err}", claimed.name),
            ),
        }
        return false;
    }

    let record = DeadLetterRecord {
        failed_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        error_class: class.as_str().to_string(),
        error_message: reason.clone(),
        attempt: failure_attempt,
        max_attempts,
        payload: claimed.payload.clone(),
    };
    if let Err(err) = queue::dead_letter(&shared.queue, claimed, &record) {
        log_message_error(
            shared,
            &claimed.payload.channel,
            "error",
            &reason,
            &format!("failed to dead-letter {}: {err}", claimed.name),
        );
        return false;
    }
    log_message_error(
        shared,
        &claimed.payload.channel,
        "error",
        &reason,
        &format!("dead-lettered {} ({class}): {reason}", claimed.name),
    );

    // The sender still gets a reply explaining the failure.
    let outgoing = OutgoingMessage {
        channel: claimed.payload.channel.clone(),
        sender: claimed.payload.sender.clone(),
        message_id: claimed.payload.message_id.clone(),
        message: error.user_message().to_string(),
        original_message: claimed.payload.message.clone(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        agent: target_agent.to_string(),
        files: Vec::new(),
    };
    if let Err(err) = queue::write_outgoing(&shared.queue, &outgoing) {
        log_message_error(
            shared,
            &claimed.payload.channel,
            "error",
            &reason,
            &format!("failed to write failure response for {}: {err}", claimed.name),
        );
        return true;
    }
    shared.events.emit(
        EventKind::ResponseReady,
        EventFields::from([
            field("agent", target_agent),
            field("channel", claimed.payload.channel.as_str()),
            field("messageId", claimed.payload.message_id.as_str()),
        ]),
    );
    true
}

/// Heartbeat traffic repeats the same failure every beat, so heartbeat
/// errors are deduplicated on the leading chars of the error text inside
/// a rolling window. All other channels log every occurrence.
fn log_message_error(
    shared: &ProcessorShared,
    channel: &str,
    level: &str,
    error_text: &str,
    line: &str,
) {
    if channel == queue::HEARTBEAT_CHANNEL {
        let prefix: String = error_text
            .chars()
            .take(HEARTBEAT_DEDUP_PREFIX_CHARS)
            .collect();
        let key = short_hash(&prefix);
        let mut seen = shared
            .heartbeat_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        seen.retain(|_, at| now.duration_since(*at) < HEARTBEAT_DEDUP_WINDOW);
        if seen.contains_key(&key) {
            return;
        }
        seen.insert(key, now);
    }
    let _ = append_queue_log_line(&shared.state_root, level, line);
}

fn short_hash(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    digest[..8]
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn sleep_with_stop(stop: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::from_millis(0) {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(Duration::from_millis(200));
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !stop.load(Ordering::Relaxed)
}
