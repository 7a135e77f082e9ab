use super::chat_history::append_chain_transcript;
use super::reset::resolve_reset;
use super::routing::{extract_teammate_mentions, find_team_for_agent};
use crate::config::{Settings, TeamConfig};
use crate::events::{field, EventFields, EventKind, EventSink};
use crate::provider::{InvocationRequest, Invoker, TeamContext, TeammateInfo};
use crate::queue::PathMapping;
use crate::sandbox::SandboxError;
use crate::shared::append_queue_log_line;
use std::path::Path;
use std::thread;

pub const CHAIN_STEP_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStep {
    pub agent_id: String,
    pub response: String,
}

#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub final_agent: String,
    pub aggregated: String,
    pub steps: Vec<ChainStep>,
    pub path_mappings: Vec<PathMapping>,
}

/// Runs a routed message to completion: a single invocation for a
/// teamless agent, otherwise a team chain with sequential handoffs and
/// a one-round parallel fan-out on multi-mention.
pub struct ChainRunner<'a> {
    pub settings: &'a Settings,
    pub state_root: &'a Path,
    pub invoker: &'a Invoker,
    pub events: &'a dyn EventSink,
}

impl ChainRunner<'_> {
    pub fn run(&self, target_agent_id: &str, message: &str) -> Result<ChainOutcome, SandboxError> {
        let Some((team_id, team)) = find_team_for_agent(target_agent_id, &self.settings.teams)
        else {
            let outcome = self.invoke_agent(target_agent_id, message, true)?;
            return Ok(ChainOutcome {
                final_agent: target_agent_id.to_string(),
                aggregated: outcome.response.clone(),
                steps: vec![ChainStep {
                    agent_id: target_agent_id.to_string(),
                    response: outcome.response,
                }],
                path_mappings: outcome.path_mappings,
            });
        };

        self.events.emit(
            EventKind::TeamChainStart,
            EventFields::from([field("team", team_id), field("agent", target_agent_id)]),
        );

        let mut steps: Vec<ChainStep> = Vec::new();
        let mut mappings: Vec<PathMapping> = Vec::new();
        let mut current_agent = target_agent_id.to_string();
        let mut current_message = message.to_string();

        loop {
            let step_index = steps.len();
            self.events.emit(
                EventKind::ChainStepStart,
                EventFields::from([
                    field("team", team_id),
                    field("agent", current_agent.as_str()),
                    field("step", step_index as i64),
                ]),
            );

            let outcome = self.invoke_agent(&current_agent, &current_message, step_index == 0)?;
            merge_mappings(&mut mappings, outcome.path_mappings);
            steps.push(ChainStep {
                agent_id: current_agent.clone(),
                response: outcome.response.clone(),
            });

            self.events.emit(
                EventKind::ChainStepDone,
                EventFields::from([
                    field("team", team_id),
                    field("agent", current_agent.as_str()),
                    field("step", step_index as i64),
                ]),
            );

            let mentions = extract_teammate_mentions(&outcome.response, &current_agent, team);
            if mentions.is_empty() {
                break;
            }

            if mentions.len() == 1 {
                let mention = &mentions[0];
                self.events.emit(
                    EventKind::ChainHandoff,
                    EventFields::from([
                        field("team", team_id),
                        field("from", current_agent.as_str()),
                        field("to", mention.teammate_id.as_str()),
                    ]),
                );
                current_message = handoff_message(&current_agent, &mention.message);
                current_agent = mention.teammate_id.clone();
                continue;
            }

            // Multi-mention: one parallel round, then stop. Mentions
            // inside fan-out replies are ignored.
            let from_agent = current_agent.clone();
            let fan_out_base = steps.len();
            for (offset, mention) in mentions.iter().enumerate() {
                self.events.emit(
                    EventKind::ChainStepStart,
                    EventFields::from([
                        field("team", team_id),
                        field("agent", mention.teammate_id.as_str()),
                        field("step", (fan_out_base + offset) as i64),
                    ]),
                );
            }
            let results: Vec<(String, Result<_, SandboxError>)> = thread::scope(|scope| {
                let handles: Vec<_> = mentions
                    .iter()
                    .map(|mention| {
                        let message = handoff_message(&from_agent, &mention.message);
                        let teammate_id = mention.teammate_id.clone();
                        scope.spawn(move || {
                            let result = self.invoke_agent(&teammate_id, &message, false);
                            (teammate_id, result)
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| match handle.join() {
                        Ok(result) => result,
                        Err(_) => (
                            String::new(),
                            Err(SandboxError::transient(
                                "fan-out worker panicked",
                                "The agent team failed to respond. Please try again.",
                            )),
                        ),
                    })
                    .collect()
            });

            for (offset, (teammate_id, result)) in results.into_iter().enumerate() {
                let outcome = result?;
                merge_mappings(&mut mappings, outcome.path_mappings);
                self.events.emit(
                    EventKind::ChainStepDone,
                    EventFields::from([
                        field("team", team_id),
                        field("agent", teammate_id.as_str()),
                        field("step", (fan_out_base + offset) as i64),
                    ]),
                );
                steps.push(ChainStep {
                    agent_id: teammate_id,
                    response: outcome.response,
                });
            }
            break;
        }

        self.events.emit(
            EventKind::TeamChainEnd,
            EventFields::from([field("team", team_id), field("steps", steps.len() as i64)]),
        );

        if let Err(err) = append_chain_transcript(self.state_root, team_id, message, &steps) {
            let _ = append_queue_log_line(
                self.state_root,
                "warn",
                &format!("failed to write chat history for team {team_id}: {err}"),
            );
        }

        let final_agent = steps
            .last()
            .map(|step| step.agent_id.clone())
            .unwrap_or_else(|| target_agent_id.to_string());

        Ok(ChainOutcome {
            final_agent,
            aggregated: aggregate_steps(&steps),
            steps,
            path_mappings: mappings,
        })
    }

    fn invoke_agent(
        &self,
        agent_id: &str,
        message: &str,
        honor_global_reset: bool,
    ) -> Result<crate::provider::InvocationOutcome, SandboxError> {
        let agent = self.settings.agent(agent_id).map_err(|_| {
            SandboxError::terminal(
                format!("no agent `{agent_id}` is configured"),
                Some(format!("Add an `agents.{agent_id}` entry to the settings.")),
                "No agent is configured to handle this message.",
            )
        })?;

        let working_dir = self.settings.resolve_working_directory(agent);
        let reset = resolve_reset(self.state_root, &working_dir, honor_global_reset);
        let team = find_team_for_agent(agent_id, &self.settings.teams).map(|(team_id, team)| {
            TeamContext {
                team_id: team_id.to_string(),
                team_name: team.name.clone(),
                teammates: teammates_of(team, agent_id, self.settings),
            }
        });

        self.invoker.invoke(
            &InvocationRequest {
                agent_id: agent_id.to_string(),
                provider: agent.provider,
                model: self.settings.resolve_model(agent),
                message: message.to_string(),
                working_dir,
                sandbox: self.settings.sandbox_for_agent(agent),
                reset,
                team,
            },
            self.events,
        )
    }
}

fn teammates_of(team: &TeamConfig, self_id: &str, settings: &Settings) -> Vec<TeammateInfo> {
    team.agents
        .iter()
        .filter(|member| member.as_str() != self_id)
        .map(|member| TeammateInfo {
            id: member.clone(),
            name: settings
                .agents
                .get(member)
                .map(|agent| agent.name.clone())
                .unwrap_or_else(|| member.clone()),
        })
        .collect()
}

fn handoff_message(from_agent: &str, mention_payload: &str) -> String {
    format!("[Message from teammate @{from_agent}]:\n{mention_payload}")
}

fn aggregate_steps(steps: &[ChainStep]) -> String {
    if steps.len() == 1 {
        return steps[0].response.clone();
    }
    steps
        .iter()
        .map(|step| format!("@{}: {}", step.agent_id, step.response))
        .collect::<Vec<_>>()
        .join(CHAIN_STEP_SEPARATOR)
}

fn merge_mappings(into: &mut Vec<PathMapping>, new: Vec<PathMapping>) {
    for mapping in new {
        if !into.contains(&mapping) {
            into.push(mapping);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{aggregate_steps, handoff_message, ChainStep};

    #[test]
    fn single_step_aggregation_is_the_raw_response() {
        let steps = vec![ChainStep {
            agent_id: "default".to_string(),
            response: "hello".to_string(),
        }];
        assert_eq!(aggregate_steps(&steps), "hello");
    }

    #[test]
    fn multi_step_aggregation_joins_in_order() {
        let steps = vec![
            ChainStep {
                agent_id: "lead".to_string(),
                response: "@coder implement X".to_string(),
            },
            ChainStep {
                agent_id: "coder".to_string(),
                response: "done".to_string(),
            },
        ];
        assert_eq!(
            aggregate_steps(&steps),
            "@lead: @coder implement X\n\n---\n\n@coder: done"
        );
    }

    #[test]
    fn handoff_message_names_the_sender() {
        assert_eq!(
            handoff_message("lead", "implement X"),
            "[Message from teammate @lead]:\nimplement X"
        );
    }
}
