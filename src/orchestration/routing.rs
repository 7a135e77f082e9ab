use crate::config::{AgentConfig, TeamConfig};
use std::collections::BTreeMap;

pub const DEFAULT_AGENT_ID: &str = "default";
pub const MULTI_TARGET_AGENT_ID: &str = "error";
pub const MULTI_TARGET_RESPONSE: &str =
    "One message, one agent! I can't summon everyone at once. Pick a single @mention and resend.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedMessage {
    pub agent_id: String,
    pub message: String,
    pub is_team: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeammateMention {
    pub teammate_id: String,
    pub message: String,
}

/// Resolves the leading `@` prefix of an inbound message. A known agent
/// token wins over a team token of the same name; team tokens route to
/// the team leader. Two or more distinct targets in the leading prefix
/// produce the `error` sentinel with a canned response instead of an
/// invocation.
pub fn parse_routing(
    text: &str,
    agents: &BTreeMap<String, AgentConfig>,
    teams: &BTreeMap<String, TeamConfig>,
) -> RoutedMessage {
    let trimmed = text.trim();

    let mut leading_targets: Vec<(String, bool)> = Vec::new();
    let mut consumed = 0usize;
    for token in trimmed.split_whitespace() {
        let Some(raw_id) = token.strip_prefix('@') else {
            break;
        };
        let id = raw_id.trim_end_matches([':', ',', '.', '!', '?']);
        let resolved = if agents.contains_key(id) {
            Some((id.to_string(), false))
        } else {
            teams.get(id).map(|team| (team.leader_agent.clone(), true))
        };
        let Some((agent_id, is_team)) = resolved else {
            break;
        };
        if leading_targets.is_empty() {
            consumed = token.len();
        }
        if !leading_targets.iter().any(|(existing, _)| existing == &agent_id) {
            leading_targets.push((agent_id, is_team));
        }
    }

    if leading_targets.len() > 1 {
        return RoutedMessage {
            agent_id: MULTI_TARGET_AGENT_ID.to_string(),
            message: MULTI_TARGET_RESPONSE.to_string(),
            is_team: false,
        };
    }

    if let Some((agent_id, is_team)) = leading_targets.into_iter().next() {
        return RoutedMessage {
            agent_id,
            message: trimmed[consumed..].trim().to_string(),
            is_team,
        };
    }

    RoutedMessage {
        agent_id: DEFAULT_AGENT_ID.to_string(),
        message: trimmed.to_string(),
        is_team: false,
    }
}

/// Finds `@<id>` teammate mentions in an agent's reply. Each mention
/// carries the reply segment between it and the next mention (the full
/// reply when that segment is empty), so the payload is always non-empty
/// for a non-empty reply.
pub fn extract_teammate_mentions(
    response: &str,
    self_id: &str,
    team: &TeamConfig,
) -> Vec<TeammateMention> {
    let mut found: Vec<(usize, usize, String)> = Vec::new();
    let mut cursor = 0usize;
    while let Some(rel) = response[cursor..].find('@') {
        let at = cursor + rel;
        let id_start = at + 1;
        let id_end = response[id_start..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .map(|r| id_start + r)
            .unwrap_or(response.len());
        let id = &response[id_start..id_end];
        if !id.is_empty()
            && id != self_id
            && team.agents.iter().any(|member| member == id)
            && !found.iter().any(|(_, _, seen)| seen == id)
        {
            found.push((at, id_end, id.to_string()));
        }
        cursor = id_end.max(at + 1);
    }

    let mut mentions = Vec::with_capacity(found.len());
    for (index, (_, segment_start, id)) in found.iter().enumerate() {
        let segment_end = found
            .get(index + 1)
            .map(|(next_at, _, _)| *next_at)
            .unwrap_or(response.len());
        let mut segment = response[*segment_start..segment_end].trim();
        if segment.is_empty() {
            segment = response.trim();
        }
        mentions.push(TeammateMention {
            teammate_id: id.clone(),
            message: segment.to_string(),
        });
    }
    mentions
}

/// First team (in id order) containing the agent.
pub fn find_team_for_agent<'a>(
    agent_id: &str,
    teams: &'a BTreeMap<String, TeamConfig>,
) -> Option<(&'a str, &'a TeamConfig)> {
    teams
        .iter()
        .find(|(_, team)| team.agents.iter().any(|member| member == agent_id))
        .map(|(team_id, team)| (team_id.as_str(), team))
}
