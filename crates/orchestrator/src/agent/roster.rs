use std::collections::HashMap;
use std::sync::Arc;

use debate_core::{Side, SpeakerRole};

use super::{Agent, ChatCompletionAgent, ChatCompletionConfig, ScriptedAgent};
use crate::error::AgentError;

/// Which agent speaks for each machine-driven role.
///
/// Human seats are never looked up here; their turns come through the
/// intervention channel.
#[derive(Clone, Default)]
pub struct AgentRoster {
    agents: HashMap<SpeakerRole, Arc<dyn Agent>>,
}

impl AgentRoster {
    pub const ROLES: [SpeakerRole; 4] = [
        SpeakerRole::Normalizer,
        SpeakerRole::Advocate(Side::Pro),
        SpeakerRole::Advocate(Side::Con),
        SpeakerRole::Moderator,
    ];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: SpeakerRole, agent: Arc<dyn Agent>) -> Self {
        self.agents.insert(role, agent);
        self
    }

    /// Scripted agents for every role.
    pub fn scripted() -> Self {
        Self::ROLES.into_iter().fold(Self::new(), |roster, role| {
            roster.with(role, Arc::new(ScriptedAgent::new(role.as_str())))
        })
    }

    /// Streaming scripted agents for every role.
    pub fn scripted_streaming(words_per_token: usize) -> Self {
        Self::ROLES.into_iter().fold(Self::new(), |roster, role| {
            roster.with(
                role,
                Arc::new(ScriptedAgent::new(role.as_str()).streaming(words_per_token)),
            )
        })
    }

    /// One chat-completion client per role, sharing a connection pool.
    pub fn chat_completion(config: ChatCompletionConfig) -> Self {
        let client = reqwest::Client::new();
        Self::ROLES.into_iter().fold(Self::new(), |roster, role| {
            roster.with(
                role,
                Arc::new(ChatCompletionAgent::with_client(
                    role.as_str(),
                    config.clone(),
                    client.clone(),
                )),
            )
        })
    }

    pub fn get(&self, role: SpeakerRole) -> Result<Arc<dyn Agent>, AgentError> {
        self.agents
            .get(&role)
            .cloned()
            .ok_or(AgentError::Unavailable(role))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl std::fmt::Debug for AgentRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut roles: Vec<_> = self.agents.keys().map(|r| r.as_str()).collect();
        roles.sort_unstable();
        f.debug_struct("AgentRoster").field("roles", &roles).finish()
    }
}
