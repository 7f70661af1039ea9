pub mod agent;
pub mod error;
pub mod hub;
pub mod intervention;
pub mod prompts;
pub mod quality;
pub mod registry;
pub mod retry;
pub mod session_orchestrator;
pub mod state_machine;
pub mod transcript;

pub use agent::{Agent, AgentReply, AgentRoster, ChatCompletionConfig, ScriptedAgent, TurnContext};
pub use error::{AgentError, DeliveryError, OrchestratorError, Result, StoreError, TimeoutError};
pub use hub::{HubConfig, SessionHub, SubscriberInfo, Subscription};
pub use intervention::{Intervention, InterventionHandler};
pub use quality::{QualityGate, Verdict};
pub use registry::SessionRegistry;
pub use retry::{RetryOutcome, RetryPolicy};
pub use session_orchestrator::{SessionHandle, SessionOrchestrator, SessionServices};
pub use state_machine::{PhaseStateMachine, Turn};
pub use transcript::{InMemoryTranscriptStore, TranscriptStore};
