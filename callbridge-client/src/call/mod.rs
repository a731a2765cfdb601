mod call_action;
mod call_agent;
mod call_client;
mod call_event;
mod call_session;
mod call_state;

pub use call_action::*;
pub(crate) use call_agent::AgentInput;
pub use call_client::*;
pub use call_event::*;
pub use call_session::*;
pub use call_state::*;
