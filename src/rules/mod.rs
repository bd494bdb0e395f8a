pub mod defaults;
pub mod engine;
pub mod parser;
pub mod store;
pub mod types;

pub use engine::RuleEngine;
pub use store::RuleStore;
pub use types::{CommandRequest, Decision, RequestContext, Rule, RuleAction, RuleSet, Trigger};
