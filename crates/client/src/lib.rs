//! Client side of crawlgate.
//!
//! Provides the shared origin fetch primitive, the crawler classifier, relay
//! path handling and the offline cache agent used by the server and agent
//! binaries.

pub mod agent;
pub mod classify;
pub mod origin;
pub mod relay;
pub mod url;

pub use agent::{AgentError, AgentState, CacheAgent, HttpNetwork, Interception, Network, ResponseSource};
pub use classify::{ContentScope, CrawlerClassifier, truncate_user_agent};
pub use origin::{OriginClient, OriginConfig, RenderedDocument};
pub use relay::{PathParam, relay_target};
