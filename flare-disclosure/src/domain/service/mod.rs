//! 领域服务模块

pub mod access_policy;
pub mod anonymous_message_domain_service;
pub mod disclosure;

pub use access_policy::AccessPolicy;
pub use anonymous_message_domain_service::AnonymousMessageDomainService;
pub use disclosure::{DisclosureStateMachine, RevealOutcome};
