pub mod access_rules;
pub mod authority_mapper;
pub mod cors_policy;
pub mod key_source;
pub mod token_validator;

pub use access_rules::{AccessDecision, AccessRequirement, AccessRule, AccessRuleSet};
pub use authority_mapper::AuthorityMapper;
pub use cors_policy::CorsPolicy;
pub use key_source::{JwksKeySource, KeySource, SharedSecretKeySource};
pub use token_validator::{bearer_token, TokenClaims, TokenValidator};
