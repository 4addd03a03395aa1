mod organizations;
mod provider_connections;
mod pull_requests;
mod recommendations;
mod resources;
mod rule_configs;

pub use organizations::OrgRepo;
pub use provider_connections::ProviderConnectionRepo;
pub use pull_requests::PullRequestRepo;
pub use recommendations::RecommendationRepo;
pub use resources::ResourceRepo;
pub use rule_configs::RuleConfigRepo;
