pub mod forwarder;
pub mod path_pattern;
pub mod route_table;

pub use forwarder::{build_client, Client, Forwarder};
pub use path_pattern::{PathPattern, PatternError};
pub use route_table::{RouteDefinition, RouteEntry, RouteTable};
