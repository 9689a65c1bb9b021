use crate::{error::ConfigError, mapping::GroupConfig};

const CHINOOK_GROUPS: &str = include_str!("../assets/chinook_groups.json");

/// Group layout written by `init`: music catalog, customer data, playlists
/// and employees.
pub fn chinook_groups() -> Result<Vec<GroupConfig>, ConfigError> {
    Ok(serde_json::from_str(CHINOOK_GROUPS)?)
}
