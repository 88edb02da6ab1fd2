use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::storage::{attr_str, SharedStore};

/// Split a comma-delimited username list, trimming each entry and dropping empties.
pub fn split_usernames(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// Team-admin gate over the teams table. Reads the authoritative record on every
/// call and fails closed: any lookup problem means "not an admin".
pub struct TeamAuthorizer {
    store: SharedStore,
    teams_table: String,
}

impl TeamAuthorizer {
    pub fn new(store: SharedStore, cfg: &AppConfig) -> Self {
        Self { store, teams_table: cfg.teams_table.clone() }
    }

    pub fn is_team_admin(&self, username: &str, team_id: &str) -> bool {
        let team = match self.store.get_item(&self.teams_table, team_id) {
            Ok(Some(t)) => t,
            Ok(None) => {
                debug!(target: "agendum::identity", team = team_id, "admin check on unknown team");
                return false;
            }
            Err(e) => {
                warn!(target: "agendum::identity", team = team_id, "team lookup failed: {e}");
                return false;
            }
        };
        let Some(admins) = attr_str(&team, "admins") else { return false; };
        admins.split(',').any(|a| a.trim() == username)
    }
}
