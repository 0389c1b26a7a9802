// Network connection models (GET network/connections)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub local_address: String,
    pub remote_address: String,
    pub status: String,
    #[serde(default)]
    pub pid: Option<u32>,
}
