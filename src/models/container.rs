// Docker container models (GET docker/status + GET docker/containers)

use serde::{Deserialize, Serialize};

/// Docker container state; serializes to lowercase JSON (e.g. "running").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Running,
    Exited,
    Paused,
    Restarting,
    Created,
    Unknown,
}

impl ContainerState {
    /// Parse from the backend's status string (e.g. "running", "Up 3 hours (running)").
    pub fn from_status(s: &str) -> Self {
        let s = s.to_lowercase();
        if s.contains("running") {
            ContainerState::Running
        } else if s.contains("restarting") {
            ContainerState::Restarting
        } else if s.contains("paused") {
            ContainerState::Paused
        } else if s.contains("exited") {
            ContainerState::Exited
        } else if s.contains("created") {
            ContainerState::Created
        } else {
            ContainerState::Unknown
        }
    }
}

/// Serializes with the derived `state` and `short_id` alongside the backend fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ContainerView")]
pub struct Container {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    #[serde(default)]
    pub created: String,
}

impl Container {
    pub fn state(&self) -> ContainerState {
        ContainerState::from_status(&self.status)
    }

    /// First 12 characters of the id, as `docker ps` prints it.
    pub fn short_id(&self) -> &str {
        self.id.get(..12).unwrap_or(&self.id)
    }
}

#[derive(Serialize)]
struct ContainerView {
    id: String,
    short_id: String,
    name: String,
    image: String,
    status: String,
    state: ContainerState,
    created: String,
}

impl From<Container> for ContainerView {
    fn from(c: Container) -> Self {
        Self {
            short_id: c.short_id().to_string(),
            state: c.state(),
            id: c.id,
            name: c.name,
            image: c.image,
            status: c.status,
            created: c.created,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockerSystemInfo {
    #[serde(default)]
    pub containers_running: u32,
    #[serde(default)]
    pub containers_stopped: u32,
    #[serde(default)]
    pub containers_paused: u32,
    #[serde(default)]
    pub containers_total: u32,
    #[serde(default)]
    pub images: u32,
}

/// Body of GET docker/status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerStatus {
    pub available: bool,
    #[serde(default)]
    pub system_info: Option<DockerSystemInfo>,
}

/// Status and container list folded into one batch for the containers stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerOverview {
    pub available: bool,
    pub system_info: Option<DockerSystemInfo>,
    pub containers: Vec<Container>,
}
