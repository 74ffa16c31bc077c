use serde::{Deserialize, Serialize};

/// Lifecycle state shared by [`crate::domain::Cluster`], [`crate::domain::Deployment`]
/// and [`crate::domain::Volume`]. Terminal states are [`Status::Running`] and
/// [`Status::Failed`] — the latter still allows deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entity_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Creating,
    Running,
    Updating,
    Deploying,
    Failed,
    Deleting,
}

impl Status {
    /// `running` and `failed` are the only states from which no background
    /// worker is expected to still be driving a transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Running | Status::Failed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Creating => "creating",
            Status::Running => "running",
            Status::Updating => "updating",
            Status::Deploying => "deploying",
            Status::Failed => "failed",
            Status::Deleting => "deleting",
        };
        f.write_str(s)
    }
}
