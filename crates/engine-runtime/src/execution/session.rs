use engine_core::metrics::MetricsSnapshot;
use model::{
    core::identifiers::RunId,
    migration::{
        errors::MigrationErrorRecord, group::EntityGroup, profile::MigrationProfile,
        request::MigrationRequest, status::MigrationStatus,
    },
};
use serde::Serialize;
use tracing::warn;

/// State of one run, owned by the `start` call that created it.
#[derive(Debug)]
pub struct MigrationSession {
    pub run_id: RunId,
    pub profile: MigrationProfile,
    pub groups: Vec<EntityGroup>,
    status: MigrationStatus,
    errors: Vec<MigrationErrorRecord>,
}

/// What a finished run hands back to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOutcome {
    pub run_id: RunId,
    pub errors: Vec<MigrationErrorRecord>,
    pub entity_groups: Vec<EntityGroup>,
    pub metrics: MetricsSnapshot,
}

impl MigrationSession {
    pub fn new(request: MigrationRequest) -> Self {
        let mut groups = request.entity_groups;
        for group in &mut groups {
            group.recount();
        }

        Self {
            run_id: request.run_id,
            profile: request.profile,
            groups,
            status: MigrationStatus::Waiting,
            errors: Vec::new(),
        }
    }

    pub fn status(&self) -> MigrationStatus {
        self.status
    }

    /// Moves to `next`. Backward transitions are refused and logged.
    pub fn advance(&mut self, next: MigrationStatus) -> bool {
        if !self.status.can_advance_to(next) {
            warn!(run_id = %self.run_id, from = %self.status, to = %next, "Refusing status transition");
            return false;
        }
        self.status = next;
        true
    }

    pub fn reset_progress(&mut self) {
        for group in &mut self.groups {
            group.reset_progress();
        }
    }

    pub fn requires_asset_download(&self) -> bool {
        self.groups.iter().any(|g| g.requires_asset_download)
    }

    pub fn push_error(&mut self, error: MigrationErrorRecord) {
        self.errors.push(error);
    }

    pub fn extend_errors(&mut self, errors: impl IntoIterator<Item = MigrationErrorRecord>) {
        self.errors.extend(errors);
    }

    pub fn errors(&self) -> &[MigrationErrorRecord] {
        &self.errors
    }

    pub fn into_outcome(self, metrics: MetricsSnapshot) -> MigrationOutcome {
        MigrationOutcome {
            run_id: self.run_id,
            errors: self.errors,
            entity_groups: self.groups,
            metrics,
        }
    }
}
