//! Deadline extension.

use super::{ExtendOutcome, LifecycleActor};
use crate::error::LifecycleResult;
use crate::messages;
use crate::platform::UserId;
use chrono::{DateTime, Utc};
use tracing::info;

impl LifecycleActor {
    pub(crate) async fn handle_extend(
        &mut self,
        owner: UserId,
        now: DateTime<Utc>,
    ) -> LifecycleResult<ExtendOutcome> {
        let record = self.live_record(owner)?;
        let expires_at = self
            .registry
            .extend(owner, now, &self.settings.policy)?;

        crate::metrics::inc_extensions();
        info!(
            owner = %owner,
            previous = %record.expires_at,
            expires_at = %expires_at,
            "Private channel extended"
        );
        self.checkpoint().await;
        self.post(record.primary, &messages::extended(expires_at))
            .await;

        Ok(ExtendOutcome {
            previous: record.expires_at,
            expires_at,
        })
    }
}
