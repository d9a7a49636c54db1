//! Client for the external advisory collaborator. One attempt per
//! incident, hard timeout, and every failure mode — network error, timeout,
//! non-2xx, malformed JSON, schema rejection — collapses to the same
//! outcome: the deterministic fallback stands and the reasons are kept as
//! audit metadata on the packet. Nothing here is ever surfaced to the
//! operator as a blocking error.

use conduct_core::advisory::{AdvisoryPacket, AdvisoryRequest, Provenance};
use conduct_core::schema::validate_advisory;
use uuid::Uuid;

use crate::state::AdvisorySettings;
use crate::store::{MemoryStore, Store};

/// POST the request and validate whatever comes back. `Err` carries the
/// audit trail, not an operator-facing failure.
pub async fn fetch_advisory(
    settings: &AdvisorySettings,
    request: &AdvisoryRequest,
) -> Result<AdvisoryPacket, Vec<String>> {
    let url = settings
        .url
        .as_ref()
        .ok_or_else(|| vec!["advisory integration is disabled".to_string()])?;

    let response = settings
        .client
        .post(url)
        .timeout(settings.timeout)
        .json(request)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                vec![format!(
                    "advisory call exceeded {}s timeout",
                    settings.timeout.as_secs()
                )]
            } else {
                vec![format!("advisory request failed: {}", e)]
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(vec![format!("advisory returned status {}", status)]);
    }

    let raw: serde_json::Value = response
        .json()
        .await
        .map_err(|e| vec![format!("advisory response was not valid JSON: {}", e)])?;

    let mut packet = validate_advisory(&raw)?;
    // Whatever the packet claims, it arrived over the advisory path.
    packet.source = Provenance::Ai;
    packet.ai_errors.clear();
    packet.clamp_ladder_step(request.methodology.max_ladder_step);
    Ok(packet)
}

/// Background enrichment for one incident. On success the sanitized packet
/// supersedes the stored fallback; on failure the fallback stands and the
/// errors are recorded on it for audit.
pub async fn attach_advisory(
    store: std::sync::Arc<MemoryStore>,
    settings: AdvisorySettings,
    incident_id: Uuid,
    request: AdvisoryRequest,
) {
    match fetch_advisory(&settings, &request).await {
        Ok(packet) => {
            tracing::info!(incident = %incident_id, "advisory packet attached");
            store
                .update_incident(incident_id, |incident| {
                    incident.advisory = Some(packet);
                })
                .await;
        }
        Err(errors) => {
            tracing::warn!(
                incident = %incident_id,
                errors = ?errors,
                "advisory rejected, deterministic fallback stands"
            );
            store
                .update_incident(incident_id, |incident| {
                    if let Some(packet) = incident.advisory.as_mut() {
                        packet.ai_errors = errors;
                    }
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn disabled_settings() -> AdvisorySettings {
        AdvisorySettings {
            url: None,
            timeout: Duration::from_secs(15),
            client: reqwest::Client::new(),
        }
    }

    #[tokio::test]
    async fn disabled_advisory_resolves_to_audit_error() {
        let m = conduct_core::methodology::Methodology::built_in();
        let session = conduct_core::session::Session::start(
            Uuid::now_v7(),
            5,
            "one_on_one".to_string(),
            vec![],
            chrono::Utc::now(),
            0,
        );
        let request = conduct_core::advisory::build_advisory_request(
            &m,
            &session,
            conduct_core::methodology::CategoryId::Disruption,
            2,
            "calls out",
            None,
            60,
        );
        let errors = fetch_advisory(&disabled_settings(), &request)
            .await
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("disabled"));
    }
}
