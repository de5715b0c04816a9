//! Roster synchronization against the LMS REST API.
//!
//! Pulls the student enrollments of a course and upserts them into the
//! local roster store. Sync is best-effort by design: token issuance calls
//! it before showing a QR code but never fails because the LMS is down.

use anyhow::{Context, anyhow};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use util::config;

use db::models::user::{Model as User, Role};

#[derive(Debug, Deserialize)]
struct Enrollment {
    user: Option<EnrollmentUser>,
}

#[derive(Debug, Deserialize)]
struct EnrollmentUser {
    id: Option<i64>,
    sis_user_id: Option<String>,
    name: Option<String>,
    email: Option<String>,
    login_id: Option<String>,
}

/// Fetches student enrollments for `lms_course_id` and upserts each one.
///
/// Returns the number of roster entries written. When no LMS API token is
/// configured the sync is skipped and reports zero.
pub async fn sync_course_roster(
    db: &DatabaseConnection,
    lms_course_id: &str,
) -> anyhow::Result<usize> {
    let base_url = config::lms_base_url();
    let api_token = config::lms_api_token();
    if base_url.is_empty() || api_token.is_empty() {
        tracing::info!(lms_course_id, "no LMS API token configured, skipping roster sync");
        return Ok(0);
    }

    let client = reqwest::Client::new();
    let sis_prefix = config::sis_id_prefix();
    let sis_prefix = (!sis_prefix.is_empty()).then_some(sis_prefix);
    let mut synced = 0usize;

    // The enrollments endpoint is paginated; a course roster rarely needs
    // more than a handful of pages.
    for page in 1..=10 {
        let url = format!(
            "{}/api/v1/courses/{}/enrollments",
            base_url.trim_end_matches('/'),
            lms_course_id
        );
        let enrollments: Vec<Enrollment> = client
            .get(&url)
            .bearer_auth(&api_token)
            .query(&[
                ("type[]", "StudentEnrollment"),
                ("per_page", "100"),
                ("page", &page.to_string()),
            ])
            .send()
            .await
            .context("LMS enrollments request failed")?
            .error_for_status()
            .map_err(|e| anyhow!("LMS enrollments request rejected: {e}"))?
            .json()
            .await
            .context("LMS enrollments response was not valid JSON")?;

        if enrollments.is_empty() {
            break;
        }

        for enrollment in enrollments {
            let Some(lms_user) = enrollment.user else {
                continue;
            };
            let raw_id = lms_user
                .sis_user_id
                .clone()
                .or_else(|| lms_user.id.map(|i| i.to_string()));
            let Some(raw_id) = raw_id.filter(|s| !s.trim().is_empty()) else {
                continue;
            };

            let external_id = User::normalize_external_id(&raw_id, sis_prefix.as_deref());
            let name = lms_user.name.unwrap_or_default();
            let email = lms_user.email.or(lms_user.login_id).unwrap_or_default();

            User::upsert(db, &external_id, &name, &email, Role::Student)
                .await
                .context("roster upsert failed")?;
            synced += 1;
        }
    }

    tracing::info!(lms_course_id, synced, "roster sync complete");
    Ok(synced)
}
