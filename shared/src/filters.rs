//! Pure projections over the fetched collections.
//!
//! Everything here is recomputed in `view()`; nothing mutates model state.
//! Matching is case-insensitive substring search over the fields operators
//! actually scan for, with a trimmed query and the full set for an empty one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{PatrolTeam, Report, ReportStatus, ReportType, SosAlert};
use crate::Coordinate;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[must_use]
pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn opt_contains(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|text| contains(text, needle))
}

/// Reports worth the emergency board: harassment, crime, safety.
#[must_use]
pub fn critical_reports(reports: &[Report]) -> Vec<Report> {
    reports
        .iter()
        .filter(|report| report.report_type.is_critical())
        .cloned()
        .collect()
}

fn report_matches(report: &Report, needle: &str) -> bool {
    contains(&report.title, needle)
        || contains(&report.description, needle)
        || opt_contains(report.reporter_name.as_deref(), needle)
        || report.id.to_string().contains(needle)
}

/// Critical reports, narrowed by an explicit type first and the free-text
/// query second. The critical base applies even when a type is selected, so
/// picking a non-critical type yields an empty board rather than widening it.
#[must_use]
pub fn filtered_reports(
    reports: &[Report],
    type_filter: Option<ReportType>,
    query: &str,
) -> Vec<Report> {
    let needle = normalize_query(query);
    reports
        .iter()
        .filter(|report| report.report_type.is_critical())
        .filter(|report| type_filter.map_or(true, |wanted| report.report_type == wanted))
        .filter(|report| needle.is_empty() || report_matches(report, &needle))
        .cloned()
        .collect()
}

#[must_use]
pub fn filtered_emergencies(alerts: &[SosAlert], query: &str) -> Vec<SosAlert> {
    let needle = normalize_query(query);
    if needle.is_empty() {
        return alerts.to_vec();
    }
    alerts
        .iter()
        .filter(|alert| {
            contains(&alert.emergency_type, &needle)
                || opt_contains(alert.description.as_deref(), &needle)
                || opt_contains(alert.user_name.as_deref(), &needle)
                || alert.id.to_string().contains(&needle)
                || opt_contains(alert.assigned_team.as_deref(), &needle)
        })
        .cloned()
        .collect()
}

#[must_use]
pub fn filtered_patrol_units(teams: &[PatrolTeam], query: &str) -> Vec<PatrolTeam> {
    let needle = normalize_query(query);
    if needle.is_empty() {
        return teams.to_vec();
    }
    teams
        .iter()
        .filter(|team| {
            contains(&team.team_id, &needle)
                || contains(&team.station_name, &needle)
                || contains(&team.leader_name, &needle)
                || contains(&team.vehicle_number, &needle)
        })
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Combined feed
// ---------------------------------------------------------------------------

/// Variant order doubles as rank order, so `Ord` sorts Low < Critical.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }
}

/// Type-to-priority table for incident entries.
#[must_use]
pub const fn report_priority(report_type: ReportType) -> Priority {
    match report_type {
        ReportType::Crime | ReportType::Harassment => Priority::High,
        ReportType::Safety | ReportType::Other => Priority::Medium,
        ReportType::Infrastructure => Priority::Low,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Sos,
    Incident,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub kind: FeedKind,
    pub source_id: u64,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub occurred_at: DateTime<Utc>,
    pub resolved: bool,
}

/// Merge SOS alerts and incident reports into one feed: priority rank
/// descending, most recent first within a rank. SOS entries always rank
/// critical.
#[must_use]
pub fn community_feed(alerts: &[SosAlert], reports: &[Report]) -> Vec<FeedItem> {
    let mut feed: Vec<FeedItem> = alerts
        .iter()
        .map(|alert| FeedItem {
            kind: FeedKind::Sos,
            source_id: alert.id.0,
            title: format!("SOS Emergency - {}", alert.emergency_type),
            description: alert
                .description
                .clone()
                .unwrap_or_else(|| "Emergency assistance needed".to_owned()),
            priority: Priority::Critical,
            occurred_at: alert.created_at,
            resolved: !alert.is_active,
        })
        .chain(reports.iter().map(|report| FeedItem {
            kind: FeedKind::Incident,
            source_id: report.id.0,
            title: report.title.clone(),
            description: report.description.clone(),
            priority: report_priority(report.report_type),
            occurred_at: report.created_at,
            resolved: matches!(report.status, ReportStatus::Resolved),
        }))
        .collect();

    feed.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(b.occurred_at.cmp(&a.occurred_at))
    });
    feed
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Haversine great-circle distance in meters.
#[must_use]
pub fn distance_meters(from: Coordinate, to: Coordinate) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

#[must_use]
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round())
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// Compact relative time for feed rows. Falls back to the plain date past a
/// week; a timestamp ahead of `now` reads as just-now.
#[must_use]
pub fn format_time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = now.signed_duration_since(then).num_minutes().max(0);
    let hours = minutes / 60;
    let days = hours / 24;
    if minutes < 1 {
        return "Just now".to_owned();
    }
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    if hours < 24 {
        return format!("{hours}h ago");
    }
    if days < 7 {
        return format!("{days}d ago");
    }
    then.format("%Y-%m-%d").to_string()
}
