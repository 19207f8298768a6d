//! Wire boundary to the CityShield backend.
//!
//! URL builders, request/response types mirroring the backend serializers,
//! and [`decode`], the single funnel that turns a raw `crux_http` outcome
//! into a typed payload or an [`AppError`]. Identifiers and timestamps parse
//! strictly; fields the backend is known to null out or format inconsistently
//! (coordinates, optional names) parse tolerantly.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{AppError, Coordinate, ErrorKind, OfficerId, ReportId, SosId, StationId, TeamId, VolunteerId};

/// Placeholder the backend sends instead of null when no team is assigned.
const NO_TEAM_SENTINEL: &str = "No team assigned";

// ---------------------------------------------------------------------------
// Base URL
// ---------------------------------------------------------------------------

/// Origin plus the `/api` prefix, held without a trailing slash so paths can
/// be appended verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiBase(String);

impl ApiBase {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim().trim_end_matches('/');
        let parsed = url::Url::parse(trimmed).map_err(|e| {
            AppError::new(
                ErrorKind::InvalidInput,
                format!("invalid API base `{trimmed}`: {e}"),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::new(
                ErrorKind::InvalidInput,
                format!("unsupported API scheme `{}`", parsed.scheme()),
            ));
        }
        Ok(Self(trimmed.to_owned()))
    }

    fn join(&self, path: &str) -> String {
        debug_assert!(path.starts_with('/'));
        format!("{}{path}", self.0)
    }
}

impl Default for ApiBase {
    fn default() -> Self {
        Self(crate::DEFAULT_API_BASE.to_owned())
    }
}

impl fmt::Display for ApiBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Wire enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Crime,
    Harassment,
    Safety,
    Infrastructure,
    Other,
}

impl ReportType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crime => "crime",
            Self::Harassment => "harassment",
            Self::Safety => "safety",
            Self::Infrastructure => "infrastructure",
            Self::Other => "other",
        }
    }

    /// Categories surfaced on the emergency board.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::Crime | Self::Harassment | Self::Safety)
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Investigating,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::Investigating,
        Self::Resolved,
        Self::Dismissed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Investigating => "investigating",
            Self::Resolved => "resolved",
            Self::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// URL builders
// ---------------------------------------------------------------------------

/// Location constraint appended to list queries once the operator has a fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationScope {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: u8,
}

fn scope_query(scope: &LocationScope) -> String {
    format!(
        "latitude={}&longitude={}&radius={}",
        scope.latitude, scope.longitude, scope.radius_km
    )
}

/// The `type` parameter is always present; `all` means no narrowing.
#[must_use]
pub fn reports_url(
    base: &ApiBase,
    filter: Option<ReportType>,
    scope: Option<&LocationScope>,
) -> String {
    let mut url = format!(
        "{}?type={}",
        base.join("/police/reports/"),
        filter.map_or("all", ReportType::as_str)
    );
    if let Some(scope) = scope {
        url.push('&');
        url.push_str(&scope_query(scope));
    }
    url
}

#[must_use]
pub fn report_status_url(base: &ApiBase, report: ReportId) -> String {
    base.join(&format!("/police/reports/{report}/status/"))
}

#[must_use]
pub fn sos_alerts_url(base: &ApiBase, scope: Option<&LocationScope>) -> String {
    let mut url = base.join("/police/sos-alerts/");
    if let Some(scope) = scope {
        url.push('?');
        url.push_str(&scope_query(scope));
    }
    url
}

#[must_use]
pub fn assign_team_url(base: &ApiBase, alert: SosId) -> String {
    base.join(&format!("/police/sos-alerts/{alert}/assign-team/"))
}

#[must_use]
pub fn resolve_sos_url(base: &ApiBase, alert: SosId) -> String {
    base.join(&format!("/sos/resolve/{alert}/"))
}

#[must_use]
pub fn video_feeds_url(base: &ApiBase, alert: SosId) -> String {
    base.join(&format!("/sos/emergency/{alert}/video-feeds/"))
}

#[must_use]
pub fn volunteers_url(base: &ApiBase) -> String {
    base.join("/police/volunteers/")
}

/// GET lists, POST creates.
#[must_use]
pub fn patrol_teams_url(base: &ApiBase) -> String {
    base.join("/police/patrol-teams/")
}

/// PATCH updates, DELETE removes.
#[must_use]
pub fn patrol_team_url(base: &ApiBase, team: TeamId) -> String {
    base.join(&format!("/police/patrol-teams/{team}/"))
}

#[must_use]
pub fn toggle_team_status_url(base: &ApiBase, team: TeamId) -> String {
    base.join(&format!("/police/patrol-teams/{team}/toggle-status/"))
}

#[must_use]
pub fn assign_member_url(base: &ApiBase, team: TeamId) -> String {
    base.join(&format!("/police/patrol-teams/{team}/assign-member/"))
}

#[must_use]
pub fn remove_member_url(base: &ApiBase, team: TeamId) -> String {
    base.join(&format!("/police/patrol-teams/{team}/remove-member/"))
}

#[must_use]
pub fn officers_url(base: &ApiBase) -> String {
    base.join("/police/police-officers/")
}

#[must_use]
pub fn register_officer_url(base: &ApiBase) -> String {
    base.join("/users/register-police/")
}

#[must_use]
pub fn dashboard_stats_url(base: &ApiBase, scope: Option<&LocationScope>) -> String {
    let mut url = base.join("/police/dashboard-stats/");
    if let Some(scope) = scope {
        url.push('?');
        url.push_str(&scope_query(scope));
    }
    url
}

#[must_use]
pub fn official_alerts_url(base: &ApiBase) -> String {
    base.join("/police/official-alerts/")
}

#[must_use]
pub fn nearby_police_url(base: &ApiBase, position: Coordinate) -> String {
    format!(
        "{}?latitude={}&longitude={}",
        base.join("/safety/nearby-police/"),
        position.latitude,
        position.longitude
    )
}

/// Every dashboard call carries the stored token.
pub fn bearer<Ev: 'static>(
    builder: crux_http::RequestBuilder<Ev>,
    token: &str,
) -> crux_http::RequestBuilder<Ev> {
    builder.header("Authorization", format!("Bearer {token}"))
}

// ---------------------------------------------------------------------------
// Incoming payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub report_type: ReportType,
    pub status: ReportStatus,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default, deserialize_with = "de::coord_opt")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "de::coord_opt")]
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reporter_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosAlert {
    pub id: SosId,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "de::coord_opt")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "de::coord_opt")]
    pub longitude: Option<f64>,
    pub emergency_type: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub is_streaming: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::assigned_team")]
    pub assigned_team: Option<String>,
    #[serde(default)]
    pub volunteers_responded: u32,
    /// Pre-rendered by the backend ("5 min ago", "Resolved").
    #[serde(default)]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volunteer {
    pub id: VolunteerId,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_phone: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub current_location: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub last_location_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: OfficerId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatrolTeam {
    pub id: TeamId,
    /// Human callsign ("Alpha-1"), distinct from the numeric key.
    pub team_id: String,
    pub station: StationId,
    #[serde(default)]
    pub station_name: String,
    pub team_leader: OfficerId,
    #[serde(default)]
    pub leader_name: String,
    #[serde(default)]
    pub leader_email: String,
    #[serde(default)]
    pub members: Vec<OfficerId>,
    #[serde(default)]
    pub members_list: Vec<TeamMember>,
    pub members_count: u32,
    #[serde(default)]
    pub actual_member_count: u32,
    #[serde(default)]
    pub vehicle_number: String,
    pub is_active: bool,
    #[serde(default, deserialize_with = "de::coord_opt")]
    pub current_latitude: Option<f64>,
    #[serde(default, deserialize_with = "de::coord_opt")]
    pub current_longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Officer {
    pub id: OfficerId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub police_station: Option<StationId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoliceStation {
    pub id: StationId,
    pub name: String,
    #[serde(deserialize_with = "de::coord")]
    pub latitude: f64,
    #[serde(deserialize_with = "de::coord")]
    pub longitude: f64,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReportTypeCounts {
    pub total: u32,
    pub crime: u32,
    pub safety: u32,
    pub harassment: u32,
    pub infrastructure: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReportsResponse {
    pub results: Vec<Report>,
    #[serde(default)]
    pub total_count: u32,
    #[serde(default)]
    pub location_filtered: bool,
    #[serde(default)]
    pub radius_km: Option<f64>,
    #[serde(default)]
    pub filters: Option<ReportTypeCounts>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SosAlertsResponse {
    pub results: Vec<SosAlert>,
    #[serde(default)]
    pub total_count: u32,
    #[serde(default)]
    pub location_filtered: bool,
    #[serde(default)]
    pub radius_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VolunteersResponse {
    pub results: Vec<Volunteer>,
    #[serde(default)]
    pub total_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TeamsResponse {
    pub results: Vec<PatrolTeam>,
    #[serde(default)]
    pub total_count: u32,
    #[serde(default)]
    pub station_filtered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OfficersResponse {
    pub officers: Vec<Officer>,
    #[serde(default)]
    pub total_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StationsResponse {
    pub police_stations: Vec<PoliceStation>,
}

/// Flat aggregate for the header tiles. Everything defaults so a partial
/// payload still renders as zeros rather than failing the whole refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DashboardStats {
    pub total_reports: u32,
    pub active_sos_alerts: u32,
    pub active_volunteers: u32,
    pub response_rate: f64,
    pub reports_this_week: u32,
    pub resolved_this_week: u32,
    pub avg_response_time: f64,
    pub patrol_teams_active: u32,
    pub location_filtered: bool,
    pub filter_radius_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmergencyInfo {
    pub emergency_type: String,
    pub user_name: String,
    #[serde(deserialize_with = "de::coord_opt")]
    pub latitude: Option<f64>,
    #[serde(deserialize_with = "de::coord_opt")]
    pub longitude: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoChunk {
    pub id: u64,
    /// Null while the upload for this slot is still in flight.
    #[serde(default)]
    pub video_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub chunk_sequence: u32,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_size_formatted: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VideoFeedsResponse {
    pub emergency_id: Option<SosId>,
    pub emergency_info: EmergencyInfo,
    pub video_feeds: Vec<VideoChunk>,
    pub total_chunks: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

impl VideoFeedsResponse {
    /// The backend lists chunks newest-first; playback wants ascending
    /// sequence order.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.video_feeds.sort_by_key(|chunk| chunk.chunk_sequence);
        self
    }
}

/// Small `{message, ...}` object mutation endpoints answer with. Deletes may
/// answer 204 with no body at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CommandResponse {
    pub message: Option<String>,
    pub member_count: Option<u32>,
    pub is_active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Outgoing payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusUpdateRequest {
    pub status: ReportStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssignTeamRequest {
    pub team_id: TeamId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemberRequest {
    pub user_id: OfficerId,
}

/// Patrol team form, posted verbatim on create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamForm {
    pub team_id: String,
    pub station: StationId,
    pub team_leader: OfficerId,
    pub members_count: u32,
    pub vehicle_number: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastRequest {
    pub title: String,
    pub message: String,
    pub alert_type: &'static str,
}

impl BroadcastRequest {
    #[must_use]
    pub fn emergency(title: String, message: String) -> Self {
        Self {
            title,
            message,
            alert_type: "emergency",
        }
    }
}

/// Officer sign-up form as the operator fills it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    #[serde(default)]
    pub police_station: Option<StationId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterOfficerRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub role: &'static str,
    pub police_station: Option<StationId>,
}

impl RegisterOfficerRequest {
    /// The backend keys accounts on `username`; the dashboard reuses the
    /// email for it.
    #[must_use]
    pub fn from_form(form: OfficerForm) -> Self {
        Self {
            name: form.name,
            username: form.email.clone(),
            email: form.email,
            password: form.password,
            phone: form.phone,
            role: "police",
            police_station: form.police_station,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// What every HTTP callback carries back into the update loop.
pub type HttpOutcome = crux_http::Result<crux_http::Response<String>>;

/// Decode a 2xx response body into `T`. `crux_http` has already turned
/// non-2xx statuses and transport failures into `Err` before this runs.
pub fn decode<T: DeserializeOwned>(outcome: HttpOutcome) -> Result<T, AppError> {
    let mut response = outcome.map_err(transport_error)?;
    let body = response.take_body().unwrap_or_default();
    serde_json::from_str(&body).map_err(|e| {
        AppError::new(
            ErrorKind::Deserialization,
            format!("malformed response payload: {e}"),
        )
    })
}

/// Like [`decode`] but tolerates the empty body of a 204.
pub fn decode_command(outcome: HttpOutcome) -> Result<CommandResponse, AppError> {
    let mut response = outcome.map_err(transport_error)?;
    let body = response.take_body().unwrap_or_default();
    if body.trim().is_empty() {
        return Ok(CommandResponse::default());
    }
    serde_json::from_str(&body).map_err(|e| {
        AppError::new(
            ErrorKind::Deserialization,
            format!("malformed response payload: {e}"),
        )
    })
}

/// [`decode`] plus chunk reordering.
pub fn decode_video_feeds(outcome: HttpOutcome) -> Result<VideoFeedsResponse, AppError> {
    decode::<VideoFeedsResponse>(outcome).map(VideoFeedsResponse::normalized)
}

fn transport_error(error: crux_http::Error) -> AppError {
    match error {
        crux_http::Error::Http(failure) => {
            let status = u16::from(failure.code);
            let server_message = failure.body.as_deref().and_then(extract_server_message);
            AppError::from_http_status(status, failure.message, server_message)
        }
        crux_http::Error::Timeout => AppError::new(ErrorKind::Timeout, "request timed out"),
        crux_http::Error::Json(detail) => AppError::new(ErrorKind::Deserialization, detail),
        crux_http::Error::Url(detail) => AppError::new(ErrorKind::InvalidInput, detail),
        crux_http::Error::Io(detail) => AppError::new(ErrorKind::Network, detail),
    }
}

/// Error payloads are `{"error": ...}` from the dashboard endpoints,
/// `{"message": ...}` from a few older ones, `{"detail": ...}` from the
/// framework itself on auth failures.
fn extract_server_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["error", "message", "detail"].iter().find_map(|key| {
        value
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
    })
}

mod de {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        Num(f64),
        Text(String),
    }

    /// Coordinates arrive as numbers, strings, or nulls depending on which
    /// serializer the backend picked for the row.
    pub fn coord_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Flexible>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Flexible::Num(value)) => Ok(Some(value)),
            Some(Flexible::Text(raw)) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }

    pub fn coord<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Flexible::deserialize(deserializer)? {
            Flexible::Num(value) => Ok(value),
            Flexible::Text(raw) => raw.trim().parse().map_err(serde::de::Error::custom),
        }
    }

    pub fn assigned_team<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|name| {
            !name.trim().is_empty() && name.as_str() != super::NO_TEAM_SENTINEL
        }))
    }
}
