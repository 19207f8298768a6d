//! CityShield dashboard core.
//!
//! Headless state machine behind the police operations dashboard. Shells
//! (web, mobile, desktop) render the [`ViewModel`], forward user intent as
//! [`Event`]s, and execute the effects the core requests: HTTP against the
//! CityShield backend, one-shot timers, geolocation, key-value session
//! storage, and re-render signals. All decisions live here; shells stay
//! dumb.
//!
//! The dashboard is a polling application. Every 30 seconds the core fans
//! out one request per collection (incident reports, SOS alerts, volunteers,
//! patrol teams, aggregate stats) and settles each answer independently, so
//! one failing endpoint degrades one panel instead of blanking the screen.
//! Mutations are fire-and-forget commands with a toast lifecycle; nothing is
//! applied optimistically.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api;
pub mod capabilities;
pub mod filters;
pub mod keymap;
pub mod session;
pub mod video;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::api::{
    ApiBase, DashboardStats, HttpOutcome, LocationScope, Officer, OfficerForm, OfficersResponse,
    PatrolTeam, PoliceStation, Report, ReportStatus, ReportType, ReportsResponse, SosAlert,
    SosAlertsResponse, StationsResponse, TeamForm, TeamsResponse, Volunteer, VolunteersResponse,
};
use crate::capabilities::{KeyValueError, LocationOutput};
use crate::filters::FeedItem;
use crate::session::{Session, SessionLoad};
use crate::video::{PlayerPhase, PlayerState};

pub use crate::app::App;
pub use crate::capabilities::{Capabilities, Effect};

/// Cadence of the dashboard collection fan-out.
pub const DASHBOARD_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Cadence of the chunk-list poll while the video player is open.
pub const VIDEO_FEED_REFRESH_INTERVAL: Duration = Duration::from_secs(20);

/// Per-refresh deadline. Collections that have not answered by then settle
/// as timed out; late answers are discarded by generation.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Stored sessions older than this are purged instead of restored.
pub const SESSION_MAX_AGE_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Radius choices offered for location filtering, in kilometers.
pub const RADIUS_OPTIONS_KM: [u8; 4] = [2, 5, 10, 20];

pub const DEFAULT_RADIUS_KM: u8 = 5;

/// Backend origin used when the shell does not hand one over at startup.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";

// ---------------------------------------------------------------------------
// Identifiers and time
// ---------------------------------------------------------------------------

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

typed_id!(
    /// Incident report row.
    ReportId
);
typed_id!(
    /// SOS emergency alert row.
    SosId
);
typed_id!(
    /// Patrol team row. Distinct from the human callsign string the team
    /// also carries.
    TeamId
);
typed_id!(
    /// Police officer account.
    OfficerId
);
typed_id!(
    /// Police station row.
    StationId
);
typed_id!(
    /// Volunteer responder account.
    VolunteerId
);

/// Unix epoch milliseconds. The core has no clock; every value of this type
/// originated in a shell callback.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnixTimeMs(pub u64);

impl fmt::Display for UnixTimeMs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A WGS84 position that passed range validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// `None` for non-finite or out-of-range values.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
        })
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Worth retrying; the next poll cycle may succeed.
    Transient,
    /// Retrying the same input will fail the same way.
    Permanent,
    /// The session or payload contract is broken; stop and resurface.
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Socket-level failure before any status line arrived.
    Network,
    Timeout,
    /// Non-2xx answer that was not an auth rejection.
    HttpStatus(u16),
    /// 2xx answer whose body did not match the expected shape.
    Deserialization,
    /// 401/403 from the backend, or a stored session past its age limit.
    SessionExpired,
    LocationUnavailable,
    InvalidInput,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::HttpStatus(_) => "HTTP_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::LocationUnavailable => "LOCATION_ERROR",
            Self::InvalidInput => "VALIDATION_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::LocationUnavailable => ErrorSeverity::Transient,
            Self::HttpStatus(status) => {
                if status >= 500 {
                    ErrorSeverity::Transient
                } else {
                    ErrorSeverity::Permanent
                }
            }
            Self::InvalidInput => ErrorSeverity::Permanent,
            Self::Deserialization | Self::SessionExpired => ErrorSeverity::Fatal,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        match self {
            Self::Network | Self::Timeout => true,
            Self::HttpStatus(status) => status >= 500,
            Self::Deserialization
            | Self::SessionExpired
            | Self::LocationUnavailable
            | Self::InvalidInput => false,
        }
    }
}

/// One failure, carried through model state and toasts.
///
/// `message` is the diagnostic line for logs. `server_message` is the
/// human-readable explanation the backend put in its error body, when it
/// sent one; user-facing surfaces prefer it over any canned text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub server_message: Option<String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            server_message: None,
        }
    }

    /// Classify a non-2xx answer. 401 and 403 both read as an expired
    /// session: the dashboard has no privilege tiers below "logged in".
    #[must_use]
    pub fn from_http_status(
        status: u16,
        status_line: String,
        server_message: Option<String>,
    ) -> Self {
        let kind = match status {
            401 | 403 => ErrorKind::SessionExpired,
            _ => ErrorKind::HttpStatus(status),
        };
        Self {
            kind,
            severity: kind.default_severity(),
            message: status_line,
            server_message,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        if let Some(server_message) = &self.server_message {
            return server_message.clone();
        }
        match self.kind {
            ErrorKind::Network => "Network error".into(),
            ErrorKind::Timeout => "Request timed out".into(),
            ErrorKind::HttpStatus(status) => format!("Server error ({status})"),
            ErrorKind::Deserialization => "Unexpected server response".into(),
            ErrorKind::SessionExpired => "Session expired. Please log in again.".into(),
            ErrorKind::LocationUnavailable => "Unable to access location".into(),
            ErrorKind::InvalidInput => self.message.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Toasts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToastId(pub Uuid);

impl ToastId {
    #[must_use]
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ToastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToastKind {
    /// Sticky until the command that opened it settles.
    Loading,
    #[default]
    Info,
    Success,
    Error,
}

impl ToastKind {
    /// How long the shell should keep the toast up. `None` means until
    /// settled or dismissed.
    #[must_use]
    pub const fn default_duration_ms(self) -> Option<u64> {
        match self {
            Self::Loading => None,
            Self::Info => Some(3000),
            Self::Success => Some(2000),
            Self::Error => Some(4000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub id: ToastId,
    pub kind: ToastKind,
    pub message: String,
    pub created_at: UnixTimeMs,
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// One polled collection and its freshness. A failed refresh keeps the last
/// good data and marks it stale rather than emptying the panel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Section<T> {
    pub data: T,
    pub synced_at: Option<UnixTimeMs>,
    /// First moment a refresh failed since the last good one.
    pub stale_since: Option<UnixTimeMs>,
    pub last_error: Option<AppError>,
}

impl<T> Section<T> {
    pub fn settle_ok(&mut self, data: T, now: UnixTimeMs) {
        self.data = data;
        self.synced_at = Some(now);
        self.stale_since = None;
        self.last_error = None;
    }

    pub fn settle_err(&mut self, error: AppError, now: UnixTimeMs) {
        if self.stale_since.is_none() {
            self.stale_since = Some(now);
        }
        self.last_error = Some(error);
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.stale_since.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DashboardSection {
    #[default]
    Emergency,
    Incidents,
    Map,
    Teams,
    AllReports,
}

impl DashboardSection {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Incidents => "incidents",
            Self::Map => "map",
            Self::Teams => "teams",
            Self::AllReports => "all-reports",
        }
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Which of the three storage slots a read or purge answer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionSlot {
    User,
    Token,
    LoginTimestamp,
}

impl SessionSlot {
    pub const ALL: [Self; 3] = [Self::User, Self::Token, Self::LoginTimestamp];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::User => session::KEY_USER,
            Self::Token => session::KEY_TOKEN,
            Self::LoginTimestamp => session::KEY_LOGIN_TIMESTAMP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Waiting for the three storage reads issued at startup.
    Booting { load: SessionLoad, pending: u8 },
    LoggedIn(Session),
    /// `error` carries the reason the login screen should surface, if any.
    LoggedOut { error: Option<AppError> },
}

impl Default for AuthState {
    fn default() -> Self {
        Self::Booting {
            load: SessionLoad::default(),
            pending: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Location filter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationState {
    pub enabled: bool,
    pub fix: Option<Coordinate>,
    pub radius_km: u8,
    /// A geolocation request is out with the shell.
    pub requesting: bool,
}

impl Default for LocationState {
    fn default() -> Self {
        Self {
            enabled: false,
            fix: None,
            radius_km: DEFAULT_RADIUS_KM,
            requesting: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Refresh bookkeeping
// ---------------------------------------------------------------------------

/// Which of the five fan-out requests have not settled yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct PendingFetches {
    pub reports: bool,
    pub sos_alerts: bool,
    pub volunteers: bool,
    pub teams: bool,
    pub stats: bool,
}

impl PendingFetches {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            reports: true,
            sos_alerts: true,
            volunteers: true,
            teams: true,
            stats: true,
        }
    }

    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !(self.reports || self.sos_alerts || self.volunteers || self.teams || self.stats)
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        usize::from(self.reports)
            + usize::from(self.sos_alerts)
            + usize::from(self.volunteers)
            + usize::from(self.teams)
            + usize::from(self.stats)
    }
}

/// One refresh cycle. Completions carrying any other generation are noise
/// from a superseded cycle and are dropped on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InflightRefresh {
    pub generation: u64,
    pub pending: PendingFetches,
    pub started_at: UnixTimeMs,
    /// At most one "Sync failed" toast per cycle, however many collections
    /// fail.
    pub failure_toasted: bool,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Every mutation the dashboard can issue. Carries what the toast copy
/// needs and nothing else; request payloads travel in the event that
/// triggered the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    OfficerRegister,
    TeamCreate,
    TeamUpdate,
    TeamDelete,
    TeamToggle,
    MemberAssign,
    MemberRemove,
    TeamAssign { label: String },
    SosResolve,
    StatusUpdate { status: ReportStatus },
    Broadcast,
}

impl CommandKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OfficerRegister => "officer_register",
            Self::TeamCreate => "team_create",
            Self::TeamUpdate => "team_update",
            Self::TeamDelete => "team_delete",
            Self::TeamToggle => "team_toggle",
            Self::MemberAssign => "member_assign",
            Self::MemberRemove => "member_remove",
            Self::TeamAssign { .. } => "team_assign",
            Self::SosResolve => "sos_resolve",
            Self::StatusUpdate { .. } => "status_update",
            Self::Broadcast => "broadcast",
        }
    }

    #[must_use]
    pub fn loading_message(&self) -> String {
        match self {
            Self::OfficerRegister => "Adding police officer...".into(),
            Self::TeamCreate => "Creating patrol team...".into(),
            Self::TeamUpdate => "Updating patrol team...".into(),
            Self::TeamDelete => "Deleting patrol team...".into(),
            Self::TeamToggle => "Updating team status...".into(),
            Self::MemberAssign => "Assigning team member...".into(),
            Self::MemberRemove => "Removing team member...".into(),
            Self::TeamAssign { label } => format!("Assigning {label}..."),
            Self::SosResolve => "Resolving emergency...".into(),
            Self::StatusUpdate { status } => format!("Updating status to {status}..."),
            Self::Broadcast => "Broadcasting emergency alert...".into(),
        }
    }

    #[must_use]
    pub fn success_message(&self) -> String {
        match self {
            Self::OfficerRegister => "Police officer added successfully".into(),
            Self::TeamCreate => "Patrol team created successfully".into(),
            Self::TeamUpdate => "Patrol team updated successfully".into(),
            Self::TeamDelete => "Patrol team deleted successfully".into(),
            Self::TeamToggle => "Team status updated".into(),
            Self::MemberAssign => "Member assigned successfully".into(),
            Self::MemberRemove => "Member removed successfully".into(),
            Self::TeamAssign { label } => format!("{label} assigned successfully"),
            Self::SosResolve => "Emergency resolved successfully".into(),
            Self::StatusUpdate { status } => format!("Status updated to {status}"),
            Self::Broadcast => "Emergency alert broadcasted to all units".into(),
        }
    }

    /// Fallback copy when the backend rejected the command without a usable
    /// message in the body.
    #[must_use]
    pub const fn rejected_fallback(&self) -> &'static str {
        match self {
            Self::OfficerRegister => "Failed to add officer",
            Self::TeamCreate => "Failed to create team",
            Self::TeamUpdate => "Failed to update team",
            Self::TeamDelete => "Failed to delete team",
            Self::TeamToggle => "Failed to update status",
            Self::MemberAssign => "Failed to assign member",
            Self::MemberRemove => "Failed to remove member",
            Self::TeamAssign { .. } => "Assignment failed",
            Self::SosResolve => "Failed to resolve emergency",
            Self::StatusUpdate { .. } => "Update failed",
            Self::Broadcast => "Broadcast failed",
        }
    }

    /// Fallback copy when the request never produced a status line at all.
    #[must_use]
    pub const fn network_fallback(&self) -> &'static str {
        match self {
            Self::TeamAssign { .. } => "Network error during assignment",
            Self::StatusUpdate { .. } => "Network error during update",
            Self::Broadcast => "Network error during broadcast",
            Self::SosResolve => "Failed to resolve emergency",
            _ => "Network error",
        }
    }

    /// Toast copy for a failed command: the backend's own words when it
    /// sent any, otherwise a fallback picked by how far the request got.
    #[must_use]
    pub fn failure_message(&self, error: &AppError) -> String {
        if let Some(server_message) = &error.server_message {
            return server_message.clone();
        }
        match error.kind {
            ErrorKind::Network | ErrorKind::Timeout => self.network_fallback().to_owned(),
            _ => self.rejected_fallback().to_owned(),
        }
    }

    /// Whether a successful settle re-runs the dashboard fan-out. Broadcast
    /// touches no polled collection, everything else does.
    #[must_use]
    pub const fn refreshes_on_success(&self) -> bool {
        !matches!(self, Self::Broadcast)
    }
}

/// A mutation parked behind its confirmation dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCommand {
    TeamDelete { team: TeamId },
    MemberRemove { team: TeamId, officer: OfficerId },
    SosResolve { alert: SosId },
    Broadcast { title: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPending {
    pub message: String,
    pub command: PendingCommand,
}

/// The two-step broadcast input dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPending {
    BroadcastTitle,
    BroadcastMessage { title: String },
}

impl PromptPending {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::BroadcastTitle => "EMERGENCY BROADCAST\n\nAlert Title:",
            Self::BroadcastMessage { .. } => "Alert Message:",
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle
    Started {
        now_ms: u64,
        api_base: Option<String>,
    },
    SessionSlotLoaded {
        slot: SessionSlot,
        result: Result<Option<Vec<u8>>, KeyValueError>,
    },
    SessionKeyPurged {
        slot: SessionSlot,
        result: Result<Option<Vec<u8>>, KeyValueError>,
    },
    LogoutRequested,

    // Polling
    RefreshRequested,
    PollTicked {
        epoch: u64,
        now_ms: u64,
    },
    RefreshDeadlinePassed {
        generation: u64,
        now_ms: u64,
    },
    #[serde(skip)]
    ReportsFetched {
        generation: u64,
        result: Box<HttpOutcome>,
    },
    #[serde(skip)]
    SosAlertsFetched {
        generation: u64,
        result: Box<HttpOutcome>,
    },
    #[serde(skip)]
    VolunteersFetched {
        generation: u64,
        result: Box<HttpOutcome>,
    },
    #[serde(skip)]
    TeamsFetched {
        generation: u64,
        result: Box<HttpOutcome>,
    },
    #[serde(skip)]
    StatsFetched {
        generation: u64,
        result: Box<HttpOutcome>,
    },
    #[serde(skip)]
    OfficersFetched {
        generation: u64,
        result: Box<HttpOutcome>,
    },
    #[serde(skip)]
    StationsFetched {
        generation: u64,
        result: Box<HttpOutcome>,
    },

    // Navigation and filters
    SectionSelected {
        section: DashboardSection,
    },
    QueryChanged {
        query: String,
    },
    TypeFilterChanged {
        report_type: Option<ReportType>,
    },
    RadiusSelected {
        radius_km: u8,
    },
    LocationToggleRequested,
    LocationFixReceived {
        output: LocationOutput,
    },
    OverlaysDismissed,

    // Commands
    StatusUpdateRequested {
        report: ReportId,
        status: ReportStatus,
    },
    TeamAssignRequested {
        alert: SosId,
        team: Option<TeamId>,
    },
    SosResolveRequested {
        alert: SosId,
    },
    BroadcastRequested,
    PromptSubmitted {
        input: String,
    },
    PromptCancelled,
    ConfirmAccepted,
    ConfirmDismissed,
    TeamCreateRequested(Box<TeamForm>),
    TeamUpdateRequested {
        team: TeamId,
        form: Box<TeamForm>,
    },
    TeamDeleteRequested {
        team: TeamId,
    },
    TeamToggleRequested {
        team: TeamId,
    },
    MemberAssignRequested {
        team: TeamId,
        officer: OfficerId,
    },
    MemberRemoveRequested {
        team: TeamId,
        officer: OfficerId,
    },
    OfficerRegisterRequested(Box<OfficerForm>),
    #[serde(skip)]
    CommandCompleted {
        command: CommandKind,
        toast: ToastId,
        result: Box<HttpOutcome>,
    },

    // Video player
    PlayerOpened {
        alert: SosId,
    },
    PlayerClosed,
    PlayerRetryRequested,
    PlayerPollTicked {
        generation: u64,
        now_ms: u64,
    },
    #[serde(skip)]
    VideoFeedsFetched {
        generation: u64,
        result: Box<HttpOutcome>,
    },
    PlaybackToggled,
    NextChunkRequested,
    PrevChunkRequested,
    ChunkSelected {
        index: usize,
    },
    FullscreenToggled,
    SidebarToggled,
    PlaybackEnded,

    // Toasts
    ToastDismissed {
        id: ToastId,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::SessionSlotLoaded { .. } => "session_slot_loaded",
            Self::SessionKeyPurged { .. } => "session_key_purged",
            Self::LogoutRequested => "logout_requested",
            Self::RefreshRequested => "refresh_requested",
            Self::PollTicked { .. } => "poll_ticked",
            Self::RefreshDeadlinePassed { .. } => "refresh_deadline_passed",
            Self::ReportsFetched { .. } => "reports_fetched",
            Self::SosAlertsFetched { .. } => "sos_alerts_fetched",
            Self::VolunteersFetched { .. } => "volunteers_fetched",
            Self::TeamsFetched { .. } => "teams_fetched",
            Self::StatsFetched { .. } => "stats_fetched",
            Self::OfficersFetched { .. } => "officers_fetched",
            Self::StationsFetched { .. } => "stations_fetched",
            Self::SectionSelected { .. } => "section_selected",
            Self::QueryChanged { .. } => "query_changed",
            Self::TypeFilterChanged { .. } => "type_filter_changed",
            Self::RadiusSelected { .. } => "radius_selected",
            Self::LocationToggleRequested => "location_toggle_requested",
            Self::LocationFixReceived { .. } => "location_fix_received",
            Self::OverlaysDismissed => "overlays_dismissed",
            Self::StatusUpdateRequested { .. } => "status_update_requested",
            Self::TeamAssignRequested { .. } => "team_assign_requested",
            Self::SosResolveRequested { .. } => "sos_resolve_requested",
            Self::BroadcastRequested => "broadcast_requested",
            Self::PromptSubmitted { .. } => "prompt_submitted",
            Self::PromptCancelled => "prompt_cancelled",
            Self::ConfirmAccepted => "confirm_accepted",
            Self::ConfirmDismissed => "confirm_dismissed",
            Self::TeamCreateRequested(_) => "team_create_requested",
            Self::TeamUpdateRequested { .. } => "team_update_requested",
            Self::TeamDeleteRequested { .. } => "team_delete_requested",
            Self::TeamToggleRequested { .. } => "team_toggle_requested",
            Self::MemberAssignRequested { .. } => "member_assign_requested",
            Self::MemberRemoveRequested { .. } => "member_remove_requested",
            Self::OfficerRegisterRequested(_) => "officer_register_requested",
            Self::CommandCompleted { .. } => "command_completed",
            Self::PlayerOpened { .. } => "player_opened",
            Self::PlayerClosed => "player_closed",
            Self::PlayerRetryRequested => "player_retry_requested",
            Self::PlayerPollTicked { .. } => "player_poll_ticked",
            Self::VideoFeedsFetched { .. } => "video_feeds_fetched",
            Self::PlaybackToggled => "playback_toggled",
            Self::NextChunkRequested => "next_chunk_requested",
            Self::PrevChunkRequested => "prev_chunk_requested",
            Self::ChunkSelected { .. } => "chunk_selected",
            Self::FullscreenToggled => "fullscreen_toggled",
            Self::SidebarToggled => "sidebar_toggled",
            Self::PlaybackEnded => "playback_ended",
            Self::ToastDismissed { .. } => "toast_dismissed",
        }
    }

    /// True for events a person caused directly, as opposed to timer fire,
    /// effect completion, or media machinery.
    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        !matches!(
            self,
            Self::Started { .. }
                | Self::SessionSlotLoaded { .. }
                | Self::SessionKeyPurged { .. }
                | Self::PollTicked { .. }
                | Self::RefreshDeadlinePassed { .. }
                | Self::ReportsFetched { .. }
                | Self::SosAlertsFetched { .. }
                | Self::VolunteersFetched { .. }
                | Self::TeamsFetched { .. }
                | Self::StatsFetched { .. }
                | Self::OfficersFetched { .. }
                | Self::StationsFetched { .. }
                | Self::LocationFixReceived { .. }
                | Self::CommandCompleted { .. }
                | Self::PlayerPollTicked { .. }
                | Self::VideoFeedsFetched { .. }
                | Self::PlaybackEnded
        )
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    pub api_base: ApiBase,
    /// Latest wall clock any shell callback carried in.
    pub now_ms: UnixTimeMs,
    pub auth: AuthState,

    pub reports: Section<ReportsResponse>,
    pub sos_alerts: Section<SosAlertsResponse>,
    pub volunteers: Section<VolunteersResponse>,
    pub teams: Section<TeamsResponse>,
    pub stats: Section<DashboardStats>,
    pub officers: Section<OfficersResponse>,
    pub stations: Section<StationsResponse>,

    /// Bumped whenever the poll schedule restarts; stale ticks carry the
    /// old epoch and die.
    pub poll_epoch: u64,
    pub polling: bool,
    pub refresh_generation: u64,
    pub inflight: Option<InflightRefresh>,

    pub active_section: DashboardSection,
    pub search_query: String,
    pub type_filter: Option<ReportType>,
    pub location: LocationState,

    pub toasts: Vec<Toast>,
    pub confirm: Option<ConfirmPending>,
    pub prompt: Option<PromptPending>,

    pub player: Option<PlayerState>,
    /// Bumped on open and close; cancels the previous player's poll loop
    /// and any in-flight chunk fetch.
    pub player_generation: u64,
}

impl Model {
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match &self.auth {
            AuthState::LoggedIn(session) => Some(session.token.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn location_scope(&self) -> Option<LocationScope> {
        if !self.location.enabled {
            return None;
        }
        self.location.fix.map(|fix| LocationScope {
            latitude: fix.latitude,
            longitude: fix.longitude,
            radius_km: self.location.radius_km,
        })
    }

    pub fn push_toast(&mut self, kind: ToastKind, message: impl Into<String>) -> ToastId {
        let toast = Toast {
            id: ToastId::fresh(),
            kind,
            message: message.into(),
            created_at: self.now_ms,
        };
        let id = toast.id;
        self.toasts.push(toast);
        id
    }

    /// Settle a loading toast in place, keeping its id so the shell animates
    /// one toast through the whole command lifecycle. Re-pushes if the toast
    /// was dismissed in the meantime; an outcome is never dropped.
    pub fn settle_toast(&mut self, id: ToastId, kind: ToastKind, message: impl Into<String>) {
        if let Some(toast) = self.toasts.iter_mut().find(|toast| toast.id == id) {
            toast.kind = kind;
            toast.message = message.into();
        } else {
            self.toasts.push(Toast {
                id,
                kind,
                message: message.into(),
                created_at: self.now_ms,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// View model
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ViewModel {
    pub screen: Screen,
    pub toasts: Vec<ToastView>,
    pub confirm: Option<ConfirmView>,
    pub prompt: Option<PromptView>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Screen {
    Booting,
    Login { notice: Option<String> },
    Dashboard(Box<DashboardView>),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToastView {
    pub id: ToastId,
    pub kind: ToastKind,
    pub message: String,
    pub duration_ms: Option<u64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConfirmView {
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PromptView {
    pub label: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LocationView {
    pub enabled: bool,
    pub requesting: bool,
    pub has_fix: bool,
    pub radius_km: u8,
    pub radius_options: [u8; 4],
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct DashboardView {
    pub operator_name: Option<String>,
    pub active_section: DashboardSection,
    pub search_query: String,
    pub type_filter: Option<ReportType>,
    pub refreshing: bool,
    pub refreshed_at: Option<UnixTimeMs>,
    pub location: LocationView,

    pub stats: DashboardStats,
    pub stats_stale: bool,
    /// SOS alerts after search filtering.
    pub emergencies: Vec<SosAlert>,
    pub sos_stale: bool,
    /// Critical incident reports after type and search filtering.
    pub reports: Vec<Report>,
    /// Unfiltered fetch result, for the all-reports table.
    pub all_reports: Vec<Report>,
    pub reports_stale: bool,
    pub critical_count: usize,
    pub patrol_units: Vec<PatrolTeam>,
    pub teams_stale: bool,
    pub volunteers: Vec<Volunteer>,
    pub volunteers_stale: bool,
    pub officers: Vec<Officer>,
    pub stations: Vec<PoliceStation>,
    pub feed: Vec<FeedItem>,

    pub player: Option<PlayerView>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum PlayerStatus {
    Loading,
    Ready,
    Failed { message: String },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChunkView {
    pub sequence: u32,
    /// `None` while the upload for this slot is still in flight.
    pub url: Option<String>,
    pub size_label: String,
    pub recorded_at: DateTime<Utc>,
    pub duration_label: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct PlayerView {
    pub emergency_id: SosId,
    pub status: PlayerStatus,
    pub emergency_type: String,
    pub reporter_name: String,
    pub chunks: Vec<ChunkView>,
    pub current_index: usize,
    pub current_url: Option<String>,
    pub playing: bool,
    pub fullscreen: bool,
    pub sidebar_open: bool,
    pub stale: bool,
    pub notice: Option<String>,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub mod app {
    use super::*;
    use tracing::{debug, info, warn};

    #[derive(Default)]
    pub struct App;

    /// Internal tag for the five fan-out requests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Collection {
        Reports,
        SosAlerts,
        Volunteers,
        Teams,
        Stats,
    }

    impl Collection {
        const fn name(self) -> &'static str {
            match self {
                Self::Reports => "reports",
                Self::SosAlerts => "sos_alerts",
                Self::Volunteers => "volunteers",
                Self::Teams => "teams",
                Self::Stats => "stats",
            }
        }
    }

    impl App {
        // -- session ------------------------------------------------------

        fn boot(model: &mut Model, caps: &Capabilities, now_ms: u64, api_base: Option<String>) {
            model.now_ms = UnixTimeMs(now_ms);
            if let Some(raw) = api_base {
                match ApiBase::parse(&raw) {
                    Ok(base) => model.api_base = base,
                    Err(error) => {
                        warn!("Ignoring invalid api base {:?}: {}", raw, error.message);
                    }
                }
            }
            model.auth = AuthState::Booting {
                load: SessionLoad::default(),
                pending: 3,
            };
            for slot in SessionSlot::ALL {
                caps.storage.get(slot.key().to_owned(), move |result| {
                    Event::SessionSlotLoaded { slot, result }
                });
            }
        }

        fn slot_loaded(
            model: &mut Model,
            caps: &Capabilities,
            slot: SessionSlot,
            result: Result<Option<Vec<u8>>, KeyValueError>,
        ) {
            let AuthState::Booting { load, pending } = &mut model.auth else {
                warn!("Dropping late session read for {:?}", slot);
                return;
            };
            let bytes = match result {
                Ok(bytes) => bytes,
                Err(error) => {
                    warn!("Session read failed for {:?}: {}", slot, error);
                    None
                }
            };
            match slot {
                SessionSlot::User => load.user = bytes.as_deref().and_then(session::parse_user),
                SessionSlot::Token => load.token = bytes.as_deref().and_then(session::parse_token),
                SessionSlot::LoginTimestamp => {
                    load.login_timestamp =
                        bytes.as_deref().and_then(session::parse_login_timestamp);
                }
            }
            *pending = pending.saturating_sub(1);
            if *pending == 0 {
                let load = load.clone();
                Self::finish_boot(model, caps, &load);
            }
        }

        fn finish_boot(model: &mut Model, caps: &Capabilities, load: &SessionLoad) {
            match session::evaluate(load, model.now_ms) {
                session::SessionVerdict::Active(restored) => {
                    info!("Restored session, logged in at {}", restored.logged_in_at);
                    model.auth = AuthState::LoggedIn(restored);
                    Self::restart_polling(model, caps);
                }
                session::SessionVerdict::Absent => {
                    model.auth = AuthState::LoggedOut { error: None };
                }
                session::SessionVerdict::Expired => {
                    info!("Stored session expired, purging");
                    Self::purge_session(caps);
                    model.auth = AuthState::LoggedOut {
                        error: Some(AppError::new(
                            ErrorKind::SessionExpired,
                            "stored session is past its maximum age",
                        )),
                    };
                }
            }
        }

        fn purge_session(caps: &Capabilities) {
            for slot in SessionSlot::ALL {
                caps.storage.delete(slot.key().to_owned(), move |result| {
                    Event::SessionKeyPurged { slot, result }
                });
            }
        }

        /// Drop credentials and everything fetched with them, and return to
        /// the login screen. Also the 401/403 path.
        fn force_logout(model: &mut Model, caps: &Capabilities, error: Option<AppError>) {
            info!("Logging out");
            Self::purge_session(caps);
            model.poll_epoch += 1;
            model.polling = false;
            model.inflight = None;
            model.player = None;
            model.player_generation += 1;
            model.confirm = None;
            model.prompt = None;
            model.reports = Section::default();
            model.sos_alerts = Section::default();
            model.volunteers = Section::default();
            model.teams = Section::default();
            model.stats = Section::default();
            model.officers = Section::default();
            model.stations = Section::default();
            model.auth = AuthState::LoggedOut { error };
        }

        // -- polling ------------------------------------------------------

        /// Kick the schedule over: refresh immediately, then tick on the
        /// interval under a fresh epoch. Called at login and whenever a
        /// fetch-shaping input (section, type filter, radius, location)
        /// changes.
        fn restart_polling(model: &mut Model, caps: &Capabilities) {
            model.poll_epoch += 1;
            model.polling = true;
            Self::start_refresh(model, caps);
            Self::schedule_tick(model, caps);
        }

        fn schedule_tick(model: &Model, caps: &Capabilities) {
            let epoch = model.poll_epoch;
            caps.timer.after(DASHBOARD_REFRESH_INTERVAL, move |elapsed| {
                Event::PollTicked {
                    epoch,
                    now_ms: elapsed.now_ms,
                }
            });
        }

        fn start_refresh(model: &mut Model, caps: &Capabilities) {
            let Some(token) = model.token().map(str::to_owned) else {
                return;
            };
            model.refresh_generation += 1;
            let generation = model.refresh_generation;
            model.inflight = Some(InflightRefresh {
                generation,
                pending: PendingFetches::all(),
                started_at: model.now_ms,
                failure_toasted: false,
            });
            debug!("Refresh {} started", generation);

            let scope = model.location_scope();
            let base = &model.api_base;
            Self::send_get(
                caps,
                &api::reports_url(base, model.type_filter, scope.as_ref()),
                &token,
                move |result| Event::ReportsFetched {
                    generation,
                    result: Box::new(result),
                },
            );
            Self::send_get(
                caps,
                &api::sos_alerts_url(base, scope.as_ref()),
                &token,
                move |result| Event::SosAlertsFetched {
                    generation,
                    result: Box::new(result),
                },
            );
            Self::send_get(caps, &api::volunteers_url(base), &token, move |result| {
                Event::VolunteersFetched {
                    generation,
                    result: Box::new(result),
                }
            });
            Self::send_get(caps, &api::patrol_teams_url(base), &token, move |result| {
                Event::TeamsFetched {
                    generation,
                    result: Box::new(result),
                }
            });
            Self::send_get(
                caps,
                &api::dashboard_stats_url(base, scope.as_ref()),
                &token,
                move |result| Event::StatsFetched {
                    generation,
                    result: Box::new(result),
                },
            );
            caps.timer.after(REQUEST_TIMEOUT, move |elapsed| {
                Event::RefreshDeadlinePassed {
                    generation,
                    now_ms: elapsed.now_ms,
                }
            });
        }

        fn send_get<F>(caps: &Capabilities, url: &str, token: &str, make_event: F)
        where
            F: FnOnce(HttpOutcome) -> Event + Send + 'static,
        {
            api::bearer(caps.http.get(url), token)
                .expect_string()
                .send(make_event);
        }

        fn poll_ticked(model: &mut Model, caps: &Capabilities, epoch: u64, now_ms: u64) {
            model.now_ms = UnixTimeMs(now_ms);
            if !model.polling || epoch != model.poll_epoch {
                debug!("Dropping tick from superseded epoch {}", epoch);
                return;
            }
            Self::start_refresh(model, caps);
            Self::schedule_tick(model, caps);
        }

        fn apply_fetch(
            model: &mut Model,
            caps: &Capabilities,
            which: Collection,
            generation: u64,
            outcome: HttpOutcome,
        ) {
            let Some(inflight) = model.inflight.as_mut() else {
                debug!("Dropping {} result, no refresh in flight", which.name());
                return;
            };
            if inflight.generation != generation {
                debug!(
                    "Dropping {} result from superseded refresh {}",
                    which.name(),
                    generation
                );
                return;
            }
            match which {
                Collection::Reports => inflight.pending.reports = false,
                Collection::SosAlerts => inflight.pending.sos_alerts = false,
                Collection::Volunteers => inflight.pending.volunteers = false,
                Collection::Teams => inflight.pending.teams = false,
                Collection::Stats => inflight.pending.stats = false,
            }

            let now = model.now_ms;
            let failure = match which {
                Collection::Reports => Self::settle(&mut model.reports, api::decode(outcome), now),
                Collection::SosAlerts => {
                    Self::settle(&mut model.sos_alerts, api::decode(outcome), now)
                }
                Collection::Volunteers => {
                    Self::settle(&mut model.volunteers, api::decode(outcome), now)
                }
                Collection::Teams => Self::settle(&mut model.teams, api::decode(outcome), now),
                Collection::Stats => Self::settle(&mut model.stats, api::decode(outcome), now),
            };

            if let Some(error) = failure {
                if error.kind == ErrorKind::SessionExpired {
                    Self::force_logout(model, caps, Some(error));
                    return;
                }
                warn!("{} refresh failed: {}", which.name(), error.message);
                let first_failure = match model.inflight.as_mut() {
                    Some(inflight) if !inflight.failure_toasted => {
                        inflight.failure_toasted = true;
                        true
                    }
                    _ => false,
                };
                if first_failure {
                    model.push_toast(
                        ToastKind::Error,
                        format!("Sync failed: {}", error.user_facing_message()),
                    );
                }
            }

            if model
                .inflight
                .as_ref()
                .is_some_and(|inflight| inflight.pending.is_settled())
            {
                Self::finish_refresh(model, caps);
            }
        }

        fn settle<T>(
            section: &mut Section<T>,
            decoded: Result<T, AppError>,
            now: UnixTimeMs,
        ) -> Option<AppError> {
            match decoded {
                Ok(data) => {
                    section.settle_ok(data, now);
                    None
                }
                Err(error) => {
                    section.settle_err(error.clone(), now);
                    Some(error)
                }
            }
        }

        fn finish_refresh(model: &mut Model, caps: &Capabilities) {
            model.inflight = None;
            debug!("Refresh {} settled", model.refresh_generation);
            if model.active_section == DashboardSection::Teams && model.teams.last_error.is_none() {
                Self::send_support_fetches(model, caps);
            }
        }

        /// Teams-section extras: the officer roster, plus nearby stations
        /// once a fix exists. Failures here log and mark stale, no toast.
        fn send_support_fetches(model: &Model, caps: &Capabilities) {
            let Some(token) = model.token() else {
                return;
            };
            let generation = model.refresh_generation;
            Self::send_get(
                caps,
                &api::officers_url(&model.api_base),
                token,
                move |result| Event::OfficersFetched {
                    generation,
                    result: Box::new(result),
                },
            );
            if let Some(fix) = model.location.fix {
                Self::send_get(
                    caps,
                    &api::nearby_police_url(&model.api_base, fix),
                    token,
                    move |result| Event::StationsFetched {
                        generation,
                        result: Box::new(result),
                    },
                );
            }
        }

        fn apply_officers(
            model: &mut Model,
            caps: &Capabilities,
            generation: u64,
            outcome: HttpOutcome,
        ) {
            if generation != model.refresh_generation {
                debug!(
                    "Dropping officer roster from superseded refresh {}",
                    generation
                );
                return;
            }
            let now = model.now_ms;
            if let Some(error) = Self::settle(&mut model.officers, api::decode(outcome), now) {
                if error.kind == ErrorKind::SessionExpired {
                    Self::force_logout(model, caps, Some(error));
                    return;
                }
                warn!("Officer roster refresh failed: {}", error.message);
            }
        }

        fn apply_stations(
            model: &mut Model,
            caps: &Capabilities,
            generation: u64,
            outcome: HttpOutcome,
        ) {
            if generation != model.refresh_generation {
                debug!(
                    "Dropping station list from superseded refresh {}",
                    generation
                );
                return;
            }
            let now = model.now_ms;
            if let Some(error) = Self::settle(&mut model.stations, api::decode(outcome), now) {
                if error.kind == ErrorKind::SessionExpired {
                    Self::force_logout(model, caps, Some(error));
                    return;
                }
                warn!("Station list refresh failed: {}", error.message);
            }
        }

        fn deadline_passed(model: &mut Model, caps: &Capabilities, generation: u64, now_ms: u64) {
            model.now_ms = UnixTimeMs(now_ms);
            let Some(inflight) = model.inflight.as_ref() else {
                return;
            };
            if inflight.generation != generation {
                return;
            }
            let pending = inflight.pending;
            let already_toasted = inflight.failure_toasted;
            warn!(
                "Refresh {} hit the deadline with {} collections pending",
                generation,
                pending.remaining()
            );

            let now = model.now_ms;
            let timed_out = || AppError::new(ErrorKind::Timeout, "request timed out");
            if pending.reports {
                model.reports.settle_err(timed_out(), now);
            }
            if pending.sos_alerts {
                model.sos_alerts.settle_err(timed_out(), now);
            }
            if pending.volunteers {
                model.volunteers.settle_err(timed_out(), now);
            }
            if pending.teams {
                model.teams.settle_err(timed_out(), now);
            }
            if pending.stats {
                model.stats.settle_err(timed_out(), now);
            }
            if !already_toasted {
                model.push_toast(
                    ToastKind::Error,
                    format!("Sync failed: {}", timed_out().user_facing_message()),
                );
            }
            // No support fetches after a deadline; the cycle is a loss.
            model.inflight = None;
        }

        // -- filters and location -----------------------------------------

        fn select_section(model: &mut Model, caps: &Capabilities, section: DashboardSection) {
            if model.active_section == section {
                return;
            }
            info!("Switching to {} section", section.name());
            model.active_section = section;
            Self::restart_polling(model, caps);
        }

        fn select_radius(model: &mut Model, caps: &Capabilities, radius_km: u8) {
            if !RADIUS_OPTIONS_KM.contains(&radius_km) {
                warn!("Ignoring unsupported radius {} km", radius_km);
                return;
            }
            model.location.radius_km = radius_km;
            Self::restart_polling(model, caps);
        }

        fn toggle_location(model: &mut Model, caps: &Capabilities) {
            if !model.location.enabled && model.location.fix.is_none() {
                if model.location.requesting {
                    return;
                }
                model.location.requesting = true;
                caps.location
                    .current_position(|output| Event::LocationFixReceived { output });
                return;
            }
            model.location.enabled = !model.location.enabled;
            let message = if model.location.enabled {
                "Location enabled"
            } else {
                "Location disabled"
            };
            model.push_toast(ToastKind::Info, message);
            Self::restart_polling(model, caps);
        }

        fn location_fix(model: &mut Model, caps: &Capabilities, output: LocationOutput) {
            model.location.requesting = false;
            match output {
                LocationOutput::Fix {
                    latitude,
                    longitude,
                } => match Coordinate::new(latitude, longitude) {
                    Some(fix) => {
                        model.location.fix = Some(fix);
                        model.location.enabled = true;
                        model.push_toast(ToastKind::Success, "Location enabled");
                        Self::restart_polling(model, caps);
                    }
                    None => Self::location_failed(model, "shell returned an out-of-range fix"),
                },
                LocationOutput::PermissionDenied => {
                    Self::location_failed(model, "permission denied");
                }
                LocationOutput::Unavailable { message } => Self::location_failed(model, &message),
            }
        }

        fn location_failed(model: &mut Model, detail: &str) {
            warn!("Geolocation failed: {}", detail);
            model.push_toast(ToastKind::Error, "Unable to access location");
        }

        // -- commands -----------------------------------------------------

        fn send_command(
            model: &mut Model,
            kind: CommandKind,
            request: crux_http::Result<crux_http::RequestBuilder<Event>>,
        ) {
            let toast = model.push_toast(ToastKind::Loading, kind.loading_message());
            match request {
                Ok(request) => {
                    let command = kind;
                    request
                        .expect_string()
                        .send(move |result| Event::CommandCompleted {
                            command,
                            toast,
                            result: Box::new(result),
                        });
                }
                Err(error) => {
                    warn!("Could not encode {} request: {}", kind.name(), error);
                    model.settle_toast(toast, ToastKind::Error, kind.rejected_fallback());
                }
            }
        }

        fn command_completed(
            model: &mut Model,
            caps: &Capabilities,
            command: CommandKind,
            toast: ToastId,
            outcome: HttpOutcome,
        ) {
            match api::decode_command(outcome) {
                Ok(_) => {
                    info!("Command {} succeeded", command.name());
                    model.settle_toast(toast, ToastKind::Success, command.success_message());
                    if command.refreshes_on_success() {
                        Self::start_refresh(model, caps);
                    }
                }
                Err(error) if error.kind == ErrorKind::SessionExpired => {
                    model.settle_toast(toast, ToastKind::Error, error.user_facing_message());
                    Self::force_logout(model, caps, Some(error));
                }
                Err(error) => {
                    warn!("Command {} failed: {}", command.name(), error.message);
                    model.settle_toast(toast, ToastKind::Error, command.failure_message(&error));
                }
            }
        }

        fn request_status_update(
            model: &mut Model,
            caps: &Capabilities,
            report: ReportId,
            status: ReportStatus,
        ) {
            let Some(token) = model.token().map(str::to_owned) else {
                return;
            };
            let url = api::report_status_url(&model.api_base, report);
            let request = api::bearer(caps.http.patch(&url), &token)
                .body_json(&api::StatusUpdateRequest { status });
            Self::send_command(model, CommandKind::StatusUpdate { status }, request);
        }

        fn request_team_assign(
            model: &mut Model,
            caps: &Capabilities,
            alert: SosId,
            team: Option<TeamId>,
        ) {
            let Some(team) = team else {
                model.push_toast(ToastKind::Error, "Please select a team");
                return;
            };
            let label = model
                .teams
                .data
                .results
                .iter()
                .find(|unit| unit.id == team)
                .map_or_else(
                    || "Unit".to_owned(),
                    |unit| {
                        if unit.station_name.is_empty() {
                            unit.team_id.clone()
                        } else {
                            format!("{} ({})", unit.team_id, unit.station_name)
                        }
                    },
                );
            let Some(token) = model.token().map(str::to_owned) else {
                return;
            };
            let url = api::assign_team_url(&model.api_base, alert);
            let request = api::bearer(caps.http.post(&url), &token)
                .body_json(&api::AssignTeamRequest { team_id: team });
            Self::send_command(model, CommandKind::TeamAssign { label }, request);
        }

        fn request_team_create(model: &mut Model, caps: &Capabilities, form: &TeamForm) {
            let Some(token) = model.token().map(str::to_owned) else {
                return;
            };
            let url = api::patrol_teams_url(&model.api_base);
            let request = api::bearer(caps.http.post(&url), &token).body_json(form);
            Self::send_command(model, CommandKind::TeamCreate, request);
        }

        fn request_team_update(
            model: &mut Model,
            caps: &Capabilities,
            team: TeamId,
            form: &TeamForm,
        ) {
            let Some(token) = model.token().map(str::to_owned) else {
                return;
            };
            let url = api::patrol_team_url(&model.api_base, team);
            let request = api::bearer(caps.http.patch(&url), &token).body_json(form);
            Self::send_command(model, CommandKind::TeamUpdate, request);
        }

        fn request_team_toggle(model: &mut Model, caps: &Capabilities, team: TeamId) {
            let Some(token) = model.token().map(str::to_owned) else {
                return;
            };
            let url = api::toggle_team_status_url(&model.api_base, team);
            let request = Ok(api::bearer(caps.http.patch(&url), &token));
            Self::send_command(model, CommandKind::TeamToggle, request);
        }

        fn request_member_assign(
            model: &mut Model,
            caps: &Capabilities,
            team: TeamId,
            officer: OfficerId,
        ) {
            let Some(token) = model.token().map(str::to_owned) else {
                return;
            };
            let url = api::assign_member_url(&model.api_base, team);
            let request = api::bearer(caps.http.post(&url), &token)
                .body_json(&api::MemberRequest { user_id: officer });
            Self::send_command(model, CommandKind::MemberAssign, request);
        }

        fn request_officer_register(model: &mut Model, caps: &Capabilities, form: OfficerForm) {
            let Some(token) = model.token().map(str::to_owned) else {
                return;
            };
            let url = api::register_officer_url(&model.api_base);
            let payload = api::RegisterOfficerRequest::from_form(form);
            let request = api::bearer(caps.http.post(&url), &token).body_json(&payload);
            Self::send_command(model, CommandKind::OfficerRegister, request);
        }

        /// Run a mutation whose confirmation dialog was just accepted.
        fn execute_pending(model: &mut Model, caps: &Capabilities, command: PendingCommand) {
            let Some(token) = model.token().map(str::to_owned) else {
                return;
            };
            match command {
                PendingCommand::TeamDelete { team } => {
                    let url = api::patrol_team_url(&model.api_base, team);
                    let request = Ok(api::bearer(caps.http.delete(&url), &token));
                    Self::send_command(model, CommandKind::TeamDelete, request);
                }
                PendingCommand::MemberRemove { team, officer } => {
                    let url = api::remove_member_url(&model.api_base, team);
                    let request = api::bearer(caps.http.post(&url), &token)
                        .body_json(&api::MemberRequest { user_id: officer });
                    Self::send_command(model, CommandKind::MemberRemove, request);
                }
                PendingCommand::SosResolve { alert } => {
                    let url = api::resolve_sos_url(&model.api_base, alert);
                    let request = Ok(api::bearer(caps.http.post(&url), &token));
                    Self::send_command(model, CommandKind::SosResolve, request);
                }
                PendingCommand::Broadcast { title, message } => {
                    let url = api::official_alerts_url(&model.api_base);
                    let payload = api::BroadcastRequest::emergency(title, message);
                    let request = api::bearer(caps.http.post(&url), &token).body_json(&payload);
                    Self::send_command(model, CommandKind::Broadcast, request);
                }
            }
        }

        fn prompt_submitted(model: &mut Model, input: &str) {
            let Some(stage) = model.prompt.take() else {
                return;
            };
            let input = input.trim();
            if input.is_empty() {
                // Blank input aborts the whole broadcast, silently.
                return;
            }
            match stage {
                PromptPending::BroadcastTitle => {
                    model.prompt = Some(PromptPending::BroadcastMessage {
                        title: input.to_owned(),
                    });
                }
                PromptPending::BroadcastMessage { title } => {
                    model.confirm = Some(ConfirmPending {
                        message: format!(
                            "Broadcast to all units and citizens?\n\nTitle: {title}\nMessage: {input}"
                        ),
                        command: PendingCommand::Broadcast {
                            title,
                            message: input.to_owned(),
                        },
                    });
                }
            }
        }

        // -- video player -------------------------------------------------

        fn open_player(model: &mut Model, caps: &Capabilities, alert: SosId) {
            model.player_generation += 1;
            model.player = Some(PlayerState::open(alert, model.player_generation));
            Self::send_video_fetch(model, caps);
            Self::schedule_player_tick(model, caps);
        }

        fn close_player(model: &mut Model) {
            model.player = None;
            model.player_generation += 1;
        }

        fn send_video_fetch(model: &Model, caps: &Capabilities) {
            let Some(player) = model.player.as_ref() else {
                return;
            };
            let Some(token) = model.token() else {
                return;
            };
            let generation = player.generation;
            let url = api::video_feeds_url(&model.api_base, player.emergency_id);
            Self::send_get(caps, &url, token, move |result| Event::VideoFeedsFetched {
                generation,
                result: Box::new(result),
            });
        }

        fn schedule_player_tick(model: &Model, caps: &Capabilities) {
            let generation = model.player_generation;
            caps.timer
                .after(VIDEO_FEED_REFRESH_INTERVAL, move |elapsed| {
                    Event::PlayerPollTicked {
                        generation,
                        now_ms: elapsed.now_ms,
                    }
                });
        }

        fn player_ticked(model: &mut Model, caps: &Capabilities, generation: u64, now_ms: u64) {
            model.now_ms = UnixTimeMs(now_ms);
            if generation != model.player_generation || model.player.is_none() {
                debug!("Dropping player tick from closed player {}", generation);
                return;
            }
            Self::send_video_fetch(model, caps);
            Self::schedule_player_tick(model, caps);
        }

        fn apply_video_feeds(
            model: &mut Model,
            caps: &Capabilities,
            generation: u64,
            outcome: HttpOutcome,
        ) {
            if generation != model.player_generation || model.player.is_none() {
                debug!("Dropping chunk list from closed player {}", generation);
                return;
            }
            match api::decode_video_feeds(outcome) {
                Ok(bundle) => {
                    if let Some(player) = model.player.as_mut() {
                        player.apply_refresh(bundle);
                    }
                }
                Err(error) if error.kind == ErrorKind::SessionExpired => {
                    Self::force_logout(model, caps, Some(error));
                }
                Err(error) => {
                    warn!("Chunk list refresh failed: {}", error.message);
                    if let Some(player) = model.player.as_mut() {
                        player.apply_error(error);
                    }
                }
            }
        }

        fn retry_player(model: &mut Model, caps: &Capabilities) {
            if let Some(player) = model.player.as_mut() {
                player.retry();
                Self::send_video_fetch(model, caps);
            }
        }

        // -- view helpers -------------------------------------------------

        fn dashboard_view(model: &Model, session: &Session) -> DashboardView {
            let reports = &model.reports.data.results;
            let refreshed_at = [
                model.reports.synced_at,
                model.sos_alerts.synced_at,
                model.volunteers.synced_at,
                model.teams.synced_at,
                model.stats.synced_at,
            ]
            .into_iter()
            .flatten()
            .max();

            DashboardView {
                operator_name: session.user.name.clone(),
                active_section: model.active_section,
                search_query: model.search_query.clone(),
                type_filter: model.type_filter,
                refreshing: model.inflight.is_some(),
                refreshed_at,
                location: LocationView {
                    enabled: model.location.enabled,
                    requesting: model.location.requesting,
                    has_fix: model.location.fix.is_some(),
                    radius_km: model.location.radius_km,
                    radius_options: RADIUS_OPTIONS_KM,
                },
                stats: model.stats.data.clone(),
                stats_stale: model.stats.is_stale(),
                emergencies: filters::filtered_emergencies(
                    &model.sos_alerts.data.results,
                    &model.search_query,
                ),
                sos_stale: model.sos_alerts.is_stale(),
                reports: filters::filtered_reports(reports, model.type_filter, &model.search_query),
                all_reports: reports.clone(),
                reports_stale: model.reports.is_stale(),
                critical_count: reports
                    .iter()
                    .filter(|report| report.report_type.is_critical())
                    .count(),
                patrol_units: filters::filtered_patrol_units(
                    &model.teams.data.results,
                    &model.search_query,
                ),
                teams_stale: model.teams.is_stale(),
                volunteers: model.volunteers.data.results.clone(),
                volunteers_stale: model.volunteers.is_stale(),
                officers: model.officers.data.officers.clone(),
                stations: model.stations.data.police_stations.clone(),
                feed: filters::community_feed(&model.sos_alerts.data.results, reports),
                player: model.player.as_ref().map(Self::player_view),
            }
        }

        fn player_view(player: &PlayerState) -> PlayerView {
            PlayerView {
                emergency_id: player.emergency_id,
                status: match &player.phase {
                    PlayerPhase::Loading => PlayerStatus::Loading,
                    PlayerPhase::Ready => PlayerStatus::Ready,
                    PlayerPhase::Failed(error) => PlayerStatus::Failed {
                        message: error.user_facing_message(),
                    },
                },
                emergency_type: player.emergency_info.emergency_type.clone(),
                reporter_name: player.emergency_info.user_name.clone(),
                chunks: player
                    .chunks
                    .iter()
                    .map(|chunk| ChunkView {
                        sequence: chunk.chunk_sequence,
                        url: chunk.video_url.clone(),
                        size_label: chunk
                            .file_size_formatted
                            .clone()
                            .unwrap_or_else(|| "Unknown".to_owned()),
                        recorded_at: chunk.timestamp,
                        duration_label: chunk.duration.map(video::format_clock),
                    })
                    .collect(),
                current_index: player.current_index,
                current_url: player
                    .current_chunk()
                    .and_then(|chunk| chunk.video_url.clone()),
                playing: player.playing,
                fullscreen: player.fullscreen,
                sidebar_open: player.sidebar_open,
                stale: player.is_stale(),
                notice: player
                    .last_error
                    .as_ref()
                    .map(AppError::user_facing_message),
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Self::Event, model: &mut Self::Model, caps: &Self::Capabilities) {
            if event.is_user_initiated() {
                info!("Handling {}", event.name());
            } else {
                debug!("Handling {}", event.name());
            }

            match event {
                // Lifecycle
                Event::Started { now_ms, api_base } => Self::boot(model, caps, now_ms, api_base),
                Event::SessionSlotLoaded { slot, result } => {
                    Self::slot_loaded(model, caps, slot, result);
                }
                Event::SessionKeyPurged { slot, result } => {
                    if let Err(error) = result {
                        warn!("Failed to purge session key {:?}: {}", slot, error);
                    }
                }
                Event::LogoutRequested => Self::force_logout(model, caps, None),

                // Polling
                Event::RefreshRequested => Self::start_refresh(model, caps),
                Event::PollTicked { epoch, now_ms } => {
                    Self::poll_ticked(model, caps, epoch, now_ms);
                }
                Event::RefreshDeadlinePassed { generation, now_ms } => {
                    Self::deadline_passed(model, caps, generation, now_ms);
                }
                Event::ReportsFetched { generation, result } => {
                    Self::apply_fetch(model, caps, Collection::Reports, generation, *result);
                }
                Event::SosAlertsFetched { generation, result } => {
                    Self::apply_fetch(model, caps, Collection::SosAlerts, generation, *result);
                }
                Event::VolunteersFetched { generation, result } => {
                    Self::apply_fetch(model, caps, Collection::Volunteers, generation, *result);
                }
                Event::TeamsFetched { generation, result } => {
                    Self::apply_fetch(model, caps, Collection::Teams, generation, *result);
                }
                Event::StatsFetched { generation, result } => {
                    Self::apply_fetch(model, caps, Collection::Stats, generation, *result);
                }
                Event::OfficersFetched { generation, result } => {
                    Self::apply_officers(model, caps, generation, *result);
                }
                Event::StationsFetched { generation, result } => {
                    Self::apply_stations(model, caps, generation, *result);
                }

                // Navigation and filters
                Event::SectionSelected { section } => Self::select_section(model, caps, section),
                Event::QueryChanged { query } => model.search_query = query,
                Event::TypeFilterChanged { report_type } => {
                    model.type_filter = report_type;
                    Self::restart_polling(model, caps);
                }
                Event::RadiusSelected { radius_km } => Self::select_radius(model, caps, radius_km),
                Event::LocationToggleRequested => Self::toggle_location(model, caps),
                Event::LocationFixReceived { output } => Self::location_fix(model, caps, output),
                Event::OverlaysDismissed => {
                    model.confirm = None;
                    model.prompt = None;
                }

                // Commands
                Event::StatusUpdateRequested { report, status } => {
                    Self::request_status_update(model, caps, report, status);
                }
                Event::TeamAssignRequested { alert, team } => {
                    Self::request_team_assign(model, caps, alert, team);
                }
                Event::SosResolveRequested { alert } => {
                    model.confirm = Some(ConfirmPending {
                        message: "Mark this emergency as resolved?".to_owned(),
                        command: PendingCommand::SosResolve { alert },
                    });
                }
                Event::BroadcastRequested => {
                    model.prompt = Some(PromptPending::BroadcastTitle);
                }
                Event::PromptSubmitted { input } => Self::prompt_submitted(model, &input),
                Event::PromptCancelled => model.prompt = None,
                Event::ConfirmAccepted => {
                    if let Some(pending) = model.confirm.take() {
                        Self::execute_pending(model, caps, pending.command);
                    }
                }
                Event::ConfirmDismissed => model.confirm = None,
                Event::TeamCreateRequested(form) => Self::request_team_create(model, caps, &form),
                Event::TeamUpdateRequested { team, form } => {
                    Self::request_team_update(model, caps, team, &form);
                }
                Event::TeamDeleteRequested { team } => {
                    model.confirm = Some(ConfirmPending {
                        message: "Are you sure you want to delete this patrol team? \
                                  This action cannot be undone."
                            .to_owned(),
                        command: PendingCommand::TeamDelete { team },
                    });
                }
                Event::TeamToggleRequested { team } => {
                    Self::request_team_toggle(model, caps, team);
                }
                Event::MemberAssignRequested { team, officer } => {
                    Self::request_member_assign(model, caps, team, officer);
                }
                Event::MemberRemoveRequested { team, officer } => {
                    model.confirm = Some(ConfirmPending {
                        message: "Remove this member from the team?".to_owned(),
                        command: PendingCommand::MemberRemove { team, officer },
                    });
                }
                Event::OfficerRegisterRequested(form) => {
                    Self::request_officer_register(model, caps, *form);
                }
                Event::CommandCompleted {
                    command,
                    toast,
                    result,
                } => Self::command_completed(model, caps, command, toast, *result),

                // Video player
                Event::PlayerOpened { alert } => Self::open_player(model, caps, alert),
                Event::PlayerClosed => Self::close_player(model),
                Event::PlayerRetryRequested => Self::retry_player(model, caps),
                Event::PlayerPollTicked { generation, now_ms } => {
                    Self::player_ticked(model, caps, generation, now_ms);
                }
                Event::VideoFeedsFetched { generation, result } => {
                    Self::apply_video_feeds(model, caps, generation, *result);
                }
                Event::PlaybackToggled => {
                    if let Some(player) = model.player.as_mut() {
                        player.toggle_playback();
                    }
                }
                Event::NextChunkRequested => {
                    if let Some(player) = model.player.as_mut() {
                        player.next_chunk();
                    }
                }
                Event::PrevChunkRequested => {
                    if let Some(player) = model.player.as_mut() {
                        player.prev_chunk();
                    }
                }
                Event::ChunkSelected { index } => {
                    if let Some(player) = model.player.as_mut() {
                        player.select_chunk(index);
                    }
                }
                Event::FullscreenToggled => {
                    if let Some(player) = model.player.as_mut() {
                        player.toggle_fullscreen();
                    }
                }
                Event::SidebarToggled => {
                    if let Some(player) = model.player.as_mut() {
                        player.toggle_sidebar();
                    }
                }
                Event::PlaybackEnded => {
                    if let Some(player) = model.player.as_mut() {
                        player.playback_ended();
                    }
                }

                // Toasts
                Event::ToastDismissed { id } => model.toasts.retain(|toast| toast.id != id),
            }

            caps.render.render();
        }

        fn view(&self, model: &Self::Model) -> Self::ViewModel {
            let screen = match &model.auth {
                AuthState::Booting { .. } => Screen::Booting,
                AuthState::LoggedOut { error } => Screen::Login {
                    notice: error.as_ref().map(AppError::user_facing_message),
                },
                AuthState::LoggedIn(session) => {
                    Screen::Dashboard(Box::new(Self::dashboard_view(model, session)))
                }
            };
            ViewModel {
                screen,
                toasts: model
                    .toasts
                    .iter()
                    .map(|toast| ToastView {
                        id: toast.id,
                        kind: toast.kind,
                        message: toast.message.clone(),
                        duration_ms: toast.kind.default_duration_ms(),
                    })
                    .collect(),
                confirm: model.confirm.as_ref().map(|confirm| ConfirmView {
                    message: confirm.message.clone(),
                }),
                prompt: model.prompt.as_ref().map(|prompt| PromptView {
                    label: prompt.label().to_owned(),
                }),
            }
        }
    }
}
