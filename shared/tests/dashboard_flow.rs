//! End-to-end flows through the dashboard core: boot, the polling fan-out,
//! per-collection settlement, and the command toast lifecycle. Each test
//! drives the app through the shell protocol the way a real shell would,
//! resolving effect requests by hand.

use crux_core::testing::{AppTester, Update};
use crux_core::Request;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use crux_kv::value::Value;
use crux_kv::{KeyValueOperation, KeyValueResponse, KeyValueResult};
use serde_json::json;

use shared::api::{ReportStatus, ReportType};
use shared::capabilities::{LocationOutput, TimerElapsed, TimerOperation};
use shared::{
    App, AuthState, DashboardSection, Effect, ErrorKind, Event, Model, ReportId, Screen, SosId,
    TeamId, ToastKind, UnixTimeMs, SESSION_MAX_AGE_MS,
};

/// 2024-01-15T10:30:00Z, same instant the fixture rows carry.
const NOW: u64 = 1_705_312_200_000;
const API: &str = "http://backend.test/api";
const TOKEN: &str = "tok-watchtower";

fn stored_slot(key: &str) -> Value {
    match key {
        "user" => Value::Bytes(
            json!({"id": 12, "name": "Inspector Rao", "role": "police"})
                .to_string()
                .into_bytes(),
        ),
        "token" => Value::Bytes(TOKEN.as_bytes().to_vec()),
        "loginTimestamp" => Value::Bytes((NOW - 60_000).to_string().into_bytes()),
        other => panic!("unexpected storage key {other}"),
    }
}

/// Start the app with a valid stored session and return the effects of the
/// refresh fan-out the restored login triggers.
fn boot_logged_in(app: &AppTester<App, Effect>, model: &mut Model) -> Vec<Effect> {
    let update = app.update(
        Event::Started {
            now_ms: NOW,
            api_base: Some(API.to_owned()),
        },
        model,
    );

    let mut effects = Vec::new();
    for effect in update.effects {
        let Some(mut request) = effect.into_storage() else {
            continue;
        };
        let KeyValueOperation::Get { key } = request.operation.clone() else {
            panic!("boot issued a non-read storage operation");
        };
        let resolved = app
            .resolve(
                &mut request,
                KeyValueResult::Ok {
                    response: KeyValueResponse::Get {
                        value: stored_slot(&key),
                    },
                },
            )
            .expect("storage read resolves");
        effects.extend(feed(app, model, resolved));
    }
    effects
}

/// Feed the events a resolve produced back into the app one by one,
/// collecting every effect they raise.
fn feed(app: &AppTester<App, Effect>, model: &mut Model, update: Update<Effect, Event>) -> Vec<Effect> {
    let mut effects = Vec::new();
    for event in update.events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

fn split(effects: Vec<Effect>) -> (Vec<Request<HttpRequest>>, Vec<Request<TimerOperation>>) {
    let mut http = Vec::new();
    let mut timers = Vec::new();
    for effect in effects {
        if effect.is_http() {
            http.push(effect.into_http().unwrap());
        } else if effect.is_timer() {
            timers.push(effect.into_timer().unwrap());
        }
    }
    (http, timers)
}

fn http_count(effects: &[Effect]) -> usize {
    effects.iter().filter(|effect| effect.is_http()).count()
}

fn find_request(requests: &mut Vec<Request<HttpRequest>>, fragment: &str) -> Request<HttpRequest> {
    let position = requests
        .iter()
        .position(|request| request.operation.url.contains(fragment))
        .unwrap_or_else(|| panic!("no pending request matching {fragment}"));
    requests.remove(position)
}

fn find_timer(timers: &mut Vec<Request<TimerOperation>>, delay_ms: u64) -> Request<TimerOperation> {
    let position = timers
        .iter()
        .position(|timer| timer.operation.delay_ms == delay_ms)
        .unwrap_or_else(|| panic!("no pending timer for {delay_ms} ms"));
    timers.remove(position)
}

fn has_bearer(request: &HttpRequest) -> bool {
    request
        .headers
        .iter()
        .any(|header| header.name == "authorization" && header.value == format!("Bearer {TOKEN}"))
}

fn ok_json(body: &serde_json::Value) -> HttpResult {
    HttpResult::Ok(HttpResponse::ok().body(body.to_string()).build())
}

fn canned_body(url: &str) -> serde_json::Value {
    if url.contains("/police/reports/") {
        json!({
            "results": [{
                "id": 41,
                "title": "Street light out",
                "report_type": "infrastructure",
                "status": "pending",
                "created_at": "2024-01-15T10:30:00Z"
            }],
            "total_count": 1
        })
    } else if url.contains("/police/sos-alerts/") {
        json!({
            "results": [{
                "id": 9,
                "user_name": "Asha",
                "emergency_type": "panic",
                "is_active": true,
                "created_at": "2024-01-15T10:28:00Z"
            }],
            "total_count": 1
        })
    } else if url.contains("/police/volunteers/") {
        json!({
            "results": [{"id": 5, "user_name": "Meera", "is_active": true}],
            "total_count": 1
        })
    } else if url.contains("/police/patrol-teams/") {
        json!({
            "results": [{
                "id": 7,
                "team_id": "Alpha-1",
                "station": 2,
                "station_name": "Central",
                "team_leader": 3,
                "members_count": 4,
                "is_active": true
            }],
            "total_count": 1
        })
    } else if url.contains("/police/dashboard-stats/") {
        json!({"total_reports": 12, "active_sos_alerts": 1, "patrol_teams_active": 1})
    } else if url.contains("/police/police-officers/") {
        json!({"officers": [{"id": 3, "name": "Arjun Singh"}], "total_count": 1})
    } else {
        panic!("no canned body for {url}")
    }
}

/// Resolve every HTTP request in the batch with its canned 200 answer,
/// returning whatever effects the settlements raise.
fn settle_requests(
    app: &AppTester<App, Effect>,
    model: &mut Model,
    requests: Vec<Request<HttpRequest>>,
) -> Vec<Effect> {
    let mut effects = Vec::new();
    for mut request in requests {
        let body = canned_body(&request.operation.url);
        let update = app
            .resolve(&mut request, ok_json(&body))
            .expect("fetch resolves");
        effects.extend(feed(app, model, update));
    }
    effects
}

#[test]
fn boot_restores_a_stored_session_and_fans_out_the_refresh() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    // 1. Cold start issues one read per stored slot and stays on the boot
    //    screen until all three answer.
    let update = app.update(
        Event::Started {
            now_ms: NOW,
            api_base: Some(API.to_owned()),
        },
        &mut model,
    );
    let mut reads: Vec<_> = update
        .effects
        .into_iter()
        .filter_map(Effect::into_storage)
        .collect();
    let keys: Vec<String> = reads
        .iter()
        .map(|request| match &request.operation {
            KeyValueOperation::Get { key } => key.clone(),
            other => panic!("expected a read, got {other:?}"),
        })
        .collect();
    assert_eq!(keys, ["user", "token", "loginTimestamp"]);
    assert!(matches!(app.view(&model).screen, Screen::Booting));

    // 2. The last slot answer settles the verdict and logs the operator in.
    let mut effects = Vec::new();
    for request in &mut reads {
        let KeyValueOperation::Get { key } = request.operation.clone() else {
            unreachable!()
        };
        let resolved = app
            .resolve(
                request,
                KeyValueResult::Ok {
                    response: KeyValueResponse::Get {
                        value: stored_slot(&key),
                    },
                },
            )
            .expect("storage read resolves");
        effects.extend(feed(&app, &mut model, resolved));
    }
    assert!(matches!(model.auth, AuthState::LoggedIn(_)));

    // 3. Login fans out one authorized GET per collection, in one batch.
    let (requests, timers) = split(effects);
    let urls: Vec<String> = requests
        .iter()
        .map(|request| request.operation.url.clone())
        .collect();
    assert_eq!(
        urls,
        [
            format!("{API}/police/reports/?type=all"),
            format!("{API}/police/sos-alerts/"),
            format!("{API}/police/volunteers/"),
            format!("{API}/police/patrol-teams/"),
            format!("{API}/police/dashboard-stats/"),
        ]
    );
    for request in &requests {
        assert_eq!(request.operation.method, "GET");
        assert!(has_bearer(&request.operation));
    }

    // 4. Plus the per-cycle deadline and the next poll tick.
    let delays: Vec<u64> = timers.iter().map(|timer| timer.operation.delay_ms).collect();
    assert_eq!(delays, [15_000, 30_000]);

    let Screen::Dashboard(board) = app.view(&model).screen else {
        panic!("expected the dashboard after a restored session");
    };
    assert_eq!(board.operator_name.as_deref(), Some("Inspector Rao"));
    assert!(board.refreshing);
}

#[test]
fn an_absent_session_boots_to_the_login_screen() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(
        Event::Started {
            now_ms: NOW,
            api_base: None,
        },
        &mut model,
    );
    let mut reads: Vec<_> = update
        .effects
        .into_iter()
        .filter_map(Effect::into_storage)
        .collect();
    assert_eq!(reads.len(), 3);

    let mut effects = Vec::new();
    for request in &mut reads {
        let resolved = app
            .resolve(
                request,
                KeyValueResult::Ok {
                    response: KeyValueResponse::Get { value: Value::None },
                },
            )
            .expect("storage read resolves");
        effects.extend(feed(&app, &mut model, resolved));
    }

    // Nothing to restore: no fan-out, no purge, a quiet login screen.
    assert_eq!(http_count(&effects), 0);
    assert!(matches!(model.auth, AuthState::LoggedOut { error: None }));
    let Screen::Login { notice } = app.view(&model).screen else {
        panic!("expected the login screen");
    };
    assert_eq!(notice, None);
}

#[test]
fn an_expired_session_is_purged_and_fails_closed() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(
        Event::Started {
            now_ms: NOW,
            api_base: Some(API.to_owned()),
        },
        &mut model,
    );
    let mut reads: Vec<_> = update
        .effects
        .into_iter()
        .filter_map(Effect::into_storage)
        .collect();

    let mut effects = Vec::new();
    for request in &mut reads {
        let KeyValueOperation::Get { key } = request.operation.clone() else {
            unreachable!()
        };
        let value = if key == "loginTimestamp" {
            Value::Bytes((NOW - SESSION_MAX_AGE_MS - 1).to_string().into_bytes())
        } else {
            stored_slot(&key)
        };
        let resolved = app
            .resolve(
                request,
                KeyValueResult::Ok {
                    response: KeyValueResponse::Get { value },
                },
            )
            .expect("storage read resolves");
        effects.extend(feed(&app, &mut model, resolved));
    }

    // The stale credentials are cleared instead of restored.
    assert_eq!(http_count(&effects), 0);
    let deletes: Vec<String> = effects
        .into_iter()
        .filter_map(Effect::into_storage)
        .map(|request| match &request.operation {
            KeyValueOperation::Delete { key } => key.clone(),
            other => panic!("expected a delete, got {other:?}"),
        })
        .collect();
    assert_eq!(deletes, ["user", "token", "loginTimestamp"]);

    let Screen::Login { notice } = app.view(&model).screen else {
        panic!("expected the login screen");
    };
    assert_eq!(notice.as_deref(), Some("Session expired. Please log in again."));
}

#[test]
fn each_collection_settles_on_its_own() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    // 1. The first cycle succeeds across the board.
    let effects = boot_logged_in(&app, &mut model);
    let (requests, mut timers) = split(effects);
    let follow = settle_requests(&app, &mut model, requests);
    assert_eq!(http_count(&follow), 0);
    assert!(model.inflight.is_none());
    assert_eq!(model.volunteers.data.results.len(), 1);
    assert_eq!(model.volunteers.synced_at, Some(UnixTimeMs(NOW)));

    // 2. The poll tick fans out a second cycle thirty seconds later.
    let mut tick = find_timer(&mut timers, 30_000);
    let update = app
        .resolve(&mut tick, TimerElapsed { now_ms: NOW + 30_000 })
        .expect("tick resolves");
    let effects = feed(&app, &mut model, update);
    let (mut requests, _timers) = split(effects);
    assert_eq!(requests.len(), 5);

    // 3. Volunteers answer 500 while the other four settle fine.
    let mut volunteers = find_request(&mut requests, "/police/volunteers/");
    let update = app
        .resolve(
            &mut volunteers,
            HttpResult::Ok(HttpResponse::status(500).build()),
        )
        .expect("failed fetch resolves");
    feed(&app, &mut model, update);
    settle_requests(&app, &mut model, requests);

    // 4. Four panels are fresh; the fifth keeps its last good data and is
    //    marked stale from the moment the failure landed.
    assert!(model.inflight.is_none());
    assert_eq!(model.reports.synced_at, Some(UnixTimeMs(NOW + 30_000)));
    assert!(!model.reports.is_stale());
    assert_eq!(model.volunteers.synced_at, Some(UnixTimeMs(NOW)));
    assert_eq!(model.volunteers.stale_since, Some(UnixTimeMs(NOW + 30_000)));
    assert_eq!(model.volunteers.data.results.len(), 1);
    let error = model.volunteers.last_error.as_ref().expect("a kept error");
    assert_eq!(error.kind, ErrorKind::HttpStatus(500));

    // 5. Exactly one failure toast for the whole cycle.
    let failures: Vec<_> = model
        .toasts
        .iter()
        .filter(|toast| toast.kind == ToastKind::Error)
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].message, "Sync failed: Server error (500)");
}

#[test]
fn the_refresh_deadline_times_out_straggling_collections() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let effects = boot_logged_in(&app, &mut model);
    let (mut requests, mut timers) = split(effects);

    // Three collections answer in time.
    for fragment in ["?type=all", "/police/sos-alerts/", "/police/dashboard-stats/"] {
        let mut request = find_request(&mut requests, fragment);
        let body = canned_body(&request.operation.url);
        let update = app
            .resolve(&mut request, ok_json(&body))
            .expect("fetch resolves");
        feed(&app, &mut model, update);
    }

    // The deadline settles the two stragglers as timed out.
    let mut deadline = find_timer(&mut timers, 15_000);
    let update = app
        .resolve(&mut deadline, TimerElapsed { now_ms: NOW + 15_000 })
        .expect("deadline resolves");
    let effects = feed(&app, &mut model, update);
    assert_eq!(http_count(&effects), 0);

    assert!(model.inflight.is_none());
    assert!(!model.reports.is_stale());
    assert!(model.volunteers.is_stale());
    assert!(model.teams.is_stale());
    assert_eq!(
        model.volunteers.last_error.as_ref().map(|error| error.kind),
        Some(ErrorKind::Timeout)
    );
    let failures: Vec<_> = model
        .toasts
        .iter()
        .filter(|toast| toast.kind == ToastKind::Error)
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].message, "Sync failed: Request timed out");

    // An answer limping in after the deadline changes nothing.
    let mut volunteers = find_request(&mut requests, "/police/volunteers/");
    let body = canned_body(&volunteers.operation.url);
    let update = app
        .resolve(&mut volunteers, ok_json(&body))
        .expect("late fetch resolves");
    feed(&app, &mut model, update);
    assert!(model.volunteers.is_stale());
    assert!(model.volunteers.data.results.is_empty());
}

#[test]
fn late_answers_from_a_superseded_refresh_are_discarded() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let effects = boot_logged_in(&app, &mut model);
    let (mut first_requests, _timers) = split(effects);

    // A manual refresh supersedes the first cycle before it settles.
    let update = app.update(Event::RefreshRequested, &mut model);
    let (mut second_requests, _timers) = split(update.effects);
    assert_eq!(second_requests.len(), 5);

    // The superseded answer is dropped on arrival.
    let mut old_reports = find_request(&mut first_requests, "?type=all");
    let body = canned_body(&old_reports.operation.url);
    let update = app
        .resolve(&mut old_reports, ok_json(&body))
        .expect("old fetch resolves");
    feed(&app, &mut model, update);
    assert_eq!(model.reports.synced_at, None);
    assert!(model.inflight.expect("a live refresh").pending.reports);

    // The current cycle's answer lands normally.
    let mut new_reports = find_request(&mut second_requests, "?type=all");
    let body = canned_body(&new_reports.operation.url);
    let update = app
        .resolve(&mut new_reports, ok_json(&body))
        .expect("new fetch resolves");
    feed(&app, &mut model, update);
    assert_eq!(model.reports.synced_at, Some(UnixTimeMs(NOW)));
    assert!(!model.inflight.expect("a live refresh").pending.reports);
}

#[test]
fn a_401_answer_logs_the_operator_out_and_purges_the_session() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let effects = boot_logged_in(&app, &mut model);
    let (mut requests, _timers) = split(effects);

    let mut reports = find_request(&mut requests, "?type=all");
    let update = app
        .resolve(&mut reports, HttpResult::Ok(HttpResponse::status(401).build()))
        .expect("rejected fetch resolves");
    let effects = feed(&app, &mut model, update);

    // Credentials are cleared and everything fetched with them is dropped.
    let deletes: Vec<String> = effects
        .into_iter()
        .filter_map(Effect::into_storage)
        .map(|request| match &request.operation {
            KeyValueOperation::Delete { key } => key.clone(),
            other => panic!("expected a delete, got {other:?}"),
        })
        .collect();
    assert_eq!(deletes, ["user", "token", "loginTimestamp"]);
    assert!(matches!(model.auth, AuthState::LoggedOut { error: Some(_) }));
    assert!(!model.polling);
    assert!(model.inflight.is_none());
    assert!(model.reports.data.results.is_empty());

    let Screen::Login { notice } = app.view(&model).screen else {
        panic!("expected the login screen");
    };
    assert_eq!(notice.as_deref(), Some("Session expired. Please log in again."));

    // Sibling answers that were already out die quietly.
    let mut sos = find_request(&mut requests, "/police/sos-alerts/");
    let body = canned_body(&sos.operation.url);
    let update = app
        .resolve(&mut sos, ok_json(&body))
        .expect("sibling fetch resolves");
    let effects = feed(&app, &mut model, update);
    assert_eq!(http_count(&effects), 0);
    assert!(model.sos_alerts.data.results.is_empty());
}

#[test]
fn a_command_runs_one_toast_through_its_whole_lifecycle() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let effects = boot_logged_in(&app, &mut model);
    let (requests, _timers) = split(effects);
    settle_requests(&app, &mut model, requests);

    // 1. Dispatch pushes a sticky loading toast and one PATCH.
    let update = app.update(
        Event::StatusUpdateRequested {
            report: ReportId(41),
            status: ReportStatus::Investigating,
        },
        &mut model,
    );
    let (mut requests, _timers) = split(update.effects);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].operation.method, "PATCH");
    assert_eq!(
        requests[0].operation.url,
        format!("{API}/police/reports/41/status/")
    );
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&requests[0].operation.body).unwrap(),
        json!({"status": "investigating"})
    );
    assert!(has_bearer(&requests[0].operation));

    assert_eq!(model.toasts.len(), 1);
    let toast_id = model.toasts[0].id;
    assert_eq!(model.toasts[0].kind, ToastKind::Loading);
    assert_eq!(model.toasts[0].message, "Updating status to investigating...");
    assert_eq!(app.view(&model).toasts[0].duration_ms, None);

    // 2. Success settles the same toast in place.
    let mut request = requests.remove(0);
    let update = app
        .resolve(&mut request, ok_json(&json!({"message": "Status updated"})))
        .expect("command resolves");
    let effects = feed(&app, &mut model, update);

    assert_eq!(model.toasts.len(), 1);
    assert_eq!(model.toasts[0].id, toast_id);
    assert_eq!(model.toasts[0].kind, ToastKind::Success);
    assert_eq!(model.toasts[0].message, "Status updated to investigating");
    assert_eq!(app.view(&model).toasts[0].duration_ms, Some(2000));

    // 3. A successful mutation re-runs the collection fan-out at once.
    let (requests, timers) = split(effects);
    assert_eq!(requests.len(), 5);
    let delays: Vec<u64> = timers.iter().map(|timer| timer.operation.delay_ms).collect();
    assert_eq!(delays, [15_000]);
}

#[test]
fn a_rejected_command_surfaces_the_backend_reason() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let effects = boot_logged_in(&app, &mut model);
    let (requests, _timers) = split(effects);
    settle_requests(&app, &mut model, requests);

    // 1. Assignment without a pick is rejected locally, no request made.
    let update = app.update(
        Event::TeamAssignRequested {
            alert: SosId(9),
            team: None,
        },
        &mut model,
    );
    assert_eq!(http_count(&update.effects), 0);
    let toast = model.toasts.last().unwrap();
    assert_eq!(toast.kind, ToastKind::Error);
    assert_eq!(toast.message, "Please select a team");

    // 2. A real pick labels the toast with the unit callsign.
    let update = app.update(
        Event::TeamAssignRequested {
            alert: SosId(9),
            team: Some(TeamId(7)),
        },
        &mut model,
    );
    let (mut requests, _timers) = split(update.effects);
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].operation.url,
        format!("{API}/police/sos-alerts/9/assign-team/")
    );
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&requests[0].operation.body).unwrap(),
        json!({"team_id": 7})
    );
    assert_eq!(
        model.toasts.last().unwrap().message,
        "Assigning Alpha-1 (Central)..."
    );

    // 3. The backend's own words beat the canned failure copy.
    let mut request = requests.remove(0);
    let update = app
        .resolve(
            &mut request,
            HttpResult::Ok(
                HttpResponse::status(400)
                    .body(json!({"error": "Team is off duty"}).to_string())
                    .build(),
            ),
        )
        .expect("rejected command resolves");
    let effects = feed(&app, &mut model, update);
    let toast = model.toasts.last().unwrap();
    assert_eq!(toast.kind, ToastKind::Error);
    assert_eq!(toast.message, "Team is off duty");

    // Failures never re-run the fan-out.
    assert_eq!(http_count(&effects), 0);
}

#[test]
fn a_confirmed_resolve_falls_back_to_its_network_copy() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    boot_logged_in(&app, &mut model);

    // Resolution is confirm-gated; nothing goes out until accepted.
    let update = app.update(Event::SosResolveRequested { alert: SosId(9) }, &mut model);
    assert_eq!(http_count(&update.effects), 0);
    assert_eq!(
        app.view(&model).confirm.unwrap().message,
        "Mark this emergency as resolved?"
    );

    let update = app.update(Event::ConfirmAccepted, &mut model);
    assert!(model.confirm.is_none());
    let (mut requests, _timers) = split(update.effects);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].operation.method, "POST");
    assert_eq!(requests[0].operation.url, format!("{API}/sos/resolve/9/"));
    assert!(requests[0].operation.body.is_empty());

    // The request never reaches the backend; the toast gets the dedicated
    // resolve fallback rather than generic network copy.
    let mut request = requests.remove(0);
    let update = app
        .resolve(
            &mut request,
            HttpResult::Err(crux_http::Error::Io("connection refused".to_string())),
        )
        .expect("failed command resolves");
    feed(&app, &mut model, update);
    let toast = model.toasts.last().unwrap();
    assert_eq!(toast.kind, ToastKind::Error);
    assert_eq!(toast.message, "Failed to resolve emergency");
}

#[test]
fn declining_a_confirmation_leaves_the_model_untouched() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let effects = boot_logged_in(&app, &mut model);
    let (requests, _timers) = split(effects);
    settle_requests(&app, &mut model, requests);

    let snapshot = model.clone();
    let update = app.update(Event::TeamDeleteRequested { team: TeamId(7) }, &mut model);
    assert_eq!(http_count(&update.effects), 0);
    assert_eq!(
        app.view(&model).confirm.unwrap().message,
        "Are you sure you want to delete this patrol team? This action cannot be undone."
    );

    let update = app.update(Event::ConfirmDismissed, &mut model);
    assert_eq!(http_count(&update.effects), 0);
    assert_eq!(model, snapshot);

    // Accepting with nothing pending is also a no-op.
    let update = app.update(Event::ConfirmAccepted, &mut model);
    assert_eq!(http_count(&update.effects), 0);
    assert_eq!(model, snapshot);
}

#[test]
fn the_broadcast_dialog_collects_title_and_message_then_confirms() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    boot_logged_in(&app, &mut model);

    app.update(Event::BroadcastRequested, &mut model);
    assert_eq!(
        app.view(&model).prompt.unwrap().label,
        "EMERGENCY BROADCAST\n\nAlert Title:"
    );

    // Title input is trimmed before it is kept.
    app.update(
        Event::PromptSubmitted {
            input: "  Citywide curfew  ".to_owned(),
        },
        &mut model,
    );
    assert_eq!(app.view(&model).prompt.unwrap().label, "Alert Message:");

    app.update(
        Event::PromptSubmitted {
            input: "Stay indoors until 06:00".to_owned(),
        },
        &mut model,
    );
    assert!(model.prompt.is_none());
    assert_eq!(
        app.view(&model).confirm.unwrap().message,
        "Broadcast to all units and citizens?\n\nTitle: Citywide curfew\nMessage: Stay indoors until 06:00"
    );

    let update = app.update(Event::ConfirmAccepted, &mut model);
    let (mut requests, _timers) = split(update.effects);
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].operation.url,
        format!("{API}/police/official-alerts/")
    );
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&requests[0].operation.body).unwrap(),
        json!({
            "title": "Citywide curfew",
            "message": "Stay indoors until 06:00",
            "alert_type": "emergency"
        })
    );
    assert_eq!(
        model.toasts.last().unwrap().message,
        "Broadcasting emergency alert..."
    );

    // A broadcast touches no polled collection, so success skips the refresh.
    let mut request = requests.remove(0);
    let update = app
        .resolve(&mut request, ok_json(&json!({"message": "Alert broadcast"})))
        .expect("broadcast resolves");
    let effects = feed(&app, &mut model, update);
    let toast = model.toasts.last().unwrap();
    assert_eq!(toast.kind, ToastKind::Success);
    assert_eq!(toast.message, "Emergency alert broadcasted to all units");
    assert_eq!(http_count(&effects), 0);
}

#[test]
fn a_blank_prompt_input_abandons_the_broadcast() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    app.update(Event::BroadcastRequested, &mut model);
    let update = app.update(
        Event::PromptSubmitted {
            input: "   ".to_owned(),
        },
        &mut model,
    );

    assert_eq!(http_count(&update.effects), 0);
    assert!(model.prompt.is_none());
    assert!(model.confirm.is_none());
    assert!(model.toasts.is_empty());
}

#[test]
fn changing_the_type_filter_narrows_the_reports_query() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let effects = boot_logged_in(&app, &mut model);
    let (requests, _timers) = split(effects);
    settle_requests(&app, &mut model, requests);

    let update = app.update(
        Event::TypeFilterChanged {
            report_type: Some(ReportType::Crime),
        },
        &mut model,
    );
    let (requests, _timers) = split(update.effects);
    assert_eq!(requests.len(), 5);
    assert_eq!(
        requests[0].operation.url,
        format!("{API}/police/reports/?type=crime")
    );
}

#[test]
fn the_teams_section_pulls_the_officer_roster_after_the_fan_out() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    // The emergency board never asks for the roster.
    let effects = boot_logged_in(&app, &mut model);
    let (requests, _timers) = split(effects);
    let follow = settle_requests(&app, &mut model, requests);
    assert_eq!(http_count(&follow), 0);

    // Switching to the teams board restarts the schedule; once that cycle
    // settles it tops up with the roster. Stations wait for a location fix.
    let update = app.update(
        Event::SectionSelected {
            section: DashboardSection::Teams,
        },
        &mut model,
    );
    let (requests, _timers) = split(update.effects);
    assert_eq!(requests.len(), 5);
    let follow = settle_requests(&app, &mut model, requests);
    let (mut requests, _timers) = split(follow);
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].operation.url,
        format!("{API}/police/police-officers/")
    );

    let mut roster = requests.remove(0);
    let body = canned_body(&roster.operation.url);
    let update = app
        .resolve(&mut roster, ok_json(&body))
        .expect("roster resolves");
    feed(&app, &mut model, update);
    assert_eq!(model.officers.data.officers.len(), 1);
    assert_eq!(model.officers.data.officers[0].name, "Arjun Singh");
}

#[test]
fn enabling_location_narrows_the_polled_queries() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let effects = boot_logged_in(&app, &mut model);
    let (requests, _timers) = split(effects);
    settle_requests(&app, &mut model, requests);

    // The first toggle has no fix yet, so it asks the shell for one.
    let update = app.update(Event::LocationToggleRequested, &mut model);
    let mut fixes: Vec<_> = update
        .effects
        .into_iter()
        .filter_map(Effect::into_location)
        .collect();
    assert_eq!(fixes.len(), 1);
    assert!(model.location.requesting);

    let update = app
        .resolve(
            &mut fixes[0],
            LocationOutput::Fix {
                latitude: 12.9716,
                longitude: 77.5946,
            },
        )
        .expect("fix resolves");
    let effects = feed(&app, &mut model, update);

    assert!(model.location.enabled);
    assert!(!model.location.requesting);
    let toast = model.toasts.last().unwrap();
    assert_eq!(toast.kind, ToastKind::Success);
    assert_eq!(toast.message, "Location enabled");

    // Reports, alerts and stats narrow; rosters stay city-wide.
    let (requests, _timers) = split(effects);
    let urls: Vec<&str> = requests
        .iter()
        .map(|request| request.operation.url.as_str())
        .collect();
    assert_eq!(
        urls[0],
        format!("{API}/police/reports/?type=all&latitude=12.9716&longitude=77.5946&radius=5")
    );
    assert_eq!(
        urls[1],
        format!("{API}/police/sos-alerts/?latitude=12.9716&longitude=77.5946&radius=5")
    );
    assert!(urls[2].ends_with("/police/volunteers/"));
    assert!(urls[3].ends_with("/police/patrol-teams/"));
    assert_eq!(
        urls[4],
        format!("{API}/police/dashboard-stats/?latitude=12.9716&longitude=77.5946&radius=5")
    );

    // Widening the radius refetches with the new bound.
    let update = app.update(Event::RadiusSelected { radius_km: 10 }, &mut model);
    let (requests, _timers) = split(update.effects);
    assert!(requests[0].operation.url.ends_with("radius=10"));

    // A radius outside the offered set is refused outright.
    let update = app.update(Event::RadiusSelected { radius_km: 7 }, &mut model);
    assert_eq!(http_count(&update.effects), 0);
    assert_eq!(model.location.radius_km, 10);
}

#[test]
fn a_denied_location_request_leaves_filtering_off() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let effects = boot_logged_in(&app, &mut model);
    let (requests, _timers) = split(effects);
    settle_requests(&app, &mut model, requests);

    let update = app.update(Event::LocationToggleRequested, &mut model);
    let mut fixes: Vec<_> = update
        .effects
        .into_iter()
        .filter_map(Effect::into_location)
        .collect();
    let update = app
        .resolve(&mut fixes[0], LocationOutput::PermissionDenied)
        .expect("denial resolves");
    let effects = feed(&app, &mut model, update);

    assert_eq!(http_count(&effects), 0);
    assert!(!model.location.enabled);
    assert!(!model.location.requesting);
    let toast = model.toasts.last().unwrap();
    assert_eq!(toast.kind, ToastKind::Error);
    assert_eq!(toast.message, "Unable to access location");

    // The next toggle asks the shell again rather than giving up.
    let update = app.update(Event::LocationToggleRequested, &mut model);
    let fixes: Vec<_> = update
        .effects
        .into_iter()
        .filter_map(Effect::into_location)
        .collect();
    assert_eq!(fixes.len(), 1);
}

#[test]
fn stale_poll_ticks_die_after_the_schedule_restarts() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let effects = boot_logged_in(&app, &mut model);
    let (requests, mut timers) = split(effects);
    settle_requests(&app, &mut model, requests);
    let mut old_tick = find_timer(&mut timers, 30_000);

    // Switching boards restarts the schedule under a fresh epoch.
    let update = app.update(
        Event::SectionSelected {
            section: DashboardSection::Incidents,
        },
        &mut model,
    );
    let (requests, _timers) = split(update.effects);
    assert_eq!(requests.len(), 5);
    let generation_after_switch = model.refresh_generation;

    // The tick armed before the switch fires late and is ignored.
    let update = app
        .resolve(&mut old_tick, TimerElapsed { now_ms: NOW + 30_000 })
        .expect("stale tick resolves");
    let effects = feed(&app, &mut model, update);
    assert_eq!(http_count(&effects), 0);
    assert_eq!(model.refresh_generation, generation_after_switch);
}
