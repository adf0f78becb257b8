use std::{
    collections::HashMap,
    future::Future,
    io::ErrorKind,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{net::TcpListener, sync::Mutex, task::JoinHandle};
use tracing::{info, warn};

use aircon_common::{
    parse_unit_topic, unit_topic, AcState, ControllerConfig, Measurement, OutdoorObservation,
    RuntimeConfig, UnitSession, UserStateUpdate, VendorAcState, CONTROLLER_SUBSCRIPTIONS,
    SUFFIX_CMD_AUTO, SUFFIX_CMD_THRESHOLDS, SUFFIX_CMD_YIELD, SUFFIX_CONTROLLER_STATE,
    SUFFIX_OUTDOOR_OBSERVATION, SUFFIX_SENSOR_MEASUREMENT, SUFFIX_UNIT_SET, SUFFIX_UNIT_STATE,
};

#[derive(Clone)]
struct AppState {
    unit_id: Arc<String>,
    session: Arc<Mutex<UnitSession>>,
    /// Held from planning until the submitted state is committed.
    decision_lock: Arc<Mutex<()>>,
    pending_update: Arc<Mutex<Option<JoinHandle<()>>>>,
    config: Arc<ControllerConfig>,
    mqtt: AsyncClient,
    store: AppStore,
}

#[derive(Clone)]
struct AppStore {
    runtime_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    runtime.sanitize();

    let unit_id =
        std::env::var("AIRCON_UNIT_ID").unwrap_or_else(|_| runtime.network.unit_id.clone());
    let session = UnitSession::new(
        unit_id.clone(),
        runtime.engine.clone(),
        runtime.controller.clone(),
        runtime.user.clone(),
    );

    let mqtt_host =
        std::env::var("MQTT_HOST").unwrap_or_else(|_| runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);

    let mut mqtt_options =
        MqttOptions::new(format!("aircon-controller-{unit_id}"), mqtt_host, mqtt_port);
    let mqtt_user =
        std::env::var("MQTT_USER").unwrap_or_else(|_| runtime.network.mqtt_user.clone());
    let mqtt_pass =
        std::env::var("MQTT_PASS").unwrap_or_else(|_| runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let app_state = AppState {
        unit_id: Arc::new(unit_id),
        session: Arc::new(Mutex::new(session)),
        decision_lock: Arc::new(Mutex::new(())),
        pending_update: Arc::new(Mutex::new(None)),
        config: Arc::new(runtime.controller.clone()),
        mqtt,
        store,
    };

    subscribe_topics(&app_state).await?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_decision_loop(app_state.clone());
    spawn_state_publish_loop(app_state.clone());

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/thresholds", post(handle_set_thresholds))
        .route("/api/auto", post(handle_set_auto))
        .route("/api/yield", post(handle_set_yield))
        .with_state(app_state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.http_port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn subscribe_topics(app_state: &AppState) -> anyhow::Result<()> {
    for suffix in CONTROLLER_SUBSCRIPTIONS {
        app_state
            .mqtt
            .subscribe(unit_topic(&app_state.unit_id, suffix), QoS::AtMostOnce)
            .await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, message.topic, message.payload.to_vec())
                            .await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

/// Re-runs the controller on the unit's measurement cadence so yield and
/// outdoor staleness take effect even when no new data arrives.
fn spawn_decision_loop(app_state: AppState) {
    tokio::spawn(async move {
        loop {
            let delay = { app_state.session.lock().await.next_poll() };
            tokio::time::sleep(delay).await;

            if let Err(err) = run_decision(&app_state).await {
                warn!("scheduled decision failed: {err:#}");
            }
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState) {
    tokio::spawn(async move {
        let topic = unit_topic(&app_state.unit_id, SUFFIX_CONTROLLER_STATE);
        let mut interval =
            tokio::time::interval(Duration::from_millis(app_state.config.state_publish_interval_ms));

        loop {
            interval.tick().await;

            let now_ms = monotonic_ms();
            let payload = {
                let session = app_state.session.lock().await;
                serde_json::to_vec(&session.status(now_ms))
            };

            match payload {
                Ok(body) => {
                    if let Err(err) = app_state
                        .mqtt
                        .publish(topic.as_str(), QoS::AtLeastOnce, true, body)
                        .await
                    {
                        warn!("controller state publish failed: {err}");
                    }
                }
                Err(err) => warn!("controller state serialization failed: {err}"),
            }
        }
    });
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: String,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let Some((unit_id, suffix)) = parse_unit_topic(&topic) else {
        return Ok(());
    };
    if unit_id != app_state.unit_id.as_str() {
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;

    match suffix {
        SUFFIX_SENSOR_MEASUREMENT => {
            let measurement = serde_json::from_str::<Measurement>(&message)
                .context("invalid measurement payload")?;
            if !is_plausible_measurement(&measurement) {
                warn!("ignoring implausible measurement: {measurement}");
                return Ok(());
            }

            app_state.session.lock().await.update_measurement(measurement);
            run_decision(app_state).await?;
        }
        SUFFIX_OUTDOOR_OBSERVATION => {
            let observation = serde_json::from_str::<OutdoorObservation>(&message)
                .context("invalid outdoor observation payload")?;
            {
                let mut session = app_state.session.lock().await;
                if is_plausible_observation(&observation) {
                    session.update_outdoor(observation, monotonic_ms());
                } else {
                    warn!("discarding implausible outdoor observation: {observation}");
                    session.clear_outdoor();
                }
            }
            run_decision(app_state).await?;
        }
        SUFFIX_UNIT_STATE => {
            let vendor = serde_json::from_str::<VendorAcState>(&message)
                .context("invalid unit state payload")?;
            let notes = { app_state.session.lock().await.apply_server_state(&vendor) };
            for note in notes {
                info!("{}: {note}", app_state.unit_id);
            }
            run_decision(app_state).await?;
        }
        SUFFIX_CMD_THRESHOLDS => {
            let update = serde_json::from_str::<UserStateUpdate>(&message)
                .context("invalid thresholds payload")?;
            if let Err(message) = validate_user_update(app_state, &update).await {
                warn!("rejecting thresholds update: {message}");
                return Ok(());
            }
            apply_user_update(app_state, &update).await;
        }
        SUFFIX_CMD_AUTO => {
            if let Some(auto_mode) = parse_switch(&message) {
                let update = UserStateUpdate {
                    auto_mode: Some(auto_mode),
                    ..UserStateUpdate::default()
                };
                apply_user_update(app_state, &update).await;
            }
        }
        SUFFIX_CMD_YIELD => {
            if let Some(yield_ac) = parse_switch(&message) {
                let changed = { app_state.session.lock().await.set_yield(yield_ac) };
                if changed {
                    run_decision(app_state).await?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Cancels any pending debounced update, then decides and submits.
async fn run_decision(app_state: &AppState) -> anyhow::Result<()> {
    let pending = app_state.pending_update.lock().await.take();
    if let Some(handle) = pending {
        handle.abort();
        if let Err(err) = persist_user_state(app_state).await {
            warn!("failed to persist user state: {err:#}");
        }
    }
    apply_decision(app_state).await
}

async fn apply_decision(app_state: &AppState) -> anyhow::Result<()> {
    let topic = unit_topic(&app_state.unit_id, SUFFIX_UNIT_SET);

    decide_and_submit(
        &app_state.session,
        &app_state.decision_lock,
        &app_state.unit_id,
        monotonic_ms(),
        move |state| async move {
            let payload = serde_json::to_vec(&state.to_vendor())
                .context("failed to serialize unit state")?;
            app_state
                .mqtt
                .publish(topic, QoS::AtLeastOnce, false, payload)
                .await
                .context("failed to publish unit state")?;
            Ok::<_, anyhow::Error>(())
        },
    )
    .await
}

/// Plans, submits and commits under `decision_lock`, so a second decision
/// for the unit only plans once the first one's state is committed.
async fn decide_and_submit<F, Fut>(
    session: &Mutex<UnitSession>,
    decision_lock: &Mutex<()>,
    unit_id: &str,
    now_ms: u64,
    submit: F,
) -> anyhow::Result<()>
where
    F: FnOnce(AcState) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let _decision = decision_lock.lock().await;

    let (decision, change) = {
        let session = session.lock().await;
        let decision = session.plan_update(now_ms);
        let change = decision
            .next_state
            .as_ref()
            .map(|state| session.describe_change(state));
        (decision, change)
    };

    for reason in &decision.reasons {
        info!("{unit_id}: {reason}");
    }

    let (Some(state), Some(change)) = (decision.next_state, change) else {
        return Ok(());
    };

    submit(state.clone()).await?;

    info!("{unit_id}: {change}");
    session.lock().await.commit(state);
    Ok(())
}

/// Restarts the debounce timer; when it fires the user state is persisted
/// and a decision is run.
async fn schedule_debounced_update(app_state: &AppState) {
    let mut pending = app_state.pending_update.lock().await;
    if let Some(handle) = pending.take() {
        handle.abort();
    }

    let state = app_state.clone();
    let delay = Duration::from_millis(app_state.config.threshold_debounce_ms);
    *pending = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        state.pending_update.lock().await.take();

        if let Err(err) = persist_user_state(&state).await {
            warn!("failed to persist user state: {err:#}");
        }
        if let Err(err) = apply_decision(&state).await {
            warn!("debounced decision failed: {err:#}");
        }
    }));
}

async fn apply_user_update(app_state: &AppState, update: &UserStateUpdate) {
    let changed = { app_state.session.lock().await.update_user_state(update) };
    if changed {
        schedule_debounced_update(app_state).await;
    }
}

async fn validate_user_update(
    app_state: &AppState,
    update: &UserStateUpdate,
) -> Result<(), String> {
    let values = [
        update.heating_threshold_temperature,
        update.cooling_threshold_temperature,
        update.target_temperature,
    ];
    if values.into_iter().flatten().any(|value| !value.is_finite()) {
        return Err("temperatures must be finite numbers".to_string());
    }

    let merged = { app_state.session.lock().await.user_state().merged(update) };
    merged.thresholds().map(|_| ()).map_err(|err| err.to_string())
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = {
        let session = state.session.lock().await;
        session.status(monotonic_ms())
    };
    Json(status)
}

async fn handle_set_thresholds(
    State(state): State<AppState>,
    Json(update): Json<UserStateUpdate>,
) -> impl IntoResponse {
    if let Err(message) = validate_user_update(&state, &update).await {
        return error_response(StatusCode::BAD_REQUEST, &message);
    }

    apply_user_update(&state, &update).await;
    handle_get_status(State(state)).await.into_response()
}

async fn handle_set_auto(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(auto_mode) = parse_switch(value) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid value. Use 'on' or 'off'");
    };

    let update = UserStateUpdate {
        auto_mode: Some(auto_mode),
        ..UserStateUpdate::default()
    };
    apply_user_update(&state, &update).await;
    handle_get_status(State(state)).await.into_response()
}

async fn handle_set_yield(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(yield_ac) = parse_switch(value) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid value. Use 'on' or 'off'");
    };

    let changed = { state.session.lock().await.set_yield(yield_ac) };
    if changed {
        if let Err(err) = run_decision(&state).await {
            warn!("failed to apply yield change: {err:#}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to submit unit state",
            );
        }
    }
    handle_get_status(State(state)).await.into_response()
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("AIRCON_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.aircon"));

        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save_runtime_config(&self, runtime: &RuntimeConfig) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.runtime_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let payload = serde_json::to_vec_pretty(runtime)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }
}

async fn persist_user_state(state: &AppState) -> anyhow::Result<()> {
    let user = state.session.lock().await.user_state().clone();

    let mut runtime = state.store.load_runtime_config().await?;
    runtime.user = user;
    state.store.save_runtime_config(&runtime).await
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn is_plausible_measurement(measurement: &Measurement) -> bool {
    measurement.temperature.is_finite()
        && (-40.0..=60.0).contains(&measurement.temperature)
        && measurement.humidity.is_finite()
        && (0.0..=100.0).contains(&measurement.humidity)
}

fn is_plausible_observation(observation: &OutdoorObservation) -> bool {
    is_plausible_measurement(&Measurement::new(
        observation.temperature,
        observation.humidity,
    ))
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use aircon_common::{AcMode, EngineConfig, UserState};

    use super::*;

    fn heating_session() -> Mutex<UnitSession> {
        let mut session = UnitSession::new(
            "study",
            EngineConfig::default(),
            ControllerConfig::default(),
            UserState {
                auto_mode: true,
                ..UserState::default()
            },
        );
        session.update_measurement(Measurement::new(18.0, 40.0));
        Mutex::new(session)
    }

    #[tokio::test]
    async fn overlapping_decisions_submit_once() {
        let session = heating_session();
        let decision_lock = Mutex::new(());
        let submissions = AtomicUsize::new(0);
        let counter = &submissions;

        let submit = move |_state: AcState| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok::<_, anyhow::Error>(())
        };

        let (first, second) = tokio::join!(
            decide_and_submit(&session, &decision_lock, "study", 0, submit),
            decide_and_submit(&session, &decision_lock, "study", 0, submit),
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(submissions.load(Ordering::SeqCst), 1);

        let committed = session.lock().await.ac_state().clone();
        assert!(committed.on);
        assert_eq!(committed.mode, AcMode::Heat);
    }

    #[tokio::test]
    async fn failed_submission_is_not_committed() {
        let session = heating_session();
        let decision_lock = Mutex::new(());

        let result = decide_and_submit(&session, &decision_lock, "study", 0, |_state| async {
            Err::<(), _>(anyhow::anyhow!("broker unavailable"))
        })
        .await;

        assert!(result.is_err());
        assert!(!session.lock().await.ac_state().on);
    }

    #[test]
    fn parses_switch_values() {
        assert_eq!(parse_switch("on"), Some(true));
        assert_eq!(parse_switch(" OFF "), Some(false));
        assert_eq!(parse_switch("1"), Some(true));
        assert_eq!(parse_switch("maybe"), None);
    }

    #[test]
    fn rejects_implausible_readings() {
        assert!(is_plausible_measurement(&Measurement::new(22.0, 45.0)));
        assert!(!is_plausible_measurement(&Measurement::new(f64::NAN, 45.0)));
        assert!(!is_plausible_measurement(&Measurement::new(22.0, 140.0)));
        assert!(!is_plausible_observation(&OutdoorObservation::new(
            -80.0, 45.0
        )));
    }
}
