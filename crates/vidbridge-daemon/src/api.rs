//! REST API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use vidbridge_core::{
    BridgeContext, BridgeError, ControlId, ControlInfo, ControlValue, InputId, InputInfo,
    MbusFormat, OutputLane, PictureControl, RoutingSnapshot, TimingSnapshot, VideoStandard,
};

use crate::state::{AppState, BridgeEvent};

/// API error response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            error: msg.into(),
        }
    }
}

fn status_of(err: &BridgeError) -> StatusCode {
    match err {
        BridgeError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        BridgeError::NotReady(_) | BridgeError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
        BridgeError::Busy => StatusCode::CONFLICT,
        BridgeError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
        BridgeError::NotSupported { .. } => StatusCode::NOT_IMPLEMENTED,
        BridgeError::Catalogue(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self::new(status_of(&err), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.error })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run device work off the async executor
///
/// Register sequences sleep between transactions, so every call that may
/// reach hardware goes through here.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> vidbridge_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            error!(error = %e, "Device task failed");
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Device task failed"))
        }
    }
}

fn parse_control(name: &str) -> Result<ControlId, ApiError> {
    name.parse::<ControlId>().map_err(ApiError::from)
}

/// List all logical inputs
pub async fn list_inputs(State(state): State<Arc<AppState>>) -> ApiResult<Vec<InputInfo>> {
    Ok(Json(state.context.inputs()?))
}

/// Get a specific input by ID
pub async fn get_input(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> ApiResult<InputInfo> {
    Ok(Json(state.context.input(InputId(id))?))
}

/// Route request body
#[derive(Deserialize)]
pub struct RouteRequest {
    output: OutputLane,
}

/// Bind an input to one of its device's output lanes
pub async fn route_input(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Json(req): Json<RouteRequest>,
) -> ApiResult<InputInfo> {
    let id = InputId(id);
    info!(input = %id, output = %req.output, "Route requested");

    let context = state.context.clone();
    let input = blocking(move || context.route_input(id, req.output)).await?;
    state.publish(BridgeEvent::Routed {
        input: input.clone(),
        output: req.output,
    });
    Ok(Json(input))
}

/// Re-query the backing device for signal presence
pub async fn refresh_input(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> ApiResult<InputInfo> {
    let context = state.context.clone();
    Ok(Json(blocking(move || context.refresh_signal(InputId(id))).await?))
}

/// Control descriptors
pub async fn list_controls() -> Json<Vec<ControlInfo>> {
    Json(ControlId::ALL.iter().map(|c| c.info()).collect())
}

pub async fn get_control(
    State(state): State<Arc<AppState>>,
    Path((id, control)): Path<(u32, String)>,
) -> ApiResult<ControlValue> {
    let control = parse_control(&control)?;
    let context = state.context.clone();
    let value = blocking(move || context.get_control(InputId(id), control)).await?;
    Ok(Json(ControlValue { id: control, value }))
}

/// Control write body
#[derive(Deserialize)]
pub struct ValueRequest {
    value: i64,
}

pub async fn set_control(
    State(state): State<Arc<AppState>>,
    Path((id, control)): Path<(u32, String)>,
    Json(req): Json<ValueRequest>,
) -> ApiResult<ControlValue> {
    let control = parse_control(&control)?;
    let context = state.context.clone();
    blocking(move || context.set_control(InputId(id), control, req.value)).await?;
    Ok(Json(ControlValue {
        id: control,
        value: req.value,
    }))
}

/// Apply a batch of control values, returning the re-read cluster
pub async fn apply_controls(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Json(values): Json<Vec<ControlValue>>,
) -> ApiResult<Vec<ControlValue>> {
    let context = state.context.clone();
    Ok(Json(
        blocking(move || context.apply_controls(InputId(id), &values)).await?,
    ))
}

/// Device summary
#[derive(Debug, Serialize)]
pub struct DeviceInfo {
    name: String,
    /// Absent when the device cannot report its routing
    routing: Option<RoutingSnapshot>,
    inputs: Vec<InputId>,
}

fn describe(context: &BridgeContext, name: &str) -> vidbridge_core::Result<DeviceInfo> {
    let device = context.find_device(name)?;
    let inputs = context
        .inputs()?
        .into_iter()
        .filter(|i| i.device == name)
        .map(|i| i.id)
        .collect();
    Ok(DeviceInfo {
        name: device.name().to_string(),
        routing: device.routing().ok(),
        inputs,
    })
}

/// List attached devices in attach order
pub async fn list_devices(State(state): State<Arc<AppState>>) -> ApiResult<Vec<DeviceInfo>> {
    let context = state.context.clone();
    let devices = blocking(move || {
        context
            .devices()?
            .iter()
            .map(|d| describe(&context, d.name()))
            .collect::<vidbridge_core::Result<Vec<_>>>()
    })
    .await?;
    Ok(Json(devices))
}

pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<DeviceInfo> {
    let context = state.context.clone();
    Ok(Json(blocking(move || describe(&context, &name)).await?))
}

/// Stream request body
#[derive(Deserialize)]
pub struct StreamRequest {
    on: bool,
}

/// Start or stop streaming on a device
pub async fn set_stream(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<StreamRequest>,
) -> Result<StatusCode, ApiError> {
    let device = state.context.find_device(&name)?;
    info!(device = %name, on = req.on, "Stream requested");
    blocking(move || device.set_stream(req.on)).await?;
    state.publish(BridgeEvent::StreamChanged {
        device: name,
        on: req.on,
    });
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_timings(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<TimingSnapshot> {
    let device = state.context.find_device(&name)?;
    Ok(Json(blocking(move || device.query_timings()).await?))
}

pub async fn get_standard(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<VideoStandard> {
    let device = state.context.find_device(&name)?;
    Ok(Json(blocking(move || device.query_standard()).await?))
}

pub async fn get_format(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<MbusFormat> {
    let device = state.context.find_device(&name)?;
    Ok(Json(blocking(move || device.mbus_format()).await?))
}

/// Adjust brightness, contrast, saturation or hue
pub async fn set_picture(
    State(state): State<Arc<AppState>>,
    Path((name, control)): Path<(String, PictureControl)>,
    Json(req): Json<ValueRequest>,
) -> Result<StatusCode, ApiError> {
    let value = i32::try_from(req.value)
        .map_err(|_| BridgeError::invalid(format!("{} out of range", req.value)))?;
    let device = state.context.find_device(&name)?;
    blocking(move || device.set_picture_control(control, value)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Detach a device and drop its inputs
pub async fn remove_device(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Vec<InputId>> {
    let removed = state.context.detach(&name)?;
    for id in &removed {
        state.publish(BridgeEvent::InputRemoved(*id));
    }
    state.publish(BridgeEvent::DeviceDetached {
        device: name,
        inputs: removed.clone(),
    });
    Ok(Json(removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::broadcast;
    use vidbridge_core::{BridgeDevice, Catalogue};

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (BridgeError::invalid("x"), StatusCode::BAD_REQUEST),
            (BridgeError::not_ready("x"), StatusCode::SERVICE_UNAVAILABLE),
            (BridgeError::Transport("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (BridgeError::Busy, StatusCode::CONFLICT),
            (BridgeError::Timeout("x".into()), StatusCode::GATEWAY_TIMEOUT),
            (BridgeError::not_found("x"), StatusCode::NOT_FOUND),
            (BridgeError::not_supported("dev", "route"), StatusCode::NOT_IMPLEMENTED),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    struct Gated {
        gate: Arc<Mutex<()>>,
    }

    impl BridgeDevice for Gated {
        fn name(&self) -> &str {
            "gated"
        }

        fn routing(&self) -> vidbridge_core::Result<RoutingSnapshot> {
            let _held = self.gate.lock()?;
            Ok(RoutingSnapshot {
                powered: true,
                mode: None,
                lane_a: None,
                lane_b: None,
                lanes: 1,
            })
        }
    }

    fn gated_state(gate: Arc<Mutex<()>>) -> Arc<AppState> {
        let catalogue = Catalogue::from_toml(
            r#"
[[input]]
category = "hdmi"
index = 0
name = "HDMI-0"
code = "hdmi-0"
output = 0
device = "gated"
"#,
        )
        .unwrap();
        let context = Arc::new(BridgeContext::new(catalogue));
        context.attach(Arc::new(Gated { gate })).unwrap();
        let (events, _) = broadcast::channel(4);
        Arc::new(AppState {
            context,
            config: Config::default(),
            events,
        })
    }

    #[tokio::test]
    async fn test_device_listing_waits_off_executor() {
        let gate = Arc::new(Mutex::new(()));
        let state = gated_state(gate.clone());

        let held = gate.lock().unwrap();
        let listing = tokio::spawn(list_devices(State(state.clone())));
        let single = tokio::spawn(get_device(State(state), Path("gated".to_string())));

        // The executor keeps running timers while the device is busy
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!listing.is_finished());
        assert!(!single.is_finished());
        drop(held);

        let Json(devices) = listing.await.unwrap().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "gated");
        assert_eq!(devices[0].inputs, vec![InputId(0)]);
        assert!(devices[0].routing.as_ref().is_some_and(|r| r.powered));

        let Json(device) = single.await.unwrap().unwrap();
        assert_eq!(device.name, "gated");
    }

    #[tokio::test]
    async fn test_unknown_device_is_not_found() {
        let state = gated_state(Arc::new(Mutex::new(())));
        let err = get_device(State(state), Path("adv7481".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unknown_control_is_bad_request() {
        let err = parse_control("gain").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(parse_control("fps_q16").unwrap(), ControlId::FpsQ16);
    }
}
