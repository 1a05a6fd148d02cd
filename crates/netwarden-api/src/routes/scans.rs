use crate::error::{ApiError, ApiResult};
use crate::extract::AdminUser;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use netwarden_core::{Error, Host, Port, Scan, TracerouteHop};
use netwarden_runner::detect_local_network_cidr;
use netwarden_store::ServiceGroup;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct CreateScanRequest {
    #[serde(default)]
    networks: Vec<String>,
}

#[derive(Deserialize)]
pub struct ListScansQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Serialize)]
pub struct ScanDetail {
    #[serde(flatten)]
    scan: Scan,
    hosts: Vec<HostDetail>,
    artifacts: Vec<netwarden_core::Artifact>,
}

#[derive(Serialize)]
pub struct HostDetail {
    #[serde(flatten)]
    host: Host,
    ports: Vec<Port>,
    traceroute: Vec<TracerouteHop>,
}

pub async fn create_scan(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<CreateScanRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<Scan>)> {
    let networks = if body.networks.is_empty() {
        vec![detect_local_network_cidr().map_err(ApiError)?]
    } else {
        body.networks
    };

    let scan = state
        .store
        .create_scan(&Scan::join_networks(&networks), None)
        .await
        .map_err(ApiError)?;

    let store = state.store.clone();
    let output_dir = state.output_dir.clone();
    let scan_id = scan.id;
    tokio::spawn(async move {
        let orchestrator = netwarden_orchestrator::Orchestrator::new(store, output_dir);
        if let Err(e) = orchestrator.execute_scan(scan_id, &networks).await {
            tracing::error!(scan_id, error = %e, "ad hoc scan failed");
        }
    });

    Ok((axum::http::StatusCode::CREATED, Json(scan)))
}

pub async fn list_scans(
    State(state): State<AppState>,
    Query(q): Query<ListScansQuery>,
) -> ApiResult<Json<Vec<Scan>>> {
    let scans = state.store.list_scans(q.skip, q.limit).await.map_err(ApiError)?;
    Ok(Json(scans))
}

pub async fn get_scan(
    State(state): State<AppState>,
    Path(scan_id): Path<i64>,
) -> ApiResult<Json<ScanDetail>> {
    let scan = state
        .store
        .get_scan(scan_id)
        .await
        .map_err(ApiError)?
        .ok_or_else(|| ApiError(Error::NotFound(format!("scan {scan_id} not found"))))?;

    let hosts = state.store.list_hosts_for_scan(scan_id).await.map_err(ApiError)?;
    let mut host_details = Vec::with_capacity(hosts.len());
    for host in hosts {
        let ports = state.store.list_ports_for_host(host.id).await.map_err(ApiError)?;
        let traceroute = state
            .store
            .list_traceroute_for_host(host.id)
            .await
            .map_err(ApiError)?;
        host_details.push(HostDetail { host, ports, traceroute });
    }
    let artifacts = state.store.list_artifacts_for_scan(scan_id).await.map_err(ApiError)?;

    Ok(Json(ScanDetail {
        scan,
        hosts: host_details,
        artifacts,
    }))
}

pub async fn delete_scan(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(scan_id): Path<i64>,
) -> ApiResult<axum::http::StatusCode> {
    let paths = state.store.delete_scan(scan_id).await.map_err(ApiError)?;
    for path in paths {
        let _ = std::fs::remove_file(path);
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<netwarden_store::Stats>> {
    Ok(Json(state.store.stats().await.map_err(ApiError)?))
}

pub async fn unique_hosts(State(state): State<AppState>) -> ApiResult<Json<Vec<Host>>> {
    Ok(Json(state.store.unique_hosts().await.map_err(ApiError)?))
}

pub async fn unique_vms(State(state): State<AppState>) -> ApiResult<Json<Vec<Host>>> {
    Ok(Json(state.store.unique_vms().await.map_err(ApiError)?))
}

pub async fn unique_services(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ServiceGroup>>> {
    Ok(Json(state.store.services_rollup().await.map_err(ApiError)?))
}
