use crate::generator::profile::ScenarioConfig;
use crate::gui_bridge::model::VisualizationModel;
use crate::workflow::runner::Runner;
use anyhow::{anyhow, Result};
use radar_core::interface::RadarUnits;
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

fn gui_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

type SharedModel = Arc<RwLock<VisualizationModel>>;

/// Hosts the telemetry HTTP endpoint and runs scenarios posted to it.
pub struct GuiBridge {
    state: SharedModel,
    runner: Arc<Runner>,
    units: RadarUnits,
}

impl GuiBridge {
    pub fn new(runner: Arc<Runner>) -> Self {
        Self {
            state: Arc::new(RwLock::new(VisualizationModel::default())),
            runner,
            units: RadarUnits::default(),
        }
    }

    /// `GET /payload` returns the latest model; `POST /ingest-config` runs
    /// the posted scenario and publishes its result.
    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        let state = self.state.clone();
        let state_filter = warp::any().map(move || state.clone());
        let runner = self.runner.clone();
        let runner_filter = warp::any().map(move || runner.clone());
        let units = self.units;

        let get_route = warp::path("payload")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: SharedModel| {
                let model = state.read().map(|m| m.clone()).unwrap_or_default();
                warp::reply::json(&model)
            });

        let scenario_route = warp::path("ingest-config")
            .and(warp::post())
            .and(warp::body::json())
            .and(state_filter)
            .and(runner_filter)
            .and_then(
                move |scenario: ScenarioConfig, state: SharedModel, runner: Arc<Runner>| async move {
                    let geometry = runner.config().core.geometry;
                    let reply = match runner.execute_scenario(&scenario) {
                        Ok(result) => {
                            let model = VisualizationModel::from_result(&result, geometry, &units);
                            if let Some(name) = scenario.scenario.as_ref() {
                                log::info!(
                                    "[GUI] scenario {} -> detections {}, tracks {}",
                                    name,
                                    model.detection_count,
                                    model.tracks.len()
                                );
                            }
                            let body = json!({
                                "status": "ok",
                                "detections": model.detection_count,
                                "tracks": model.tracks.len(),
                                "description": scenario.description.clone().unwrap_or_default()
                            });
                            if let Ok(mut guard) = state.write() {
                                *guard = model;
                            }
                            warp::reply::with_status(warp::reply::json(&body), StatusCode::OK)
                        }
                        Err(err) => {
                            log::warn!("ingest-config error: {:#}", err);
                            warp::reply::with_status(
                                warp::reply::json(&json!({
                                    "status": "error",
                                    "message": format!("{:#}", err)
                                })),
                                StatusCode::BAD_REQUEST,
                            )
                        }
                    };
                    Ok::<_, warp::Rejection>(reply)
                },
            );

        get_route.or(scenario_route)
    }

    /// Serves the routes on 127.0.0.1:9000 from a background thread.
    pub fn serve(&self) -> thread::JoinHandle<()> {
        let routes = self.routes();
        thread::spawn(move || {
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    log::error!("building bridge runtime: {}", err);
                    return;
                }
            };
            runtime.block_on(async move {
                match warp::serve(routes).try_bind_ephemeral(gui_bind_address()) {
                    Ok((addr, server)) => {
                        log::info!("GUI bridge listening on http://{}", addr);
                        server.await;
                    }
                    Err(err) => log::error!("binding GUI bridge: {}", err),
                }
            });
        })
    }

    pub fn publish(&self, model: &VisualizationModel) -> Result<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| anyhow!("visualization state poisoned"))?;
        *guard = model.clone();
        println!(
            "[GUI] scan {}: detections {}, firm/coast tracks {}",
            guard.scan,
            guard.detection_count,
            guard.tracks.len()
        );
        Ok(())
    }

    pub fn publish_status(&self, message: &str) {
        println!("[GUI] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> VisualizationModel {
        self.state.read().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn units(&self) -> &RadarUnits {
        &self.units
    }
}
