use netwarden_core::Config;
use netwarden_orchestrator::Scheduler;
use netwarden_store::Store;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<Config>,
    pub output_dir: PathBuf,
    pub scheduler: Arc<Scheduler>,
}
