use energomera_exporter::{
    metering_61107::{session::SystemClock, transport::SerialConnector},
    supervisor::spawn_supervised,
    ApiManager, AppStatusRecorder, Config, Iec61107Manager, PrometheusSink,
};
use log::{error, info};


#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    let default_filter = std::env::var("ENERGOMERA_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    // Without a valid config there is no meter to talk to
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let sink = match PrometheusSink::new() {
        Ok(sink) => sink,
        Err(e) => {
            error!("Unable to set up the metrics registry: {}", e);
            std::process::exit(1);
        }
    };

    /* The serial session blocks, so it gets a thread of its own. If that
     * thread ever ends the process exits. */
    let poller = Iec61107Manager::new(config.meter.clone(), SerialConnector, SystemClock, sink.clone(), AppStatusRecorder);
    spawn_supervised("meter-poller", move || poller.start_thread(), |exit| {
        error!("{}, shutting down", exit);
        std::process::exit(1);
    })?;

    let api = ApiManager::new(config, sink);
    let result = api.start_thread().await;
    info!("Web server stopped");
    result
}
