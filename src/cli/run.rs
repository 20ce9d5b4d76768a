use std::error::Error;

use tokio::sync::mpsc;

use crate::{
    config::{find_device_config, DeviceConfig},
    drivers::apple_trackpad::{hid_report::PTP_REPORT_SIZE, report::TouchReport},
    pipeline::{
        client::CoordinatorClient,
        coordinator::Coordinator,
        queue::Status,
        recovery::DeviceEvent,
        transport::hidraw::{get_device_ids, HidrawTransport},
    },
};

use super::print_report;

/// Number of times the pipeline is rebuilt after it requests a restart
const MAX_RESTARTS: usize = 3;

/// Why the report loop ended
enum Outcome {
    Finished,
    RestartRequested(String),
}

/// Drive the request pipeline against the given hidraw device and print
/// every report it produces.
pub async fn handle_run(
    path: String,
    config: Option<String>,
    count: Option<usize>,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let config = match config {
        Some(config_path) => DeviceConfig::from_yaml_file(config_path)?,
        None => {
            let (vendor_id, product_id) = get_device_ids(path.as_str())?;
            find_device_config(vendor_id, product_id).ok_or_else(|| {
                format!("No device config found for {vendor_id:04x}:{product_id:04x}")
            })?
        }
    };
    log::info!("Using device config '{}'", config.name);

    let mut remaining = count;
    let mut restarts = 0;
    loop {
        let transport = HidrawTransport::open(path.as_str(), &config)?;
        let (events_tx, mut events) = mpsc::channel(8);
        let coordinator = Coordinator::new(transport, &config, events_tx)?;
        let client = coordinator
            .client()
            .ok_or("Unable to create coordinator client")?;
        let task = tokio::spawn(coordinator.run());

        let outcome = read_reports(&client, &mut events, &mut remaining, json).await;
        if let Err(e) = client.stop().await {
            log::debug!("Coordinator already stopped: {e}");
        }
        if let Err(e) = task.await? {
            log::error!("Request pipeline failed: {e}");
        }

        match outcome? {
            Outcome::Finished => break,
            Outcome::RestartRequested(reason) => {
                restarts += 1;
                if restarts > MAX_RESTARTS {
                    return Err(format!("Giving up after {MAX_RESTARTS} restarts: {reason}").into());
                }
                log::warn!("Restarting device ({restarts}/{MAX_RESTARTS}): {reason}");
            }
        }
    }

    Ok(())
}

async fn read_reports(
    client: &CoordinatorClient,
    events: &mut mpsc::Receiver<DeviceEvent>,
    remaining: &mut Option<usize>,
    json: bool,
) -> Result<Outcome, Box<dyn Error>> {
    loop {
        if *remaining == Some(0) {
            return Ok(Outcome::Finished);
        }

        tokio::select! {
            completion = client.read_report(PTP_REPORT_SIZE) => {
                let completion = completion?;
                let Some(report) = completion.report() else {
                    log::warn!("Request completed with {:?}", completion.status);
                    if completion.status == Status::Rejected {
                        return Err("Upstream request was rejected".into());
                    }
                    continue;
                };
                print_report(&TouchReport::unpack(report)?, json)?;
                if let Some(left) = remaining.as_mut() {
                    *left -= 1;
                }
            }
            event = events.recv() => {
                return match event {
                    Some(DeviceEvent::RestartRequested(reason)) => Ok(Outcome::RestartRequested(reason)),
                    None => Ok(Outcome::Finished),
                };
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                return Ok(Outcome::Finished);
            }
        }
    }
}
