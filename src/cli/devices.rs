use std::error::Error;

use crate::config::load_device_configs;

/// Print every device config found on disk, in load order
pub fn handle_devices(json: bool) -> Result<(), Box<dyn Error>> {
    let configs = load_device_configs();

    if json {
        let configs: Vec<_> = configs.into_iter().map(|(_, config)| config).collect();
        println!("{}", serde_json::to_string_pretty(&configs)?);
        return Ok(());
    }

    if configs.is_empty() {
        println!("No device configs found");
        return Ok(());
    }

    println!("{:<10} {:<16} {:<40} Path", "Id", "Protocol", "Name");
    for (path, config) in configs {
        let id = format!("{:04x}:{:04x}", config.vendor_id, config.product_id);
        let protocol = format!("{:?}", config.protocol);
        println!(
            "{id:<10} {protocol:<16} {:<40} {}",
            config.name,
            path.display()
        );
    }

    Ok(())
}
