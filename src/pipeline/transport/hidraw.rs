use std::{
    ffi::CString,
    sync::{Arc, Mutex},
};

use hidapi::{HidApi, HidDevice};

use crate::{
    config::DeviceConfig, drivers::apple_trackpad::parser::PacketProtocol,
    pipeline::exchange::CompletionSink, pipeline::pool::PooledBuffer,
};

use super::{Transport, TransportError};

/// Reads a hidraw device through hidapi. Every read runs on the blocking
/// thread pool and completes back into the coordinator.
pub struct HidrawTransport {
    path: String,
    device: Arc<Mutex<HidDevice>>,
    vendor_id: u16,
    protocol: PacketProtocol,
    mode_report: Option<Vec<u8>>,
    read_timeout_ms: i32,
}

/// A read bound to an opened device
pub struct HidrawRequest {
    device: Arc<Mutex<HidDevice>>,
    timeout_ms: i32,
    length: usize,
}

impl HidrawTransport {
    /// Open the given hidraw path and switch the device into multitouch mode
    pub fn open(path: &str, config: &DeviceConfig) -> Result<Self, TransportError> {
        let c_path = CString::new(path).map_err(|e| TransportError::Other(e.to_string()))?;
        let api = HidApi::new()?;
        let device = api.open_path(&c_path)?;
        let info = device.get_device_info()?;
        log::info!(
            "Opened {path} ({:04x}:{:04x}) as '{}'",
            info.vendor_id(),
            info.product_id(),
            config.name
        );

        let mut transport = Self {
            path: path.to_string(),
            device: Arc::new(Mutex::new(device)),
            vendor_id: info.vendor_id(),
            protocol: config.protocol,
            mode_report: config.multitouch_mode_report.clone(),
            read_timeout_ms: config.pipeline.read_timeout_ms,
        };
        transport.reconfigure()?;

        Ok(transport)
    }
}

/// Returns the vendor and product id of the hidraw device at the given path
pub fn get_device_ids(path: &str) -> Result<(u16, u16), TransportError> {
    let c_path = CString::new(path).map_err(|e| TransportError::Other(e.to_string()))?;
    let api = HidApi::new()?;
    let info = api
        .device_list()
        .find(|info| info.path() == c_path.as_c_str())
        .ok_or(TransportError::Disconnected)?;

    Ok((info.vendor_id(), info.product_id()))
}

impl Transport for HidrawTransport {
    type Request = HidrawRequest;

    fn protocol(&self) -> PacketProtocol {
        self.protocol
    }

    fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    fn create_request(&mut self) -> Result<Self::Request, TransportError> {
        Ok(HidrawRequest {
            device: self.device.clone(),
            timeout_ms: self.read_timeout_ms,
            length: 0,
        })
    }

    fn format_request(
        &mut self,
        request: &mut Self::Request,
        buffer: &mut PooledBuffer,
    ) -> Result<(), TransportError> {
        if buffer.capacity() == 0 {
            return Err(TransportError::Other(
                "transport buffer has no room for a report".to_string(),
            ));
        }
        request.length = buffer.capacity();
        Ok(())
    }

    fn send_read(
        &mut self,
        request: Self::Request,
        mut buffer: PooledBuffer,
        sink: CompletionSink,
    ) -> Result<(), TransportError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| TransportError::Other(e.to_string()))?;

        // A read that times out completes with zero bytes
        runtime.spawn_blocking(move || {
            let data = &mut buffer.as_mut_slice()[..request.length];
            let result = match request.device.lock() {
                Ok(device) => device
                    .read_timeout(data, request.timeout_ms)
                    .map_err(TransportError::from),
                Err(_) => Err(TransportError::Disconnected),
            };
            sink.blocking_complete(buffer, result);
        });

        Ok(())
    }

    fn reconfigure(&mut self) -> Result<(), TransportError> {
        let Some(report) = self.mode_report.as_ref() else {
            return Ok(());
        };
        let device = self.device.lock().map_err(|_| TransportError::Disconnected)?;
        log::debug!("Sending multitouch mode report to {}: {report:02x?}", self.path);
        device.send_feature_report(report.as_slice())?;

        Ok(())
    }
}
