//! Transport selection.
//!
//! The printer family shows up in one of two ways: as a HID device the kernel
//! exposes as a character node (`/dev/hidrawN`), or as the LabelManager 280
//! personality, which needs its USB interface claimed and its endpoints
//! resolved by hand. [`select_transport`] prefers the node and falls back to
//! raw USB. Nothing is transmitted during selection.

use log::{debug, info};
use rusb::{Context, Device, DeviceHandle, Direction, TransferType, UsbContext};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{device::DeviceConfig, error::Error};

const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub address: u8,
    pub direction: Direction,
    pub transfer_type: TransferType,
}

/// One interface of the active configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub number: u8,
    pub class: u8,
    pub endpoints: Vec<Endpoint>,
}

impl InterfaceInfo {
    fn endpoint(&self, direction: Direction) -> Option<Endpoint> {
        self.endpoints.iter().copied().find(|e| e.direction == direction)
    }
}

/// Finds and opens USB devices.
pub trait UsbBus {
    fn open(&self, vendor_id: u16, product_id: u16) -> Result<Option<Box<dyn UsbDevice>>, Error>;
}

/// An opened USB device, reduced to what the raw transport needs.
pub trait UsbDevice {
    /// Activate the device's first configuration.
    fn set_configuration(&mut self) -> rusb::Result<()>;
    fn interfaces(&self) -> rusb::Result<Vec<InterfaceInfo>>;
    fn kernel_driver_active(&mut self, iface: u8) -> rusb::Result<bool>;
    fn detach_kernel_driver(&mut self, iface: u8) -> rusb::Result<()>;
    fn claim_interface(&mut self, iface: u8) -> rusb::Result<()>;
    fn release_interface(&mut self, iface: u8) -> rusb::Result<()>;
    fn write(&mut self, endpoint: &Endpoint, buf: &[u8], timeout: Duration) -> rusb::Result<usize>;
    fn read(
        &mut self,
        endpoint: &Endpoint,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;
}

/// The system USB bus through libusb.
///
/// The libusb context is only created once a device is actually looked up.
#[derive(Debug, Default)]
pub struct LibUsb;

impl UsbBus for LibUsb {
    fn open(&self, vendor_id: u16, product_id: u16) -> Result<Option<Box<dyn UsbDevice>>, Error> {
        let context = Context::new()?;
        let devices = context.devices()?;

        for device in devices.iter() {
            let device_desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(err) => {
                    debug!("{:?}", err);
                    continue;
                }
            };
            debug!("{:?}", device_desc);

            if device_desc.vendor_id() == vendor_id && device_desc.product_id() == product_id {
                let handle = match device.open() {
                    Ok(handle) => handle,
                    Err(rusb::Error::Access) => {
                        return Err(Error::AccessDenied(format!(
                            "usb {:04x}:{:04x}",
                            vendor_id, product_id
                        )))
                    }
                    Err(err) => return Err(Error::UsbError(err)),
                };
                return Ok(Some(Box::new(RusbDevice { device, handle })));
            }
        }
        debug!("No device matches {:04x}:{:04x}", vendor_id, product_id);
        Ok(None)
    }
}

struct RusbDevice {
    device: Device<Context>,
    handle: DeviceHandle<Context>,
}

impl UsbDevice for RusbDevice {
    fn set_configuration(&mut self) -> rusb::Result<()> {
        let config = self.device.config_descriptor(0)?;
        self.handle.set_active_configuration(config.number())
    }

    fn interfaces(&self) -> rusb::Result<Vec<InterfaceInfo>> {
        let config_desc = self.device.active_config_descriptor()?;
        let mut found = Vec::new();
        for interface in config_desc.interfaces() {
            for interface_desc in interface.descriptors() {
                if interface_desc.setting_number() != 0 {
                    continue;
                }
                found.push(InterfaceInfo {
                    number: interface_desc.interface_number(),
                    class: interface_desc.class_code(),
                    endpoints: interface_desc
                        .endpoint_descriptors()
                        .map(|endpoint_desc| Endpoint {
                            address: endpoint_desc.address(),
                            direction: endpoint_desc.direction(),
                            transfer_type: endpoint_desc.transfer_type(),
                        })
                        .collect(),
                });
            }
        }
        Ok(found)
    }

    fn kernel_driver_active(&mut self, iface: u8) -> rusb::Result<bool> {
        self.handle.kernel_driver_active(iface)
    }

    fn detach_kernel_driver(&mut self, iface: u8) -> rusb::Result<()> {
        self.handle.detach_kernel_driver(iface)
    }

    fn claim_interface(&mut self, iface: u8) -> rusb::Result<()> {
        self.handle.claim_interface(iface)
    }

    fn release_interface(&mut self, iface: u8) -> rusb::Result<()> {
        self.handle.release_interface(iface)
    }

    fn write(&mut self, endpoint: &Endpoint, buf: &[u8], timeout: Duration) -> rusb::Result<usize> {
        match endpoint.transfer_type {
            TransferType::Interrupt => self.handle.write_interrupt(endpoint.address, buf, timeout),
            _ => self.handle.write_bulk(endpoint.address, buf, timeout),
        }
    }

    fn read(
        &mut self,
        endpoint: &Endpoint,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        match endpoint.transfer_type {
            TransferType::Interrupt => self.handle.read_interrupt(endpoint.address, buf, timeout),
            _ => self.handle.read_bulk(endpoint.address, buf, timeout),
        }
    }
}

/// Result of activating the device configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Configured,
    /// The configuration is held by someone else, usually because it is
    /// already active. Treated as configured.
    AlreadyConfigured,
}

/// Activate the configuration. Busy is recoverable, permission errors are not.
pub fn activate(device: &mut dyn UsbDevice, name: &str) -> Result<Activation, Error> {
    match device.set_configuration() {
        Ok(()) => Ok(Activation::Configured),
        Err(rusb::Error::Busy) => Ok(Activation::AlreadyConfigured),
        Err(rusb::Error::Access) => Err(Error::AccessDenied(name.to_string())),
        Err(err) => Err(Error::UsbError(err)),
    }
}

/// The kernel character device path. No extra pacing needed.
pub struct FileTransport {
    path: PathBuf,
    file: File,
}

impl FileTransport {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|err| {
                debug!("Failed to open {}: {:?}", path.display(), err);
                Error::AccessDenied(path.display().to_string())
            })?;
        Ok(FileTransport {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A claimed USB interface with its IN and OUT endpoints.
///
/// The interface is released when the transport is dropped.
pub struct UsbTransport {
    device: Box<dyn UsbDevice>,
    interface: u8,
    endpoint_in: Endpoint,
    endpoint_out: Endpoint,
    synwait: usize,
}

impl UsbTransport {
    /// Find, configure and claim the LabelManager 280 personality.
    pub fn negotiate(config: &DeviceConfig, bus: &dyn UsbBus) -> Result<Self, Error> {
        let name = config.device_name();
        let not_found = || Error::DeviceNotFound(name.to_string());

        let mut device = bus
            .open(config.vendor_id(), config.lm280_product_id())?
            .ok_or_else(not_found)?;
        info!("Entering raw USB mode");

        let activation = activate(device.as_mut(), name)?;
        debug!("Configuration: {:?}", activation);

        let interface = device
            .interfaces()?
            .into_iter()
            .find(|i| i.class == config.lm280_class())
            .ok_or_else(not_found)?;

        // A bound kernel driver must go before the interface can be claimed.
        let has_kernel_driver = matches!(device.kernel_driver_active(interface.number), Ok(true));
        info!(" Kernel driver support is {}", has_kernel_driver);
        if has_kernel_driver {
            device.detach_kernel_driver(interface.number)?;
        }

        let endpoint_out = interface.endpoint(Direction::Out).ok_or_else(not_found)?;
        let endpoint_in = interface.endpoint(Direction::In).ok_or_else(not_found)?;
        debug!("Endpoints: out {:?}, in {:?}", endpoint_out, endpoint_in);

        device.claim_interface(interface.number).map_err(|err| match err {
            rusb::Error::Access => Error::AccessDenied(name.to_string()),
            err => Error::UsbError(err),
        })?;

        Ok(UsbTransport {
            device,
            interface: interface.number,
            endpoint_in,
            endpoint_out,
            synwait: config.synwait(),
        })
    }

    pub fn endpoint_in(&self) -> Endpoint {
        self.endpoint_in
    }

    pub fn endpoint_out(&self) -> Endpoint {
        self.endpoint_out
    }

    pub fn synwait(&self) -> usize {
        self.synwait
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        if let Err(err) = self.device.release_interface(self.interface) {
            debug!("Failed to release interface {}: {:?}", self.interface, err);
        }
    }
}

fn io_error(err: rusb::Error) -> io::Error {
    let kind = match err {
        rusb::Error::Access => io::ErrorKind::PermissionDenied,
        rusb::Error::Timeout => io::ErrorKind::TimedOut,
        rusb::Error::NoDevice | rusb::Error::NotFound => io::ErrorKind::NotFound,
        rusb::Error::Interrupted => io::ErrorKind::Interrupted,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, err)
}

/// The transport a print session writes to. Exactly one path is live.
pub enum Transport {
    File(FileTransport),
    Usb(UsbTransport),
}

impl Transport {
    /// Raster rows between status round-trips, only needed on raw USB.
    pub fn synwait(&self) -> Option<usize> {
        match self {
            Transport::File(_) => None,
            Transport::Usb(usb) => Some(usb.synwait()),
        }
    }

    /// Human readable description for messages.
    pub fn describe(&self) -> String {
        match self {
            Transport::File(file) => file.path().display().to_string(),
            Transport::Usb(usb) => format!(
                "usb interface {} (out 0x{:02x}, in 0x{:02x})",
                usb.interface, usb.endpoint_out.address, usb.endpoint_in.address
            ),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::File(file) => file.file.write(buf),
            Transport::Usb(usb) => {
                let endpoint = usb.endpoint_out;
                UsbDevice::write(usb.device.as_mut(), &endpoint, buf, WRITE_TIMEOUT)
                    .map_err(io_error)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::File(file) => file.file.flush(),
            Transport::Usb(_) => Ok(()),
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::File(file) => file.file.read(buf),
            Transport::Usb(usb) => {
                let endpoint = usb.endpoint_in;
                UsbDevice::read(usb.device.as_mut(), &endpoint, buf, READ_TIMEOUT).map_err(io_error)
            }
        }
    }
}

/// Look up the hidraw node of the printer in sysfs.
///
/// An entry matches when the `HID_ID` in its `device/uevent` carries the
/// configured device class as bus type along with the vendor and product,
/// and its USB interface class (when readable) equals that class too.
pub fn find_device_node(config: &DeviceConfig) -> Option<PathBuf> {
    let entries = match fs::read_dir(config.hidraw_dir()) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("Can't read {}: {:?}", config.hidraw_dir().display(), err);
            return None;
        }
    };
    let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let uevent = match fs::read_to_string(path.join("device").join("uevent")) {
            Ok(uevent) => uevent,
            Err(_) => continue,
        };
        let matches = hid_id_matches(
            &uevent,
            config.device_class(),
            config.vendor_id(),
            config.product_id(),
        );
        if !matches {
            continue;
        }
        match interface_class(&path) {
            Some(class) if class != config.device_class() => {
                debug!("{} has interface class {}", path.display(), class);
                continue;
            }
            _ => {}
        }
        let node = config.dev_dir().join(entry.file_name());
        debug!("Found device node {}", node.display());
        return Some(node);
    }
    None
}

/// `HID_ID=<bus>:<vendor>:<product>`, all hexadecimal.
fn hid_id_matches(uevent: &str, bus: u8, vendor_id: u16, product_id: u16) -> bool {
    uevent
        .lines()
        .filter_map(|line| line.strip_prefix("HID_ID="))
        .any(|id| {
            let fields: Vec<Option<u32>> = id
                .trim()
                .split(':')
                .map(|f| u32::from_str_radix(f, 16).ok())
                .collect();
            fields == [Some(bus as u32), Some(vendor_id as u32), Some(product_id as u32)]
        })
}

/// Class code of the USB interface the HID device hangs off.
fn interface_class(entry: &Path) -> Option<u8> {
    let device = fs::canonicalize(entry.join("device")).ok()?;
    let class = fs::read_to_string(device.parent()?.join("bInterfaceClass")).ok()?;
    u8::from_str_radix(class.trim(), 16).ok()
}

/// Resolve the transport: configured node, then discovered node, then raw USB.
pub fn select_transport(config: &DeviceConfig, bus: &dyn UsbBus) -> Result<Transport, Error> {
    let node = match config.device_node() {
        Some(node) => Some(node.to_path_buf()),
        None => find_device_node(config),
    };

    match node {
        Some(path) => {
            debug!("Using device node {}", path.display());
            FileTransport::open(&path).map(Transport::File)
        }
        None => UsbTransport::negotiate(config, bus).map(Transport::Usb),
    }
}
