use std::path::{Path, PathBuf};

/// Environment variable naming a fixed device node, e.g. `/dev/hidraw3`.
pub const DEV_NODE_ENV: &str = "DYMOPRINT_DEV_NODE";

/// Addressing of the printer on this system.
///
/// The values distinguish the two USB personalities of the printer family:
/// the HID node the kernel exposes as a character device, and the
/// LabelManager 280 personality that needs raw endpoint negotiation.
/// The struct is immutable; the builder methods return a new value.
///
/// # Example
///
/// ```
/// use dymo_label::DeviceConfig;
///
/// let config = DeviceConfig::default()
///     .node("/dev/hidraw3")
///     .bytes_per_line(16);
/// assert_eq!(config.label_height(), 128);
/// ```
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    vendor_id: u16,
    product_id: u16,
    lm280_product_id: u16,
    device_class: u8,
    lm280_class: u8,
    name: String,
    node: Option<PathBuf>,
    bytes_per_line: u8,
    synwait: usize,
    hidraw_dir: PathBuf,
    dev_dir: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            vendor_id: 0x0922,
            product_id: 0x1001,
            lm280_product_id: 0x1006,
            device_class: 3,
            lm280_class: 3,
            name: "DYMO LabelManager PnP".to_string(),
            node: None,
            bytes_per_line: 8,
            synwait: 64,
            hidraw_dir: PathBuf::from("/sys/class/hidraw"),
            dev_dir: PathBuf::from("/dev"),
        }
    }
}

impl DeviceConfig {
    /// Defaults, with the node override taken from `DYMOPRINT_DEV_NODE` when set.
    pub fn from_env() -> Self {
        let config = Self::default();
        match std::env::var_os(DEV_NODE_ENV) {
            Some(node) if !node.is_empty() => config.node(node),
            _ => config,
        }
    }

    /// Use a fixed device node instead of looking one up.
    pub fn node<P: Into<PathBuf>>(self, node: P) -> Self {
        DeviceConfig {
            node: Some(node.into()),
            ..self
        }
    }

    /// Bytes per print-head line; the label height is eight times this.
    pub fn bytes_per_line(self, bytes_per_line: u8) -> Self {
        DeviceConfig {
            bytes_per_line,
            ..self
        }
    }

    /// Where to look for hidraw class entries and their device nodes.
    pub fn sysfs<P: Into<PathBuf>, Q: Into<PathBuf>>(self, hidraw_dir: P, dev_dir: Q) -> Self {
        DeviceConfig {
            hidraw_dir: hidraw_dir.into(),
            dev_dir: dev_dir.into(),
            ..self
        }
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn lm280_product_id(&self) -> u16 {
        self.lm280_product_id
    }

    pub fn device_class(&self) -> u8 {
        self.device_class
    }

    pub fn lm280_class(&self) -> u8 {
        self.lm280_class
    }

    pub fn device_name(&self) -> &str {
        &self.name
    }

    pub fn device_node(&self) -> Option<&Path> {
        self.node.as_deref()
    }

    /// Raster rows sent between two status round-trips on the raw USB path.
    pub fn synwait(&self) -> usize {
        self.synwait
    }

    pub fn hidraw_dir(&self) -> &Path {
        &self.hidraw_dir
    }

    pub fn dev_dir(&self) -> &Path {
        &self.dev_dir
    }

    /// Label height in pixels.
    pub fn label_height(&self) -> u32 {
        self.bytes_per_line as u32 * 8
    }
}
