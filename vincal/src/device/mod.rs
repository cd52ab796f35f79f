//! Serial endpoint discovery and classification.
//!
//! Enumerates the host's serial ports and drops anything that describes
//! itself as a Bluetooth link, so the operator only picks between wired
//! USB-UART bridges and native ports.

#[cfg(feature = "native")]
use log::{debug, trace};

/// Substring that marks an endpoint as a Bluetooth serial link.
pub const BLUETOOTH_MARKER: &str = "Bluetooth";

/// Bus an endpoint was discovered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PortKind {
    /// USB device (CDC-ACM or USB-UART bridge).
    Usb,
    /// Bluetooth serial profile.
    Bluetooth,
    /// PCI serial card.
    Pci,
    /// Unknown or unclassified.
    Unknown,
}

impl PortKind {
    /// Get a human-readable name for the port kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Usb => "USB",
            Self::Bluetooth => "Bluetooth",
            Self::Pci => "PCI",
            Self::Unknown => "Unknown",
        }
    }
}

/// Discovered serial endpoint information.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectedPort {
    /// Endpoint name/path (e.g., "/dev/ttyUSB0" or "COM3").
    pub name: String,
    /// Bus the endpoint lives on.
    pub kind: PortKind,
    /// USB Vendor ID (if available).
    pub vid: Option<u16>,
    /// USB Product ID (if available).
    pub pid: Option<u16>,
    /// Device manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Device product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial: Option<String>,
}

impl DetectedPort {
    /// Create a bare endpoint with no USB metadata.
    pub fn new(name: impl Into<String>, kind: PortKind) -> Self {
        Self {
            name: name.into(),
            kind,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial: None,
        }
    }

    /// Human-readable description of the endpoint.
    ///
    /// Product string first, then manufacturer, then a bus label for
    /// Bluetooth links, finally the port name itself.
    pub fn description(&self) -> String {
        if let Some(product) = &self.product {
            return product.clone();
        }
        if let Some(manufacturer) = &self.manufacturer {
            return manufacturer.clone();
        }
        match self.kind {
            PortKind::Bluetooth => format!("{BLUETOOTH_MARKER} serial link ({})", self.name),
            _ => self.name.clone(),
        }
    }

    /// Whether this endpoint is a Bluetooth link (case-sensitive match on the description).
    pub fn is_bluetooth(&self) -> bool {
        self.description().contains(BLUETOOTH_MARKER)
    }
}

/// Drop Bluetooth endpoints, keeping enumeration order.
pub fn filter_candidates(ports: Vec<DetectedPort>) -> Vec<DetectedPort> {
    ports
        .into_iter()
        .filter(|p| !p.is_bluetooth())
        .collect()
}

/// Detect all available serial endpoints with metadata.
#[cfg(feature = "native")]
pub fn detect_ports() -> Vec<DetectedPort> {
    let mut result = Vec::new();

    match serialport::available_ports() {
        Ok(ports) => {
            for port_info in ports {
                let mut detected = DetectedPort::new(port_info.port_name.clone(), PortKind::Unknown);

                match port_info.port_type {
                    serialport::SerialPortType::UsbPort(usb_info) => {
                        detected.kind = PortKind::Usb;
                        detected.vid = Some(usb_info.vid);
                        detected.pid = Some(usb_info.pid);
                        detected.manufacturer = usb_info.manufacturer;
                        detected.product = usb_info.product;
                        detected.serial = usb_info.serial_number;

                        trace!(
                            "Found USB port: {} (VID: {:04X}, PID: {:04X})",
                            port_info.port_name, usb_info.vid, usb_info.pid
                        );
                    },
                    serialport::SerialPortType::BluetoothPort => {
                        detected.kind = PortKind::Bluetooth;
                    },
                    serialport::SerialPortType::PciPort => {
                        detected.kind = PortKind::Pci;
                    },
                    serialport::SerialPortType::Unknown => {},
                }

                result.push(detected);
            }
        },
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
        },
    }

    result
}

/// Detect all available endpoints (stub without native serial support).
#[cfg(not(feature = "native"))]
pub fn detect_ports() -> Vec<DetectedPort> {
    Vec::new()
}

/// Serial endpoints the operator may choose from.
pub fn discover_ports() -> Vec<DetectedPort> {
    filter_candidates(detect_ports())
}

/// Format a list of detected endpoints as an ordinal menu (`[1] /dev/ttyUSB0 - CP2102`).
pub fn format_port_list(ports: &[DetectedPort]) -> Vec<String> {
    ports
        .iter()
        .enumerate()
        .map(|(i, port)| {
            let usb_info = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
                format!(" ({vid:04X}:{pid:04X})")
            } else {
                String::new()
            };
            let description = port.description();
            if description == port.name {
                format!("[{}] {}{}", i + 1, port.name, usb_info)
            } else {
                format!("[{}] {}{} - {}", i + 1, port.name, usb_info, description)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb(name: &str, product: &str) -> DetectedPort {
        DetectedPort {
            vid: Some(0x10C4),
            pid: Some(0xEA60),
            product: Some(product.to_string()),
            ..DetectedPort::new(name, PortKind::Usb)
        }
    }

    #[test]
    fn test_description_prefers_product() {
        let port = DetectedPort {
            manufacturer: Some("Silicon Labs".to_string()),
            ..usb("/dev/ttyUSB0", "CP2102 USB to UART Bridge Controller")
        };
        assert_eq!(port.description(), "CP2102 USB to UART Bridge Controller");
    }

    #[test]
    fn test_description_falls_back_to_name() {
        let port = DetectedPort::new("/dev/ttyS0", PortKind::Unknown);
        assert_eq!(port.description(), "/dev/ttyS0");
    }

    #[test]
    fn test_filter_candidates_drops_bluetooth() {
        let ports = vec![
            usb("COM3", "Silicon Labs CP210x USB to UART Bridge"),
            DetectedPort::new("COM5", PortKind::Bluetooth),
            usb("COM6", "Standard Serial over Bluetooth link"),
            DetectedPort::new("/dev/cu.Bluetooth-Incoming-Port", PortKind::Unknown),
            DetectedPort::new("/dev/ttyACM0", PortKind::Unknown),
        ];

        let kept = filter_candidates(ports);
        let names: Vec<&str> = kept.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["COM3", "/dev/ttyACM0"]);
    }

    #[test]
    fn test_bluetooth_match_is_case_sensitive() {
        let port = usb("COM7", "bluetooth dongle");
        assert!(!port.is_bluetooth());
    }

    #[test]
    fn test_filter_candidates_empty() {
        assert!(filter_candidates(vec![DetectedPort::new("COM5", PortKind::Bluetooth)]).is_empty());
    }

    #[test]
    fn test_format_port_list() {
        let ports = vec![
            usb("/dev/ttyUSB0", "CP2102"),
            DetectedPort::new("/dev/ttyS0", PortKind::Unknown),
        ];

        let formatted = format_port_list(&ports);
        assert_eq!(formatted[0], "[1] /dev/ttyUSB0 (10C4:EA60) - CP2102");
        assert_eq!(formatted[1], "[2] /dev/ttyS0");
    }

    #[test]
    fn test_detect_ports_does_not_panic() {
        let _ = detect_ports();
    }
}
