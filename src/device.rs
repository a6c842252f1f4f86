//! Device-string grammar.
//!
//! ```text
//! tcp://host:port
//! udp://host:port[/peerhost:peerport]
//! bt://AA:BB:CC:DD:EE:FF
//! path[@baud]
//! ```
//!
//! Hosts may be bracketed IPv6 literals. A UDP spec with an empty host binds
//! `port` locally and replies to whoever sends first.

use core::fmt;
use std::path::Path;

/// Serial devices tried in order when none is given.
pub const DEFAULT_DEVICES: [&str; 2] = ["/dev/ttyACM0", "/dev/ttyUSB0"];

/// A parsed connection descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceSpec {
    Serial {
        path: String,
        baud: u32,
    },
    Bluetooth {
        address: String,
    },
    Tcp {
        host: String,
        port: u16,
    },
    Udp {
        /// Empty to listen on all interfaces.
        host: String,
        port: u16,
        /// Fixed remote end; `host:port` is then the local bind address.
        peer: Option<(String, u16)>,
    },
}

/// Error type for device strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// `host:port` part missing a port or with a bad one.
    InvalidPort(String),
    /// `@baud` suffix is not a number.
    InvalidBaud(String),
    /// TCP needs a host.
    MissingHost(String),
    /// Empty device string.
    Empty,
    /// No device given and none of the defaults exists.
    NotFound,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::InvalidPort(s) => write!(f, "invalid host:port {s:?}"),
            DeviceError::InvalidBaud(s) => write!(f, "invalid baud rate {s:?}"),
            DeviceError::MissingHost(s) => write!(f, "missing host in {s:?}"),
            DeviceError::Empty => f.write_str("empty device string"),
            DeviceError::NotFound => write!(
                f,
                "no device given and none of {} found",
                DEFAULT_DEVICES.join(", ")
            ),
        }
    }
}

impl std::error::Error for DeviceError {}

impl DeviceSpec {
    /// Parse a device string. `default_baud` applies to serial paths without
    /// an `@baud` suffix.
    pub fn parse(spec: &str, default_baud: u32) -> Result<Self, DeviceError> {
        if let Some(rest) = spec.strip_prefix("tcp://") {
            let (host, port) = host_port(rest)?;
            if host.is_empty() {
                return Err(DeviceError::MissingHost(spec.to_owned()));
            }
            return Ok(DeviceSpec::Tcp { host, port });
        }
        if let Some(rest) = spec.strip_prefix("udp://") {
            let (local, peer) = match rest.split_once('/') {
                Some((local, peer)) if !peer.is_empty() => (local, Some(host_port(peer)?)),
                Some((local, _)) => (local, None),
                None => (rest, None),
            };
            let (host, port) = host_port(local)?;
            return Ok(DeviceSpec::Udp { host, port, peer });
        }
        if let Some(address) = spec.strip_prefix("bt://") {
            return Ok(DeviceSpec::Bluetooth {
                address: address.to_owned(),
            });
        }

        let (path, baud) = match spec.split_once('@') {
            Some((path, baud)) => (
                path,
                baud.parse()
                    .map_err(|_| DeviceError::InvalidBaud(baud.to_owned()))?,
            ),
            None => (spec, default_baud),
        };
        if path.is_empty() {
            return Err(DeviceError::Empty);
        }
        Ok(DeviceSpec::Serial {
            path: path.to_owned(),
            baud,
        })
    }

    /// First of `candidates` that exists, as a serial device.
    pub fn probe(default_baud: u32, candidates: &[&str]) -> Result<Self, DeviceError> {
        candidates
            .iter()
            .find(|path| Path::new(path).exists())
            .map(|path| DeviceSpec::Serial {
                path: (*path).to_owned(),
                baud: default_baud,
            })
            .ok_or(DeviceError::NotFound)
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSpec::Serial { path, baud } => write!(f, "{path}@{baud}"),
            DeviceSpec::Bluetooth { address } => write!(f, "bt://{address}"),
            DeviceSpec::Tcp { host, port } => write!(f, "tcp://{}:{port}", bracket(host)),
            DeviceSpec::Udp { host, port, peer } => {
                write!(f, "udp://{}:{port}", bracket(host))?;
                if let Some((peer_host, peer_port)) = peer {
                    write!(f, "/{}:{peer_port}", bracket(peer_host))?;
                }
                Ok(())
            }
        }
    }
}

/// Split `host:port`, unwrapping a bracketed IPv6 host.
fn host_port(text: &str) -> Result<(String, u16), DeviceError> {
    let invalid = || DeviceError::InvalidPort(text.to_owned());
    let (host, port) = text.rsplit_once(':').ok_or_else(invalid)?;
    let port = port.parse().map_err(|_| invalid())?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    Ok((host.to_owned(), port))
}

fn bracket(host: &str) -> String {
    if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_paths() {
        assert_eq!(
            DeviceSpec::parse("/dev/ttyACM1", 115_200),
            Ok(DeviceSpec::Serial {
                path: "/dev/ttyACM1".into(),
                baud: 115_200
            })
        );
        assert_eq!(
            DeviceSpec::parse("/dev/ttyUSB0@57600", 115_200),
            Ok(DeviceSpec::Serial {
                path: "/dev/ttyUSB0".into(),
                baud: 57_600
            })
        );
        assert_eq!(
            DeviceSpec::parse("/dev/ttyUSB0@fast", 115_200),
            Err(DeviceError::InvalidBaud("fast".into()))
        );
        assert_eq!(DeviceSpec::parse("", 115_200), Err(DeviceError::Empty));
    }

    #[test]
    fn test_tcp() {
        assert_eq!(
            DeviceSpec::parse("tcp://localhost:5760", 0),
            Ok(DeviceSpec::Tcp {
                host: "localhost".into(),
                port: 5760
            })
        );
        assert_eq!(
            DeviceSpec::parse("tcp://[::1]:5761", 0),
            Ok(DeviceSpec::Tcp {
                host: "::1".into(),
                port: 5761
            })
        );
        assert!(matches!(
            DeviceSpec::parse("tcp://:5760", 0),
            Err(DeviceError::MissingHost(_))
        ));
        assert!(matches!(
            DeviceSpec::parse("tcp://host", 0),
            Err(DeviceError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_udp() {
        assert_eq!(
            DeviceSpec::parse("udp://esp-air:14014", 0),
            Ok(DeviceSpec::Udp {
                host: "esp-air".into(),
                port: 14014,
                peer: None
            })
        );
        assert_eq!(
            DeviceSpec::parse("udp://:14014", 0),
            Ok(DeviceSpec::Udp {
                host: String::new(),
                port: 14014,
                peer: None
            })
        );
        assert_eq!(
            DeviceSpec::parse("udp://0.0.0.0:14015/192.168.4.1:14014", 0),
            Ok(DeviceSpec::Udp {
                host: "0.0.0.0".into(),
                port: 14015,
                peer: Some(("192.168.4.1".into(), 14014))
            })
        );
    }

    #[test]
    fn test_bluetooth() {
        assert_eq!(
            DeviceSpec::parse("bt://00:11:22:33:44:55", 0),
            Ok(DeviceSpec::Bluetooth {
                address: "00:11:22:33:44:55".into()
            })
        );
    }

    #[test]
    fn test_display_round_trips() {
        for spec in [
            "/dev/ttyACM0@115200",
            "tcp://[::1]:5760",
            "udp://:14014",
            "udp://0.0.0.0:14015/esp-air:14014",
            "bt://00:11:22:33:44:55",
        ] {
            let parsed = DeviceSpec::parse(spec, 9600).unwrap();
            assert_eq!(parsed.to_string(), spec);
        }
    }

    #[test]
    fn test_probe() {
        let found = DeviceSpec::probe(9600, &["/nonexistent/tty0", "/"]).unwrap();
        assert_eq!(
            found,
            DeviceSpec::Serial {
                path: "/".into(),
                baud: 9600
            }
        );
        assert_eq!(
            DeviceSpec::probe(9600, &["/nonexistent/tty0"]),
            Err(DeviceError::NotFound)
        );
    }
}
