//! Byte transports to the flight controller.
//!
//! [`open`] turns a [`DeviceSpec`] into a [`Link`]: a blocking reader for the
//! link thread and a writer for the control loop. Readers time out every
//! 100 ms where the transport allows it so the reader thread never wedges.
//!
//! | Spec | Transport |
//! |------|-----------|
//! | `path[@baud]` | serial port, 8N1 |
//! | `tcp://` | TCP stream, Nagle off |
//! | `udp://host:port` | UDP, connected to `host:port` |
//! | `udp://:port` | UDP, bound to `port`, replies to the first sender |
//! | `udp://local/peer` | UDP, bound to `local`, connected to `peer` |
//! | `bt://` | not opened, use the bound `/dev/rfcommN` path |

use core::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, UdpSocket};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use log::{debug, info};

use crate::device::DeviceSpec;

/// Read timeout for transports that support one.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Blocking byte source owned by the link reader thread.
pub trait LinkReader: Read + Send {
    /// Release the transport once reading stops.
    fn close(&mut self) {}
}

/// An open transport, split into its two directions.
pub struct Link {
    pub reader: Box<dyn LinkReader>,
    pub writer: Box<dyn Write + Send>,
}

/// Error type for opening transports.
#[derive(Debug)]
pub enum TransportError {
    /// Serial port could not be opened.
    Serial {
        path: String,
        source: serialport::Error,
    },
    /// Socket setup failed.
    Io { target: String, source: io::Error },
    /// Transport recognised but not supported by this build.
    Unsupported(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Serial { path, source } => write!(f, "{path}: {source}"),
            TransportError::Io { target, source } => write!(f, "{target}: {source}"),
            TransportError::Unsupported(what) => f.write_str(what),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Serial { source, .. } => Some(source),
            TransportError::Io { source, .. } => Some(source),
            TransportError::Unsupported(_) => None,
        }
    }
}

/// Open the transport described by `spec`.
pub fn open(spec: &DeviceSpec) -> Result<Link, TransportError> {
    let io_err = |source| TransportError::Io {
        target: spec.to_string(),
        source,
    };
    match spec {
        DeviceSpec::Serial { path, baud } => open_serial(path, *baud),
        DeviceSpec::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port)).map_err(io_err)?;
            stream.set_nodelay(true).map_err(io_err)?;
            let writer = stream.try_clone().map_err(io_err)?;
            Ok(Link {
                reader: Box::new(TcpReader(stream)),
                writer: Box::new(writer),
            })
        }
        DeviceSpec::Udp { host, port, peer } => {
            let socket = match peer {
                Some((peer_host, peer_port)) => {
                    let socket = UdpSocket::bind((host.as_str(), *port)).map_err(io_err)?;
                    socket
                        .connect((peer_host.as_str(), *peer_port))
                        .map_err(io_err)?;
                    socket
                }
                None if host.is_empty() => {
                    let socket = UdpSocket::bind(("0.0.0.0", *port)).map_err(io_err)?;
                    info!("Waiting for UDP peer on port {port}");
                    return udp_listen(socket).map_err(io_err);
                }
                None => {
                    let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(io_err)?;
                    socket.connect((host.as_str(), *port)).map_err(io_err)?;
                    socket
                }
            };
            udp_connected(socket).map_err(io_err)
        }
        DeviceSpec::Bluetooth { address } => Err(TransportError::Unsupported(format!(
            "bt://{address}: raw RFCOMM is not supported, bind the device with rfcomm and use /dev/rfcommN"
        ))),
    }
}

fn open_serial(path: &str, baud: u32) -> Result<Link, TransportError> {
    let serial_err = |source| TransportError::Serial {
        path: path.to_owned(),
        source,
    };
    let port = serialport::new(path, baud)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(serial_err)?;
    let writer = port.try_clone().map_err(serial_err)?;
    Ok(Link {
        reader: Box::new(SerialReader(port)),
        writer: Box::new(writer),
    })
}

struct SerialReader(Box<dyn serialport::SerialPort>);

impl Read for SerialReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl LinkReader for SerialReader {}

struct TcpReader(TcpStream);

impl Read for TcpReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl LinkReader for TcpReader {
    fn close(&mut self) {
        let _ = self.0.shutdown(Shutdown::Both);
    }
}

/// Where UDP replies go.
#[derive(Clone)]
enum UdpPeer {
    /// Socket is connected.
    Connected,
    /// Learned from the first datagram received.
    FirstSender(Arc<OnceLock<SocketAddr>>),
}

struct UdpReader {
    socket: Arc<UdpSocket>,
    peer: UdpPeer,
}

struct UdpWriter {
    socket: Arc<UdpSocket>,
    peer: UdpPeer,
}

fn udp_connected(socket: UdpSocket) -> io::Result<Link> {
    udp_link(socket, UdpPeer::Connected)
}

fn udp_listen(socket: UdpSocket) -> io::Result<Link> {
    udp_link(socket, UdpPeer::FirstSender(Arc::new(OnceLock::new())))
}

fn udp_link(socket: UdpSocket, peer: UdpPeer) -> io::Result<Link> {
    socket.set_read_timeout(Some(READ_TIMEOUT))?;
    let socket = Arc::new(socket);
    Ok(Link {
        reader: Box::new(UdpReader {
            socket: socket.clone(),
            peer: peer.clone(),
        }),
        writer: Box::new(UdpWriter { socket, peer }),
    })
}

impl Read for UdpReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Empty datagrams are not end-of-stream.
        loop {
            let n = match &self.peer {
                UdpPeer::Connected => self.socket.recv(buf)?,
                UdpPeer::FirstSender(peer) => {
                    let (n, from) = self.socket.recv_from(buf)?;
                    if peer.set(from).is_ok() {
                        info!("UDP peer {from}");
                    }
                    n
                }
            };
            if n > 0 {
                return Ok(n);
            }
        }
    }
}

impl LinkReader for UdpReader {}

impl Write for UdpWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.peer {
            UdpPeer::Connected => self.socket.send(buf),
            UdpPeer::FirstSender(peer) => match peer.get() {
                Some(addr) => self.socket.send_to(buf, addr),
                None => {
                    debug!("No UDP peer yet, dropped {} bytes", buf.len());
                    Ok(buf.len())
                }
            },
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_bluetooth_unsupported() {
        let spec = DeviceSpec::Bluetooth {
            address: "00:11:22:33:44:55".into(),
        };
        match open(&spec) {
            Err(TransportError::Unsupported(msg)) => assert!(msg.contains("/dev/rfcomm")),
            _ => panic!("bluetooth should not open"),
        }
    }

    #[test]
    fn test_missing_serial_port() {
        let spec = DeviceSpec::Serial {
            path: "/nonexistent/ttyACM9".into(),
            baud: 115_200,
        };
        assert!(matches!(open(&spec), Err(TransportError::Serial { .. })));
    }

    #[test]
    fn test_tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut link = open(&DeviceSpec::Tcp {
            host: "127.0.0.1".into(),
            port,
        })
        .unwrap();
        let (mut fc, _) = listener.accept().unwrap();

        link.writer.write_all(b"$M<").unwrap();
        let mut buf = [0u8; 3];
        fc.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"$M<");

        fc.write_all(b"$M>").unwrap();
        let mut buf = [0u8; 3];
        link.reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"$M>");

        link.reader.close();
        let mut rest = Vec::new();
        fc.read_to_end(&mut rest).unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn test_udp_with_peer() {
        let fc = UdpSocket::bind("127.0.0.1:0").unwrap();
        let fc_port = fc.local_addr().unwrap().port();
        let mut link = open(&DeviceSpec::Udp {
            host: "127.0.0.1".into(),
            port: 0,
            peer: Some(("127.0.0.1".into(), fc_port)),
        })
        .unwrap();

        link.writer.write_all(b"ping").unwrap();
        let mut buf = [0u8; 16];
        let (n, from) = fc.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");

        fc.send_to(b"pong", from).unwrap();
        let n = link.reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"pong");
    }

    #[test]
    fn test_udp_replies_to_first_sender() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = socket.local_addr().unwrap();
        let mut link = udp_listen(socket).unwrap();

        // Nothing to reply to yet
        assert_eq!(link.writer.write(b"early").unwrap(), 5);

        let fc = UdpSocket::bind("127.0.0.1:0").unwrap();
        fc.send_to(b"hello", addr).unwrap();
        let mut buf = [0u8; 16];
        let n = link.reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");

        link.writer.write_all(b"reply").unwrap();
        fc.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let n = fc.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"reply");
    }

    #[test]
    fn test_udp_read_times_out() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut link = udp_listen(socket).unwrap();
        let mut buf = [0u8; 16];
        let err = link.reader.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));
    }
}
