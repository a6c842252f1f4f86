use std::io::{self, Read};
use std::thread::{self, JoinHandle};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver};
use log::{debug, trace};
use msp_core::Key;

/// Depth of the keystroke queue.
pub const KEY_QUEUE: usize = 8;

/// Keystrokes from the keyboard thread to the control loop.
pub type KeyChannel = Channel<CriticalSectionRawMutex, Key, KEY_QUEUE>;

/// Async trait for keystroke sources.
pub trait KeySource {
    /// Wait for the next bound keystroke.
    fn next_key(&mut self) -> impl core::future::Future<Output = Key>;
}

/// Map each byte of `reader` to a [`Key`] and hand it to `deliver`, until
/// end of input. Unbound bytes are dropped.
pub fn pump_keys<R: Read>(reader: R, mut deliver: impl FnMut(Key)) {
    for byte in reader.bytes() {
        match byte {
            Ok(b) => match Key::from_byte(b) {
                Some(key) => deliver(key),
                None => trace!("unbound key {:#04x}", b),
            },
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                debug!("keyboard read failed: {}", e);
                break;
            }
        }
    }
    debug!("keyboard closed");
}

/// Read stdin on its own thread, feeding `keys`.
pub fn spawn_keyboard(keys: &'static KeyChannel) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("keyboard".into()).spawn(move || {
        pump_keys(io::stdin().lock(), |key| {
            embassy_futures::block_on(keys.send(key));
        });
    })
}

/// [`KeySource`] over the receiving end of a [`KeyChannel`].
pub struct KeyStrokes<'a> {
    rx: Receiver<'a, CriticalSectionRawMutex, Key, KEY_QUEUE>,
}

impl<'a> KeyStrokes<'a> {
    pub fn new(keys: &'a KeyChannel) -> Self {
        Self { rx: keys.receiver() }
    }
}

impl KeySource for KeyStrokes<'_> {
    async fn next_key(&mut self) -> Key {
        self.rx.receive().await
    }
}
