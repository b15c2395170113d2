//! Application callbacks invoked by the connection.
//!
//! [`ConnectionHooks`] stores optional callbacks. Each runner method is a
//! no-op when its hook is unset, so the connection never checks for
//! registration itself.

use crate::address::PeerAddress;

/// Type alias for the `on_message` callback.
type OnMessageHook = Box<dyn FnMut(PeerAddress, &[u8]) + Send + 'static>;

/// Type alias for callbacks receiving a sender and an announced address.
type AddressHook = Box<dyn FnMut(PeerAddress, PeerAddress) + Send + 'static>;

/// Type alias for send-status callbacks.
type DestinationHook = Box<dyn FnMut(PeerAddress) + Send + 'static>;

/// Type alias for the `on_pairing_finished` callback.
type OnPairingFinishedHook = Box<dyn FnMut() + Send + 'static>;

/// Callbacks surfaced to the application.
#[derive(Default)]
pub struct ConnectionHooks {
    /// Invoked with every complete DATA message.
    pub on_message: Option<OnMessageHook>,
    /// Invoked when a PAIR envelope announces an address.
    pub on_paired: Option<AddressHook>,
    /// Invoked when a CONNECT envelope announces a counterpart.
    pub on_connected: Option<AddressHook>,
    /// Invoked when a listening client learns its server's address.
    pub on_new_counterpart_address: Option<AddressHook>,
    /// Invoked when a fragment to a destination fails.
    pub on_send_error: Option<DestinationHook>,
    /// Invoked when a fragment to a destination is delivered.
    pub on_send_done: Option<DestinationHook>,
    /// Invoked when a pairing session closes.
    pub on_pairing_finished: Option<OnPairingFinishedHook>,
}

impl std::fmt::Debug for ConnectionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHooks")
            .field("on_message", &self.on_message.is_some())
            .field("on_paired", &self.on_paired.is_some())
            .field("on_connected", &self.on_connected.is_some())
            .field(
                "on_new_counterpart_address",
                &self.on_new_counterpart_address.is_some(),
            )
            .field("on_send_error", &self.on_send_error.is_some())
            .field("on_send_done", &self.on_send_done.is_some())
            .field("on_pairing_finished", &self.on_pairing_finished.is_some())
            .finish()
    }
}

impl ConnectionHooks {
    /// Create an empty hook set.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register the message callback.
    #[must_use]
    pub fn with_on_message<F>(mut self, hook: F) -> Self
    where
        F: FnMut(PeerAddress, &[u8]) + Send + 'static,
    {
        self.on_message = Some(Box::new(hook));
        self
    }

    /// Register the paired callback.
    #[must_use]
    pub fn with_on_paired<F>(mut self, hook: F) -> Self
    where
        F: FnMut(PeerAddress, PeerAddress) + Send + 'static,
    {
        self.on_paired = Some(Box::new(hook));
        self
    }

    /// Register the connected callback.
    #[must_use]
    pub fn with_on_connected<F>(mut self, hook: F) -> Self
    where
        F: FnMut(PeerAddress, PeerAddress) + Send + 'static,
    {
        self.on_connected = Some(Box::new(hook));
        self
    }

    /// Register the counterpart discovery callback.
    #[must_use]
    pub fn with_on_new_counterpart_address<F>(mut self, hook: F) -> Self
    where
        F: FnMut(PeerAddress, PeerAddress) + Send + 'static,
    {
        self.on_new_counterpart_address = Some(Box::new(hook));
        self
    }

    /// Register the send failure callback.
    #[must_use]
    pub fn with_on_send_error<F>(mut self, hook: F) -> Self
    where
        F: FnMut(PeerAddress) + Send + 'static,
    {
        self.on_send_error = Some(Box::new(hook));
        self
    }

    /// Register the send success callback.
    #[must_use]
    pub fn with_on_send_done<F>(mut self, hook: F) -> Self
    where
        F: FnMut(PeerAddress) + Send + 'static,
    {
        self.on_send_done = Some(Box::new(hook));
        self
    }

    /// Register the pairing finished callback.
    #[must_use]
    pub fn with_on_pairing_finished<F>(mut self, hook: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_pairing_finished = Some(Box::new(hook));
        self
    }

    /// Run the `on_message` hook if registered.
    pub fn message(&mut self, sender: PeerAddress, payload: &[u8]) {
        if let Some(hook) = &mut self.on_message {
            hook(sender, payload);
        }
    }

    /// Run the `on_paired` hook if registered.
    pub fn paired(&mut self, sender: PeerAddress, address: PeerAddress) {
        if let Some(hook) = &mut self.on_paired {
            hook(sender, address);
        }
    }

    /// Run the `on_connected` hook if registered.
    pub fn connected(&mut self, sender: PeerAddress, address: PeerAddress) {
        if let Some(hook) = &mut self.on_connected {
            hook(sender, address);
        }
    }

    /// Run the `on_new_counterpart_address` hook if registered.
    pub fn new_counterpart_address(&mut self, sender: PeerAddress, address: PeerAddress) {
        if let Some(hook) = &mut self.on_new_counterpart_address {
            hook(sender, address);
        }
    }

    /// Run the `on_send_error` hook if registered.
    pub fn send_error(&mut self, destination: PeerAddress) {
        if let Some(hook) = &mut self.on_send_error {
            hook(destination);
        }
    }

    /// Run the `on_send_done` hook if registered.
    pub fn send_done(&mut self, destination: PeerAddress) {
        if let Some(hook) = &mut self.on_send_done {
            hook(destination);
        }
    }

    /// Run the `on_pairing_finished` hook if registered.
    pub fn pairing_finished(&mut self) {
        if let Some(hook) = &mut self.on_pairing_finished {
            hook();
        }
    }
}
