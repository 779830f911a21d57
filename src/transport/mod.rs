//! Mail-session transport.
//!
//! [`MailTransport`] is the boundary to the protocol implementation. The
//! exporter never talks to it directly; it goes through [`Session`], which
//! tracks the connection lifecycle
//!
//! ```text
//! Open ──authenticate──▶ Authenticated ──select──▶ Selected ──close──▶ Closed
//!                                ▲                    │
//!                                └── failed select ───┘
//! ```
//!
//! and rejects calls made in the wrong state with
//! [`TransportError::InvalidState`].

pub mod imap;
pub mod memory;

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::error::TransportError;
use crate::model::MessageId;

/// Protocol operations the exporter needs from a mail server.
///
/// Implementations are constructed already connected. Calls block; timeout
/// policy belongs to the implementation.
pub trait MailTransport {
    /// Log in with the given credentials.
    fn authenticate(&mut self, principal: &str, secret: &str) -> Result<(), TransportError>;

    /// Select a folder and return its message count.
    fn select(&mut self, folder: &str) -> Result<u32, TransportError>;

    /// Names of all selectable folders.
    fn list_folders(&mut self) -> Result<Vec<String>, TransportError>;

    /// Every message id in the selected folder, in server order.
    fn search_all(&mut self) -> Result<Vec<MessageId>, TransportError>;

    /// Raw RFC 5322 bytes of one message. Must not alter server-side flags.
    fn fetch(&mut self, id: MessageId) -> Result<Vec<u8>, TransportError>;

    /// End the session. Must not expunge or otherwise modify the mailbox.
    fn close(&mut self);
}

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Use implicit TLS.
    pub tls: bool,
    /// Socket read/write timeout.
    pub timeout: Option<Duration>,
}

impl Endpoint {
    /// Endpoint with TLS enabled for the implicit-TLS ports 993 and 465.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into().trim().to_string(),
            port,
            tls: matches!(port, 993 | 465),
            timeout: None,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Authenticated,
    Selected { folder: String, exists: u32 },
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Selected { folder, .. } => write!(f, "selected on '{folder}'"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// A connected transport plus its lifecycle state.
pub struct Session<T: MailTransport> {
    server: String,
    transport: T,
    state: ConnectionState,
}

impl<T: MailTransport> Session<T> {
    /// Wrap a freshly connected transport for `server`.
    pub fn new(server: impl Into<String>, transport: T) -> Self {
        Self {
            server: server.into(),
            transport,
            state: ConnectionState::Open,
        }
    }

    /// Server address this session talks to.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// The folder currently selected, if any.
    pub fn selected_folder(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Selected { folder, .. } => Some(folder),
            _ => None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn authenticate(&mut self, principal: &str, secret: &str) -> Result<(), TransportError> {
        if self.state != ConnectionState::Open {
            return Err(self.invalid("authenticate"));
        }
        self.transport.authenticate(principal, secret)?;
        debug!(server = %self.server, principal = principal, "Authenticated");
        self.state = ConnectionState::Authenticated;
        Ok(())
    }

    /// Select `folder`. A rejected select leaves no folder selected.
    pub fn select(&mut self, folder: &str) -> Result<u32, TransportError> {
        self.require_login("select")?;
        match self.transport.select(folder) {
            Ok(exists) => {
                self.state = ConnectionState::Selected {
                    folder: folder.to_string(),
                    exists,
                };
                Ok(exists)
            }
            Err(e) => {
                self.state = ConnectionState::Authenticated;
                Err(e)
            }
        }
    }

    pub fn list_folders(&mut self) -> Result<Vec<String>, TransportError> {
        self.require_login("list folders")?;
        self.transport.list_folders()
    }

    pub fn search_all(&mut self) -> Result<Vec<MessageId>, TransportError> {
        self.require_selected("search")?;
        self.transport.search_all()
    }

    pub fn fetch(&mut self, id: MessageId) -> Result<Vec<u8>, TransportError> {
        self.require_selected("fetch")?;
        self.transport.fetch(id)
    }

    /// Close the session. Further calls fail; closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state != ConnectionState::Closed {
            self.transport.close();
            self.state = ConnectionState::Closed;
            debug!(server = %self.server, "Session closed");
        }
    }

    fn require_login(&self, operation: &'static str) -> Result<(), TransportError> {
        match self.state {
            ConnectionState::Authenticated | ConnectionState::Selected { .. } => Ok(()),
            _ => Err(self.invalid(operation)),
        }
    }

    fn require_selected(&self, operation: &'static str) -> Result<(), TransportError> {
        match self.state {
            ConnectionState::Selected { .. } => Ok(()),
            _ => Err(self.invalid(operation)),
        }
    }

    fn invalid(&self, operation: &'static str) -> TransportError {
        TransportError::InvalidState {
            operation,
            state: self.state.to_string(),
        }
    }
}

impl<T: MailTransport> Drop for Session<T> {
    fn drop(&mut self) {
        self.close();
    }
}
