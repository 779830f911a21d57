//! IMAP transport over implicit TLS or plain TCP.

use std::io::{Read, Write};
use std::net::TcpStream;

use ::imap::types::NameAttribute;
use native_tls::{TlsConnector, TlsStream};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::model::MessageId;

use super::{Endpoint, MailTransport};

/// Fetch item that returns the full message without setting `\Seen`.
const FETCH_ITEM: &str = "BODY.PEEK[]";

/// Socket under the IMAP client.
pub enum MailStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Read for MailStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(s) => s.read(buf),
            Self::Tls(s) => s.read(buf),
        }
    }
}

impl Write for MailStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(s) => s.write(buf),
            Self::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(s) => s.flush(),
            Self::Tls(s) => s.flush(),
        }
    }
}

enum Connection {
    Open(::imap::Client<MailStream>),
    Authenticated(::imap::Session<MailStream>),
    Closed,
}

/// [`MailTransport`] backed by the `imap` crate.
pub struct ImapTransport {
    address: String,
    conn: Connection,
}

impl ImapTransport {
    /// Open a TCP (and optionally TLS) connection and read the server greeting.
    pub fn connect(endpoint: &Endpoint) -> Result<Self, TransportError> {
        let address = endpoint.address();
        let connect_err = |reason: String| TransportError::Connect {
            address: address.clone(),
            reason,
        };

        let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .map_err(|e| connect_err(e.to_string()))?;
        tcp.set_read_timeout(endpoint.timeout)
            .and_then(|()| tcp.set_write_timeout(endpoint.timeout))
            .map_err(|e| connect_err(e.to_string()))?;

        let stream = if endpoint.tls {
            let connector = TlsConnector::new().map_err(|e| connect_err(e.to_string()))?;
            let tls = connector
                .connect(&endpoint.host, tcp)
                .map_err(|e| connect_err(e.to_string()))?;
            MailStream::Tls(Box::new(tls))
        } else {
            MailStream::Plain(tcp)
        };

        let mut client = ::imap::Client::new(stream);
        client
            .read_greeting()
            .map_err(|e| connect_err(format!("no greeting: {e}")))?;

        info!(address = %address, tls = endpoint.tls, "Connected");
        Ok(Self {
            address,
            conn: Connection::Open(client),
        })
    }

    fn session(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut ::imap::Session<MailStream>, TransportError> {
        match &mut self.conn {
            Connection::Authenticated(session) => Ok(session),
            Connection::Open(_) => Err(TransportError::InvalidState {
                operation,
                state: "open".into(),
            }),
            Connection::Closed => Err(TransportError::InvalidState {
                operation,
                state: "closed".into(),
            }),
        }
    }
}

impl MailTransport for ImapTransport {
    fn authenticate(&mut self, principal: &str, secret: &str) -> Result<(), TransportError> {
        match std::mem::replace(&mut self.conn, Connection::Closed) {
            Connection::Open(client) => match client.login(principal, secret) {
                Ok(session) => {
                    self.conn = Connection::Authenticated(session);
                    Ok(())
                }
                Err((e, client)) => {
                    self.conn = Connection::Open(client);
                    Err(TransportError::Auth {
                        principal: principal.to_string(),
                        reason: e.to_string(),
                    })
                }
            },
            other => {
                self.conn = other;
                Err(TransportError::InvalidState {
                    operation: "authenticate",
                    state: "not open".into(),
                })
            }
        }
    }

    fn select(&mut self, folder: &str) -> Result<u32, TransportError> {
        let mailbox = self
            .session("select")?
            .select(folder)
            .map_err(|e| match e {
                ::imap::Error::No(_) | ::imap::Error::Bad(_) | ::imap::Error::Validate(_) => {
                    TransportError::Select {
                        folder: folder.to_string(),
                        reason: e.to_string(),
                    }
                }
                other => TransportError::Disconnected(other.to_string()),
            })?;
        debug!(folder = folder, exists = mailbox.exists, "Selected folder");
        Ok(mailbox.exists)
    }

    fn list_folders(&mut self) -> Result<Vec<String>, TransportError> {
        let names = self
            .session("list folders")?
            .list(Some(""), Some("*"))
            .map_err(|e| TransportError::List(e.to_string()))?;
        Ok(names
            .iter()
            .filter(|n| !n.attributes().contains(&NameAttribute::NoSelect))
            .map(|n| n.name().to_string())
            .collect())
    }

    fn search_all(&mut self) -> Result<Vec<MessageId>, TransportError> {
        let found = self
            .session("search")?
            .search("ALL")
            .map_err(|e| TransportError::Search(e.to_string()))?;
        let mut ids: Vec<MessageId> = found.into_iter().map(MessageId::from).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn fetch(&mut self, id: MessageId) -> Result<Vec<u8>, TransportError> {
        let fetches = self
            .session("fetch")?
            .fetch(id.to_string(), FETCH_ITEM)
            .map_err(|e| TransportError::Fetch {
                id,
                reason: e.to_string(),
            })?;
        fetches
            .iter()
            .find_map(|f| f.body())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| TransportError::Fetch {
                id,
                reason: "server returned no message body".into(),
            })
    }

    fn close(&mut self) {
        // LOGOUT only: CLOSE would expunge messages flagged \Deleted.
        if let Connection::Authenticated(mut session) =
            std::mem::replace(&mut self.conn, Connection::Closed)
        {
            match session.logout() {
                Ok(()) => info!(address = %self.address, "Disconnected"),
                Err(e) => warn!(address = %self.address, error = %e, "Logout failed"),
            }
        }
    }
}
