//! Folder resolution.
//!
//! Servers disagree on folder naming (`Sent`, `INBOX.Sent`, `[Gmail]/Sent
//! Mail`, ...). When the requested name cannot be selected, a fixed, ordered
//! list of spellings is tried; nothing outside that list is ever guessed.
//! New server quirks belong in [`STRATEGIES`], not in ad hoc branches.

use tracing::{debug, info};

use crate::error::{FolderError, TransportError};
use crate::transport::{MailTransport, Session};

/// One way of spelling a requested folder name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStrategy {
    /// The name as given.
    Exact,
    /// Wrapped in double quotes.
    Quoted,
    UpperCase,
    LowerCase,
    /// `INBOX.<name>`, for servers that nest everything under the inbox.
    InboxPrefix,
    /// `[Gmail]/<name>`, only for Gmail servers.
    GmailPrefix,
}

/// Strategies in the order they are tried.
pub const STRATEGIES: [VariantStrategy; 6] = [
    VariantStrategy::Exact,
    VariantStrategy::Quoted,
    VariantStrategy::UpperCase,
    VariantStrategy::LowerCase,
    VariantStrategy::InboxPrefix,
    VariantStrategy::GmailPrefix,
];

impl VariantStrategy {
    /// Spell `requested` for this strategy, or `None` when the strategy does
    /// not apply to this folder or server.
    pub fn apply(self, requested: &str, server: &str) -> Option<String> {
        match self {
            Self::Exact => Some(requested.to_string()),
            Self::Quoted => Some(format!("\"{requested}\"")),
            Self::UpperCase => Some(requested.to_uppercase()),
            Self::LowerCase => Some(requested.to_lowercase()),
            Self::InboxPrefix => {
                (!requested.eq_ignore_ascii_case("INBOX")).then(|| format!("INBOX.{requested}"))
            }
            Self::GmailPrefix => server
                .to_ascii_lowercase()
                .contains("gmail")
                .then(|| format!("[Gmail]/{requested}")),
        }
    }
}

/// A candidate folder name and the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderVariant {
    pub strategy: VariantStrategy,
    pub name: String,
}

/// The folder that was actually selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFolder {
    pub requested: String,
    pub name: String,
    pub strategy: VariantStrategy,
    /// Message count reported by the select.
    pub exists: u32,
}

/// Candidate spellings of `requested`, in trial order, without duplicates.
pub fn variants(requested: &str, server: &str) -> Vec<FolderVariant> {
    let mut out: Vec<FolderVariant> = Vec::with_capacity(STRATEGIES.len());
    for strategy in STRATEGIES {
        if let Some(name) = strategy.apply(requested, server) {
            if !out.iter().any(|v| v.name == name) {
                out.push(FolderVariant { strategy, name });
            }
        }
    }
    out
}

/// Select the first variant of `requested` the server accepts.
///
/// A rejected select moves on to the next variant. Any other transport
/// failure means the session is unusable and aborts resolution.
pub fn resolve<T: MailTransport>(
    session: &mut Session<T>,
    requested: &str,
) -> Result<ResolvedFolder, FolderError> {
    let candidates = variants(requested, session.server());
    let mut tried = Vec::with_capacity(candidates.len());

    for variant in candidates {
        match session.select(&variant.name) {
            Ok(exists) => {
                if variant.strategy == VariantStrategy::Exact {
                    debug!(folder = %variant.name, exists, "Selected folder");
                } else {
                    info!(
                        requested = requested,
                        folder = %variant.name,
                        strategy = ?variant.strategy,
                        "Selected folder using a name variation"
                    );
                }
                return Ok(ResolvedFolder {
                    requested: requested.to_string(),
                    name: variant.name,
                    strategy: variant.strategy,
                    exists,
                });
            }
            Err(TransportError::Select { reason, .. }) => {
                debug!(folder = %variant.name, reason = %reason, "Folder variant rejected");
                tried.push(variant.name);
            }
            Err(e) => return Err(FolderError::Transport(e)),
        }
    }

    Err(FolderError::NotFound {
        requested: requested.to_string(),
        tried,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryTransport;

    fn session(server: &str, transport: MemoryTransport) -> Session<MemoryTransport> {
        let mut session = Session::new(server, transport);
        session.authenticate("u", "p").unwrap();
        session
    }

    fn names(vs: &[FolderVariant]) -> Vec<&str> {
        vs.iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn test_variant_order() {
        let vs = variants("Sent", "mail.example.com");
        assert_eq!(
            names(&vs),
            vec!["Sent", "\"Sent\"", "SENT", "sent", "INBOX.Sent"]
        );
    }

    #[test]
    fn test_gmail_variant_only_for_gmail() {
        let vs = variants("Sent Mail", "imap.GMAIL.com");
        assert_eq!(vs.last().unwrap().name, "[Gmail]/Sent Mail");
        assert_eq!(vs.last().unwrap().strategy, VariantStrategy::GmailPrefix);
    }

    #[test]
    fn test_inbox_gets_no_inbox_prefix() {
        let vs = variants("INBOX", "mail.example.com");
        assert_eq!(names(&vs), vec!["INBOX", "\"INBOX\"", "inbox"]);
    }

    #[test]
    fn test_exact_match_wins() {
        let mut s = session("mail.example.com", MemoryTransport::new().with_folder("Archive"));
        let resolved = resolve(&mut s, "Archive").unwrap();
        assert_eq!(resolved.name, "Archive");
        assert_eq!(resolved.strategy, VariantStrategy::Exact);
        assert_eq!(s.transport().select_attempts(), ["Archive"]);
    }

    #[test]
    fn test_sent_resolves_to_inbox_sent() {
        let transport = MemoryTransport::new()
            .with_folder("INBOX")
            .with_message("INBOX.Sent", 1, b"Subject: x\r\n\r\n");
        let mut s = session("mail.example.com", transport);

        let resolved = resolve(&mut s, "Sent").unwrap();
        assert_eq!(resolved.name, "INBOX.Sent");
        assert_eq!(resolved.strategy, VariantStrategy::InboxPrefix);
        assert_eq!(resolved.exists, 1);
        assert_eq!(s.selected_folder(), Some("INBOX.Sent"));
    }

    #[test]
    fn test_nonexistent_exhausts_all_variants() {
        let mut s = session("mail.example.com", MemoryTransport::new().with_folder("INBOX"));
        let err = resolve(&mut s, "Nonexistent").unwrap_err();
        match err {
            FolderError::NotFound { requested, tried } => {
                assert_eq!(requested, "Nonexistent");
                assert_eq!(tried.len(), 5);
                assert_eq!(s.transport().select_attempts(), tried.as_slice());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_session_failure_aborts() {
        let mut s = Session::new("mail.example.com", MemoryTransport::new().with_folder("X"));
        // Not authenticated: the session refuses to select at all.
        let err = resolve(&mut s, "X").unwrap_err();
        assert!(matches!(err, FolderError::Transport(TransportError::InvalidState { .. })));
    }
}
