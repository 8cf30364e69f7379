use std::sync::{Arc, OnceLock};

use regex::Regex;
use rustls::{ClientConfig, RootCertStore};
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, RustlsConnector, RustlsFtpStream};
use tracing::{debug, info, warn};

use crate::contract::SourceBackend;
use crate::error::SourceError;

const DEFAULT_FTP_PORT: u16 = 21;
/// Requested file or directory does not exist (or is not accessible).
const REPLY_FILE_UNAVAILABLE: u32 = 550;
const REPLY_NOT_LOGGED_IN: u32 = 530;

/// Username and password for the remote transfer server.
#[derive(Clone)]
pub struct RemoteCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Explicit FTPS with a protected data channel.
    Ftps,
    Ftp,
}

/// Outcome of the two-attempt login sequence.
#[derive(Debug)]
pub enum LoginOutcome<S, E> {
    Connected { session: S, protocol: Protocol },
    /// Both protocols refused the login with a permission-class reply.
    Rejected { secure: E, plain: E },
    /// An attempt failed for a reason other than a refusal (network, TLS).
    Unreachable {
        protocol: Protocol,
        error: E,
    },
}

/// Tries `secure` first; falls back to `plain` only when `is_refusal` says
/// the secure attempt was refused by the server.
pub fn login_with_fallback<S, E>(
    secure: impl FnOnce() -> Result<S, E>,
    plain: impl FnOnce() -> Result<S, E>,
    is_refusal: impl Fn(&E) -> bool,
) -> LoginOutcome<S, E> {
    let secure_error = match secure() {
        Ok(session) => {
            return LoginOutcome::Connected {
                session,
                protocol: Protocol::Ftps,
            }
        }
        Err(e) if is_refusal(&e) => e,
        Err(error) => {
            return LoginOutcome::Unreachable {
                protocol: Protocol::Ftps,
                error,
            }
        }
    };

    match plain() {
        Ok(session) => LoginOutcome::Connected {
            session,
            protocol: Protocol::Ftp,
        },
        Err(e) if is_refusal(&e) => LoginOutcome::Rejected {
            secure: secure_error,
            plain: e,
        },
        Err(error) => LoginOutcome::Unreachable {
            protocol: Protocol::Ftp,
            error,
        },
    }
}

/// Remote listings may contain entries that are not real paths. Only names
/// built from this character class are followed.
pub fn is_path_safe(path: &str) -> bool {
    static PATH_SAFE: OnceLock<Regex> = OnceLock::new();
    PATH_SAFE
        .get_or_init(|| Regex::new(r"^[()a-zA-Z0-9_\s+/-]+$").expect("static regex"))
        .is_match(path)
}

/// Reply code of a server answer; `None` for connection and TLS failures.
fn reply_code(error: &FtpError) -> Option<u32> {
    match error {
        FtpError::UnexpectedResponse(response) => Some(response.status.code()),
        _ => None,
    }
}

fn is_permission_reply(error: &FtpError) -> bool {
    reply_code(error).is_some_and(|code| (500..600).contains(&code))
}

/// How a failed path operation is reported, by reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
    /// 550: the path is not there. Only this reply counts as an empty result.
    Missing,
    /// 530: the session lost its login.
    NotLoggedIn,
    /// Anything else, including 522 (data channel refused, e.g. TLS session not reused).
    Failed,
}

fn reply_kind(code: Option<u32>) -> ReplyKind {
    match code {
        Some(REPLY_FILE_UNAVAILABLE) => ReplyKind::Missing,
        Some(REPLY_NOT_LOGGED_IN) => ReplyKind::NotLoggedIn,
        _ => ReplyKind::Failed,
    }
}

/// Turns NLST output into backend paths. Some servers answer with bare
/// names, others with the path as given.
fn listing_paths(dir: &str, entries: Vec<String>) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| {
            if dir.is_empty() || entry.contains('/') {
                entry
            } else {
                super::join(dir, &entry)
            }
        })
        .collect()
}

enum RemoteSession {
    Secure(RustlsFtpStream),
    Plain(FtpStream),
}

/// Backend over a single authenticated FTP(S) session, reused for every call.
pub struct RemoteBackend {
    server: String,
    protocol: Protocol,
    session: RemoteSession,
}

impl RemoteBackend {
    /// Connects and logs in. FTPS is tried first; a permission-class refusal
    /// falls back to plain FTP, which some legacy servers require.
    pub fn connect(server: &str, credentials: &RemoteCredentials) -> Result<Self, SourceError> {
        let address = with_default_port(server);
        let host = address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| address.clone());

        let outcome = login_with_fallback(
            || open_secure(&address, &host, credentials).map(RemoteSession::Secure),
            || open_plain(&address, credentials).map(RemoteSession::Plain),
            is_permission_reply,
        );

        match outcome {
            LoginOutcome::Connected { session, protocol } => {
                if protocol == Protocol::Ftp {
                    warn!(server = %address, "[SOURCE] FTPS refused, logged in over plain FTP");
                } else {
                    info!(server = %address, "[SOURCE] Logged in over FTPS");
                }
                Ok(Self {
                    server: address,
                    protocol,
                    session,
                })
            }
            LoginOutcome::Rejected { secure, plain } => Err(SourceError::Auth {
                server: address,
                reason: format!("FTPS: {secure}; FTP: {plain}"),
            }),
            LoginOutcome::Unreachable { protocol, error } => {
                warn!(server = %address, ?protocol, error = %error, "[SOURCE] Remote login failed");
                Err(SourceError::Transient {
                    path: address,
                    source: error,
                })
            }
        }
    }

    /// Protocol the session ended up on after the login sequence.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn nlst(&mut self, path: Option<&str>) -> Result<Vec<String>, FtpError> {
        match &mut self.session {
            RemoteSession::Secure(s) => s.nlst(path),
            RemoteSession::Plain(s) => s.nlst(path),
        }
    }

    fn pwd(&mut self) -> Result<String, FtpError> {
        match &mut self.session {
            RemoteSession::Secure(s) => s.pwd(),
            RemoteSession::Plain(s) => s.pwd(),
        }
    }

    fn cwd(&mut self, path: &str) -> Result<(), FtpError> {
        match &mut self.session {
            RemoteSession::Secure(s) => s.cwd(path),
            RemoteSession::Plain(s) => s.cwd(path),
        }
    }

    fn retr(&mut self, path: &str) -> Result<Vec<u8>, FtpError> {
        let buffer = match &mut self.session {
            RemoteSession::Secure(s) => s.retr_as_buffer(path)?,
            RemoteSession::Plain(s) => s.retr_as_buffer(path)?,
        };
        Ok(buffer.into_inner())
    }
}

impl Drop for RemoteBackend {
    fn drop(&mut self) {
        let result = match &mut self.session {
            RemoteSession::Secure(s) => s.quit(),
            RemoteSession::Plain(s) => s.quit(),
        };
        if let Err(e) = result {
            debug!(server = %self.server, error = %e, "QUIT failed while closing session");
        }
    }
}

impl SourceBackend for RemoteBackend {
    fn list(&mut self, path: &str) -> Result<Vec<String>, SourceError> {
        let target = (!path.is_empty()).then_some(path);
        let entries = self.nlst(target).map_err(|e| self.remote_error(path, e))?;
        let entries = listing_paths(path, entries);
        debug!(path = %path, count = entries.len(), "Listed remote directory");
        Ok(entries)
    }

    fn is_dir(&mut self, path: &str) -> Result<bool, SourceError> {
        let origin = self.pwd().map_err(|e| self.remote_error(path, e))?;
        match self.cwd(path) {
            Ok(()) => {
                self.cwd(&origin).map_err(|e| self.remote_error(&origin, e))?;
                Ok(true)
            }
            // CWD onto a plain file answers 550.
            Err(e) if reply_kind(reply_code(&e)) == ReplyKind::Missing => Ok(false),
            Err(e) => Err(self.remote_error(path, e)),
        }
    }

    fn read_all(&mut self, path: &str) -> Result<Vec<u8>, SourceError> {
        let bytes = self.retr(path).map_err(|e| self.remote_error(path, e))?;
        debug!(path = %path, size = bytes.len(), "Retrieved remote file");
        Ok(bytes)
    }

    fn accepts_entry(&self, path: &str) -> bool {
        is_path_safe(path)
    }
}

impl RemoteBackend {
    fn remote_error(&self, path: &str, error: FtpError) -> SourceError {
        classify_error(&self.server, path, error)
    }
}

fn classify_error(server: &str, path: &str, error: FtpError) -> SourceError {
    match reply_kind(reply_code(&error)) {
        ReplyKind::Missing => SourceError::NotFound(path.to_string()),
        ReplyKind::NotLoggedIn => SourceError::Auth {
            server: server.to_string(),
            reason: format!("session not logged in while accessing {path}: {error}"),
        },
        ReplyKind::Failed => SourceError::Transient {
            path: path.to_string(),
            source: error,
        },
    }
}

fn with_default_port(server: &str) -> String {
    if server.contains(':') {
        server.to_string()
    } else {
        format!("{server}:{DEFAULT_FTP_PORT}")
    }
}

/// TLS configuration shared by the control and data channels. The data
/// connections resume the control channel's session from its cache, which
/// servers with `require_ssl_reuse` insist on.
fn tls_config() -> Result<Arc<ClientConfig>, FtpError> {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| FtpError::SecureError(e.to_string()))?
    .with_root_certificates(roots)
    .with_no_client_auth();
    Ok(Arc::new(config))
}

fn open_secure(
    address: &str,
    host: &str,
    credentials: &RemoteCredentials,
) -> Result<RustlsFtpStream, FtpError> {
    let connector = RustlsConnector::from(tls_config()?);
    let mut stream = RustlsFtpStream::connect(address)?.into_secure(connector, host)?;
    stream.login(&credentials.username, &credentials.password)?;
    stream.transfer_type(FileType::Binary)?;
    Ok(stream)
}

fn open_plain(address: &str, credentials: &RemoteCredentials) -> Result<FtpStream, FtpError> {
    let mut stream = FtpStream::connect(address)?;
    stream.login(&credentials.username, &credentials.password)?;
    stream.transfer_type(FileType::Binary)?;
    Ok(stream)
}
