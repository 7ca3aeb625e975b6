//! Remote shell sessions.
//!
//! [`ShellConnector`] opens a [`RemoteShell`] to a target; fact extractors
//! only ever see the `RemoteShell` trait. The shipped implementation,
//! [`SshConnector`], holds one authenticated russh session per target and
//! opens a fresh channel for every command.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use directories::BaseDirs;
use russh::{ChannelMsg, client};
use russh_keys::key::{KeyPair, PublicKey};
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::Error;
use crate::transport::{Credential, SshOptions};

/// Output of a single remote command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status, `None` if the command was killed by a signal.
    pub status: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Turn a non-zero exit into [`Error::CommandFailed`].
    pub fn into_success(self, command: &str) -> Result<Self, Error> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::CommandFailed {
                command: command.to_owned(),
                status: self.status.unwrap_or(-1),
                stderr: self.stderr.trim().to_owned(),
            })
        }
    }
}

/// An established session able to run commands on one target.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    fn address(&self) -> IpAddr;

    /// Run `command` and collect its output. Transport failures are
    /// errors; a command that ran and exited non-zero is not.
    async fn exec(&self, command: &str) -> Result<CommandOutput, Error>;
}

/// Factory for [`RemoteShell`] sessions.
#[async_trait]
pub trait ShellConnector: Send + Sync {
    /// Open (and authenticate) a session. Refused, closed, rejected, and
    /// timed-out attempts all surface as [`Error`].
    async fn connect(&self, address: IpAddr, timeout: Duration)
    -> Result<Box<dyn RemoteShell>, Error>;
}

// ── Error mapping ───────────────────────────────────────────────────

/// Who we were talking to, for attributing transport errors.
#[derive(Debug, Clone)]
struct Peer {
    address: IpAddr,
    user: String,
    timeout: Duration,
}

impl Peer {
    fn timed_out(&self) -> Error {
        Error::Timeout {
            timeout_secs: self.timeout.as_secs(),
        }
    }

    fn io_error(&self, err: io::Error) -> Error {
        let address = self.address.to_string();
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Error::Refused { address },
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Error::Closed { address },
            io::ErrorKind::TimedOut => self.timed_out(),
            _ => Error::Io(err),
        }
    }

    fn ssh_error(&self, err: russh::Error) -> Error {
        match err {
            russh::Error::IO(e) => self.io_error(e),
            russh::Error::Disconnect | russh::Error::HUP => Error::Closed {
                address: self.address.to_string(),
            },
            russh::Error::NotAuthenticated => Error::AuthRejected {
                user: self.user.clone(),
                address: self.address.to_string(),
            },
            russh::Error::UnknownKey => Error::HostKeyMismatch {
                address: self.address.to_string(),
            },
            russh::Error::ConnectionTimeout => self.timed_out(),
            other => Error::Protocol(other.to_string()),
        }
    }
}

// ── Host key policy ─────────────────────────────────────────────────

struct HostKeyCheck {
    host: String,
    port: u16,
    known_hosts: Option<PathBuf>,
}

#[async_trait]
impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let Some(ref path) = self.known_hosts else {
            return Ok(true);
        };
        match russh_keys::check_known_hosts_path(&self.host, self.port, server_public_key, path) {
            Ok(true) => Ok(true),
            Ok(false) => {
                debug!(host = %self.host, file = %path.display(), "learning new host key");
                russh_keys::learn_known_hosts_path(&self.host, self.port, server_public_key, path)?;
                Ok(true)
            }
            Err(e) => {
                warn!(host = %self.host, error = %e, "host key rejected");
                Ok(false)
            }
        }
    }
}

// ── russh connector ─────────────────────────────────────────────────

/// Connector speaking SSH natively through russh.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    options: SshOptions,
}

impl SshConnector {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }
}

#[async_trait]
impl ShellConnector for SshConnector {
    async fn connect(
        &self,
        address: IpAddr,
        timeout: Duration,
    ) -> Result<Box<dyn RemoteShell>, Error> {
        let peer = Peer {
            address,
            user: self.options.user.clone(),
            timeout,
        };
        let target = SocketAddr::new(address, self.options.port);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(target))
            .await
            .map_err(|_| peer.timed_out())?
            .map_err(|e| peer.io_error(e))?;

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(self.options.command_timeout),
            ..Default::default()
        });
        let handler = HostKeyCheck {
            host: address.to_string(),
            port: self.options.port,
            known_hosts: self.options.known_hosts.clone(),
        };
        let mut handle = tokio::time::timeout(
            timeout,
            client::connect_stream(config, stream, handler),
        )
        .await
        .map_err(|_| peer.timed_out())?
        .map_err(|e| peer.ssh_error(e))?;

        let dirs = BaseDirs::new();
        let credentials = self.options.credentials(dirs.as_ref().map(BaseDirs::home_dir));
        let accepted = tokio::time::timeout(timeout, authenticate(&mut handle, &peer, &credentials))
            .await
            .map_err(|_| peer.timed_out())??;
        if !accepted {
            return Err(Error::AuthRejected {
                user: peer.user,
                address: address.to_string(),
            });
        }
        debug!(%address, user = %peer.user, "ssh session established");

        Ok(Box::new(SshSession {
            handle,
            peer: Peer {
                timeout: self.options.command_timeout,
                ..peer
            },
        }))
    }
}

/// Try each credential in turn. A key that cannot be loaded is skipped;
/// if nothing was accepted, the last load failure is reported instead of
/// a plain rejection.
async fn authenticate(
    handle: &mut client::Handle<HostKeyCheck>,
    peer: &Peer,
    credentials: &[Credential],
) -> Result<bool, Error> {
    let mut load_failure = None;
    for credential in credentials {
        let accepted = match credential {
            Credential::PrivateKey(path) => match load_private_key(path).await {
                Ok(key) => handle
                    .authenticate_publickey(peer.user.as_str(), Arc::new(key))
                    .await
                    .map_err(|e| peer.ssh_error(e))?,
                Err(e) => {
                    warn!(key = %path.display(), error = %e, "skipping private key");
                    load_failure = Some(e);
                    continue;
                }
            },
            Credential::Password(password) => handle
                .authenticate_password(peer.user.as_str(), password.expose_secret())
                .await
                .map_err(|e| peer.ssh_error(e))?,
        };
        if accepted {
            return Ok(true);
        }
    }
    load_failure.map_or(Ok(false), Err)
}

async fn load_private_key(path: &Path) -> Result<KeyPair, Error> {
    let content = tokio::fs::read_to_string(path).await?;
    russh_keys::decode_secret_key(&content, None).map_err(|e| Error::InvalidKey {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

struct SshSession {
    handle: client::Handle<HostKeyCheck>,
    peer: Peer,
}

impl SshSession {
    async fn run(&self, command: &str) -> Result<CommandOutput, Error> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| self.peer.ssh_error(e))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| self.peer.ssh_error(e))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut status = None;
        let mut closed = false;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status } => status = Some(exit_status),
                ChannelMsg::Close => {
                    closed = true;
                    break;
                }
                _ => {}
            }
        }

        // The session ended before the server closed the channel.
        if !closed && status.is_none() {
            return Err(Error::Closed {
                address: self.peer.address.to_string(),
            });
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            status: status.and_then(|s| i32::try_from(s).ok()),
        })
    }
}

#[async_trait]
impl RemoteShell for SshSession {
    fn address(&self) -> IpAddr {
        self.peer.address
    }

    async fn exec(&self, command: &str) -> Result<CommandOutput, Error> {
        tokio::time::timeout(self.peer.timeout, self.run(command))
            .await
            .map_err(|_| self.peer.timed_out())?
    }
}
