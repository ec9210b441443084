//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use russh::Channel;
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg, PublicKey, decode_secret_key, load_secret_key};
use secrecy::ExposeSecret;

use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::error::{ChannelError, Result, TransportError};

/// An authenticated SSH connection.
pub struct SshTransport {
    session: Handle<SshHandler>,
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        // Sessions may sit idle for a long time in keep-alive mode
        let client_config = Arc::new(client::Config {
            inactivity_timeout: None,
            ..Default::default()
        });
        let rejection = Arc::new(Mutex::new(None));
        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            verification: config.host_key_verification.clone(),
            known_hosts: config.known_hosts_path.clone(),
            rejection: rejection.clone(),
        };

        debug!("connecting to {}", config.socket_addr());
        let connecting = client::connect(client_config, (config.host.as_str(), config.port), handler);
        let mut session = match tokio::time::timeout(config.timeout, connecting).await {
            Err(_) => return Err(TransportError::Timeout(config.timeout).into()),
            Ok(Err(e)) => {
                // russh only reports UnknownKey; the handler kept the reason
                let reason = rejection.lock().ok().and_then(|mut slot| slot.take());
                return Err(reason.unwrap_or(TransportError::Ssh(e)).into());
            }
            Ok(Ok(session)) => session,
        };

        if !Self::authenticate(&mut session, &config).await? {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }
        debug!("authenticated as {}", config.username);

        Ok(Self { session, config })
    }

    /// Open a session channel with a PTY and an interactive shell on it.
    pub async fn open_shell(&self) -> Result<Channel<Msg>> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(ChannelError::ShellRequestFailed)?;

        channel
            .request_pty(
                true,
                "xterm",
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(ChannelError::ShellRequestFailed)?;
        channel
            .request_shell(true)
            .await
            .map_err(ChannelError::ShellRequestFailed)?;

        debug!("shell open on {}", self.config.socket_addr());
        Ok(channel)
    }

    /// Try the configured credentials. `Ok(false)` means the server
    /// refused them.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<bool> {
        let user = config.username.as_str();
        let accepted = match &config.auth {
            AuthMethod::None => session.authenticate_none(user).await,
            AuthMethod::Password(password) => {
                session
                    .authenticate_password(user, password.expose_secret())
                    .await
            }
            auth => {
                let key = Arc::new(private_key(auth)?);
                // RSA keys need the strongest hash the server supports
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();
                session
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await
            }
        };

        Ok(accepted.map_err(TransportError::Ssh)?.success())
    }

    /// Disconnect from the server.
    pub async fn close(self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// Load or decode the key of a key-based [`AuthMethod`].
fn private_key(auth: &AuthMethod) -> std::result::Result<PrivateKey, TransportError> {
    let loaded = match auth {
        AuthMethod::PrivateKey { path, passphrase } => {
            load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
        }
        AuthMethod::KeyData { pem, passphrase } => decode_secret_key(
            pem.expose_secret(),
            passphrase.as_ref().map(|p| p.expose_secret()),
        ),
        AuthMethod::None | AuthMethod::Password(_) => {
            return Err(TransportError::Key("no key configured".to_string()));
        }
    };
    loaded.map_err(|e| TransportError::Key(e.to_string()))
}

/// Result of looking a server key up in known_hosts.
enum KnownKey {
    Match,
    Unknown,
}

/// russh client callbacks; only the server key check is customized.
struct SshHandler {
    host: String,
    port: u16,
    verification: HostKeyVerification,
    known_hosts: Option<PathBuf>,
    /// Why the last server key was refused.
    rejection: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    fn lookup(&self, key: &PublicKey) -> std::result::Result<KnownKey, TransportError> {
        let found = match &self.known_hosts {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, key),
        };
        match found {
            Ok(true) => Ok(KnownKey::Match),
            Ok(false) => Ok(KnownKey::Unknown),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    fn remember(&self, key: &PublicKey) {
        let saved = match &self.known_hosts {
            Some(path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, key, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, key),
        };
        match saved {
            Ok(()) => debug!("recorded new host key for {}:{}", self.host, self.port),
            Err(e) => warn!("could not record host key for {}:{}: {}", self.host, self.port, e),
        }
    }

    fn verify(&self, key: &PublicKey) -> std::result::Result<(), TransportError> {
        if matches!(self.verification, HostKeyVerification::Disabled) {
            return Ok(());
        }
        match (self.lookup(key)?, &self.verification) {
            (KnownKey::Match, _) => Ok(()),
            (KnownKey::Unknown, HostKeyVerification::AcceptNew) => {
                self.remember(key);
                Ok(())
            }
            (KnownKey::Unknown, _) => Err(TransportError::HostKeyUnknown {
                host: self.host.clone(),
                port: self.port,
            }),
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.verify(server_public_key) {
            Ok(()) => Ok(true),
            Err(error) => {
                warn!("rejecting server key: {}", error);
                if let Ok(mut slot) = self.rejection.lock() {
                    *slot = Some(error);
                }
                Ok(false)
            }
        }
    }
}
