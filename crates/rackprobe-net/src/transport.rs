// Shared SSH transport options.
//
// One `SshOptions` value is shared by every session the connector opens:
// user, port, credentials, host key policy, and timeouts.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Key files tried when neither a key nor a password is configured.
const DEFAULT_KEY_FILES: [&str; 3] = [".ssh/id_ed25519", ".ssh/id_rsa", ".ssh/id_ecdsa"];

/// How to reach a host over SSH.
#[derive(Debug, Clone)]
pub struct SshOptions {
    pub user: String,
    pub port: u16,
    /// Private key used for public key authentication.
    pub identity_file: Option<PathBuf>,
    /// Password used when key authentication is absent or rejected.
    pub password: Option<SecretString>,
    /// OpenSSH `known_hosts` file. Unknown hosts are learned on first
    /// contact and a changed key rejects the connection. `None` accepts
    /// any host key.
    pub known_hosts: Option<PathBuf>,
    pub connect_timeout: Duration,
    /// Upper bound for a single remote command.
    pub command_timeout: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            user: "root".into(),
            port: 22,
            identity_file: None,
            password: None,
            known_hosts: None,
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(60),
        }
    }
}

/// One authentication attempt.
#[derive(Debug, Clone)]
pub enum Credential {
    PrivateKey(PathBuf),
    Password(SecretString),
}

impl SshOptions {
    /// Authentication attempts in the order they are tried: the configured
    /// key, then the password. With neither configured, the default key
    /// files under `home` that exist.
    pub fn credentials(&self, home: Option<&std::path::Path>) -> Vec<Credential> {
        let mut creds = Vec::new();
        if let Some(ref key) = self.identity_file {
            creds.push(Credential::PrivateKey(key.clone()));
        }
        if let Some(ref password) = self.password {
            creds.push(Credential::Password(password.clone()));
        }
        if creds.is_empty() {
            if let Some(home) = home {
                creds.extend(
                    DEFAULT_KEY_FILES
                        .iter()
                        .map(|rel| home.join(rel))
                        .filter(|path| path.exists())
                        .map(Credential::PrivateKey),
                );
            }
        }
        creds
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn configured_key_is_tried_before_password() {
        let opts = SshOptions {
            identity_file: Some(PathBuf::from("/etc/rackprobe/id_ed25519")),
            password: Some(SecretString::from("hunter2".to_owned())),
            ..SshOptions::default()
        };
        let creds = opts.credentials(None);
        assert_eq!(creds.len(), 2);
        assert!(matches!(&creds[0], Credential::PrivateKey(p) if p.ends_with("id_ed25519")));
        assert!(matches!(&creds[1], Credential::Password(pw) if pw.expose_secret() == "hunter2"));
    }

    #[test]
    fn password_alone_is_a_credential() {
        let opts = SshOptions {
            password: Some(SecretString::from("s3cret".to_owned())),
            ..SshOptions::default()
        };
        let creds = opts.credentials(None);
        assert!(matches!(creds.as_slice(), [Credential::Password(_)]));
    }

    #[test]
    fn default_keys_are_used_only_when_present() {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir(home.path().join(".ssh")).unwrap();
        std::fs::write(home.path().join(".ssh/id_rsa"), "key").unwrap();

        let creds = SshOptions::default().credentials(Some(home.path()));
        assert!(matches!(creds.as_slice(), [Credential::PrivateKey(p)] if p.ends_with("id_rsa")));
    }

    #[test]
    fn debug_output_redacts_password() {
        let opts = SshOptions {
            password: Some(SecretString::from("hunter2".to_owned())),
            ..SshOptions::default()
        };
        assert!(!format!("{opts:?}").contains("hunter2"));
    }
}
