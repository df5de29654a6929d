//! Git credential handling.

use git2::{Cred, FetchOptions, RemoteCallbacks};
use hookwarden_common_secret::{Secret, TokenGenerator};

/// Libgit2 keeps asking for credentials while the remote rejects them.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Credentials presented to a remote.
#[derive(Debug, Clone)]
pub enum GitCredential {
    /// HTTPS personal access token.
    Token {
        /// Username (usually "x-access-token").
        username: String,
        /// The token.
        token: Secret<String>,
    },
    /// Whatever libgit2 finds on its own (local remotes, credential helpers).
    Default,
}

impl GitCredential {
    /// Create token credential.
    pub fn token(token: Secret<String>) -> Self {
        Self::Token {
            username: "x-access-token".to_string(),
            token,
        }
    }

    /// Resolve the live API token, falling back to [`GitCredential::Default`].
    pub fn from_generator(generator: Option<&TokenGenerator>) -> Self {
        generator
            .and_then(TokenGenerator::token)
            .and_then(|bytes| bytes.to_utf8())
            .map(Self::token)
            .unwrap_or(Self::Default)
    }

    /// Convert to git2 Cred.
    pub fn to_git2(&self) -> Result<Cred, git2::Error> {
        match self {
            Self::Token { username, token } => Cred::userpass_plaintext(username, token.expose()),
            Self::Default => Cred::default(),
        }
    }

    /// Fetch options whose callbacks answer with this credential.
    pub fn fetch_options(&self) -> FetchOptions<'static> {
        let credential = self.clone();
        let mut attempts = 0;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, _username, _allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("remote rejected credentials"));
            }
            credential.to_git2()
        });

        let mut options = FetchOptions::new();
        options.remote_callbacks(callbacks);
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_generator_uses_token() {
        let generator = TokenGenerator::fixed("/etc/github/oauth", "ghp_abc");
        match GitCredential::from_generator(Some(&generator)) {
            GitCredential::Token { username, token } => {
                assert_eq!(username, "x-access-token");
                assert_eq!(token.expose(), "ghp_abc");
            }
            other => panic!("expected token credential, got {other:?}"),
        }
    }

    #[test]
    fn test_from_generator_without_token() {
        assert!(matches!(
            GitCredential::from_generator(None),
            GitCredential::Default
        ));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let credential = GitCredential::token(Secret::new("ghp_abc".to_string()));
        assert!(!format!("{credential:?}").contains("ghp_abc"));
    }
}
