//! Token providers shipped with the client

use super::{AuthError, AuthToken, TokenProvider};
use crate::config::AuthConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Build the provider described by the `[auth]` config section
///
/// A literal token wins over a token file.
pub fn provider_from_config(config: &AuthConfig) -> Arc<dyn TokenProvider> {
    if let Some(token) = config.token.as_deref().map(str::trim) {
        if !token.is_empty() {
            return Arc::new(StaticTokenProvider::new(AuthToken::new(token)));
        }
    }

    Arc::new(FileTokenProvider::new(
        config.token_path(),
        config.refresh_command.clone(),
    ))
}

/// Provider holding one fixed token
///
/// Refreshing is a no-op, so a rejected token stays rejected.
pub struct StaticTokenProvider {
    token: AuthToken,
}

impl StaticTokenProvider {
    pub fn new(token: AuthToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    fn current(&self) -> Option<AuthToken> {
        Some(self.token.clone())
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        tracing::debug!("Static token provider asked to refresh, keeping token");
        Ok(())
    }
}

/// Provider backed by a token file
///
/// The file holds the raw token, surrounding whitespace ignored. On refresh
/// the configured command is run and its stdout becomes the new token (and
/// is written back to the file); without a command the file is re-read,
/// which picks up tokens written by an external login tool.
pub struct FileTokenProvider {
    path: PathBuf,
    refresh_command: Vec<String>,
    token: RwLock<Option<AuthToken>>,
}

impl FileTokenProvider {
    /// Create a provider, loading the token file if it already exists
    pub fn new(path: impl Into<PathBuf>, refresh_command: Vec<String>) -> Self {
        let path = path.into();
        let token = match read_token_file(&path) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable token file");
                None
            }
        };

        Self {
            path,
            refresh_command,
            token: RwLock::new(token),
        }
    }

    /// Path of the backing token file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn run_refresh_command(&self) -> Result<AuthToken, AuthError> {
        let command = self.refresh_command.join(" ");
        let (program, args) = match self.refresh_command.split_first() {
            Some(parts) => parts,
            None => return Err(AuthError::EmptyToken),
        };

        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| AuthError::CommandFailed {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(AuthError::CommandFailed {
                command,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AuthError::EmptyToken);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| self.io_error(e))?;

        Ok(AuthToken::new(raw))
    }

    fn io_error(&self, error: std::io::Error) -> AuthError {
        AuthError::Io {
            path: self.path.clone(),
            error: error.to_string(),
        }
    }
}

#[async_trait]
impl TokenProvider for FileTokenProvider {
    fn current(&self) -> Option<AuthToken> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        let token = if self.refresh_command.is_empty() {
            read_token_file_async(&self.path)
                .await?
                .ok_or(AuthError::EmptyToken)?
        } else {
            self.run_refresh_command().await?
        };

        tracing::info!(path = ?self.path, "Bearer token refreshed");
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Ok(())
    }
}

/// Read a token file; a missing or blank file means "no token yet"
fn read_token_file(path: &Path) -> Result<Option<AuthToken>, AuthError> {
    parse_token_file(path, std::fs::read_to_string(path))
}

async fn read_token_file_async(path: &Path) -> Result<Option<AuthToken>, AuthError> {
    parse_token_file(path, tokio::fs::read_to_string(path).await)
}

fn parse_token_file(
    path: &Path,
    read: std::io::Result<String>,
) -> Result<Option<AuthToken>, AuthError> {
    match read {
        Ok(content) => {
            let content = content.trim();
            if content.is_empty() {
                Ok(None)
            } else {
                Ok(Some(AuthToken::new(content)))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AuthError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_has_no_token() {
        let dir = TempDir::new().unwrap();
        let provider = FileTokenProvider::new(dir.path().join("token"), Vec::new());
        assert!(provider.current().is_none());
    }

    #[test]
    fn test_file_token_is_trimmed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "  tok-1\n").unwrap();

        let provider = FileTokenProvider::new(&path, Vec::new());
        assert_eq!(provider.current(), Some(AuthToken::new("tok-1")));
    }

    #[tokio::test]
    async fn test_refresh_rereads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "old").unwrap();

        let provider = FileTokenProvider::new(&path, Vec::new());
        std::fs::write(&path, "new").unwrap();
        provider.refresh().await.unwrap();

        assert_eq!(provider.current(), Some(AuthToken::new("new")));
    }

    #[tokio::test]
    async fn test_refresh_without_token_source_fails() {
        let dir = TempDir::new().unwrap();
        let provider = FileTokenProvider::new(dir.path().join("token"), Vec::new());

        let err = provider.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::EmptyToken));
    }

    #[tokio::test]
    async fn test_refresh_keeps_token_when_file_blanked() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "old").unwrap();

        let provider = FileTokenProvider::new(&path, Vec::new());
        std::fs::write(&path, "  \n").unwrap();

        let err = provider.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::EmptyToken));
        assert_eq!(provider.current(), Some(AuthToken::new("old")));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_refresh_reads_file_on_single_threaded_runtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token");

        let provider = FileTokenProvider::new(&path, Vec::new());
        assert!(provider.current().is_none());

        tokio::fs::write(&path, "late-token\n").await.unwrap();
        provider.refresh().await.unwrap();
        assert_eq!(provider.current(), Some(AuthToken::new("late-token")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_refresh_command_writes_token_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("token");
        let provider = FileTokenProvider::new(
            &path,
            vec!["echo".to_string(), "fresh-token".to_string()],
        );

        provider.refresh().await.unwrap();

        assert_eq!(provider.current(), Some(AuthToken::new("fresh-token")));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh-token");
    }

    #[test]
    fn test_config_token_wins_over_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "from-file").unwrap();

        let mut config = AuthConfig {
            token: Some(" from-config ".to_string()),
            token_file: path.to_string_lossy().to_string(),
            refresh_command: Vec::new(),
        };
        let provider = provider_from_config(&config);
        assert_eq!(provider.current(), Some(AuthToken::new("from-config")));

        config.token = Some("   ".to_string());
        let provider = provider_from_config(&config);
        assert_eq!(provider.current(), Some(AuthToken::new("from-file")));
    }

    #[tokio::test]
    async fn test_static_provider_keeps_token() {
        let provider = StaticTokenProvider::new(AuthToken::new("fixed"));
        provider.refresh().await.unwrap();
        assert_eq!(provider.current(), Some(AuthToken::new("fixed")));
    }
}
