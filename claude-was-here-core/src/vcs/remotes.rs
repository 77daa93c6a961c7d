use std::cell::RefCell;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use git2::{
    Cred, CredentialType, Error, ErrorClass, ErrorCode, FetchOptions, PushOptions,
    RemoteCallbacks, Repository,
};

/// Failure pushing or fetching the metadata ref. Always non-fatal to the
/// user's own git operation; callers log and move on.
#[derive(Debug)]
pub enum SyncError {
    General(String),
    Auth {
        remote: String,
        attempts: Vec<CredentialAttempt>,
    },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::General(message) => write!(f, "{message}"),
            SyncError::Auth { remote, attempts } => {
                write!(f, "authentication against `{remote}` failed (tried")?;
                for attempt in attempts {
                    write!(f, " {}", attempt.strategy.label())?;
                }
                write!(f, ")")
            }
        }
    }
}

impl std::error::Error for SyncError {}

impl SyncError {
    fn from_git(context: &str, err: Error) -> Self {
        SyncError::General(format!("{context}: {}", sanitize_error_message(&err)))
    }
}

fn sanitize_error_message(err: &Error) -> String {
    err.message().split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SshKeyKind {
    IdEd25519,
    IdRsa,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStrategy {
    CredentialHelper,
    SshKey(SshKeyKind),
    Username,
    Default,
}

impl CredentialStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            CredentialStrategy::CredentialHelper => "helper",
            CredentialStrategy::SshKey(SshKeyKind::IdEd25519) => "file-id_ed25519",
            CredentialStrategy::SshKey(SshKeyKind::IdRsa) => "file-id_rsa",
            CredentialStrategy::Username => "username",
            CredentialStrategy::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialAttempt {
    pub strategy: CredentialStrategy,
    pub failure: Option<String>,
}

fn user_home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

struct SshKeyPaths {
    private: PathBuf,
    public: Option<PathBuf>,
}

fn locate_default_key(kind: &SshKeyKind) -> Option<SshKeyPaths> {
    let home = user_home_dir()?;
    let key_name = match kind {
        SshKeyKind::IdEd25519 => "id_ed25519",
        SshKeyKind::IdRsa => "id_rsa",
    };

    let private = home.join(".ssh").join(key_name);
    if !private.exists() {
        return None;
    }

    let mut public = private.clone();
    public.set_extension("pub");
    let public = public.exists().then_some(public);

    Some(SshKeyPaths { private, public })
}

fn build_credential_plan(allowed: CredentialType, has_helper: bool) -> Vec<CredentialStrategy> {
    let mut plan = Vec::new();

    if has_helper && allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
        plan.push(CredentialStrategy::CredentialHelper);
    }
    if allowed.contains(CredentialType::SSH_KEY) {
        plan.push(CredentialStrategy::SshKey(SshKeyKind::IdEd25519));
        plan.push(CredentialStrategy::SshKey(SshKeyKind::IdRsa));
    }
    if allowed.contains(CredentialType::USERNAME) {
        plan.push(CredentialStrategy::Username);
    }
    plan.push(CredentialStrategy::Default);

    plan
}

fn apply_strategy(
    strategy: &CredentialStrategy,
    config: Option<&git2::Config>,
    url: &str,
    username_from_url: Option<&str>,
) -> Result<Cred, String> {
    let username = username_from_url.unwrap_or("git");

    match strategy {
        CredentialStrategy::CredentialHelper => match config {
            Some(cfg) => Cred::credential_helper(cfg, url, username_from_url)
                .map_err(|err| format!("credential helper: {}", sanitize_error_message(&err))),
            None => Err("no git config available for credential helper".to_string()),
        },
        CredentialStrategy::SshKey(kind) => match locate_default_key(kind) {
            Some(paths) => Cred::ssh_key(username, paths.public.as_deref(), &paths.private, None)
                .map_err(|err| {
                    if err.class() == ErrorClass::Ssh && err.code() == ErrorCode::Auth {
                        "key requires a passphrase or ssh-agent session".to_string()
                    } else {
                        sanitize_error_message(&err)
                    }
                }),
            None => Err("no default key on disk".to_string()),
        },
        CredentialStrategy::Username => {
            Cred::username(username).map_err(|err| sanitize_error_message(&err))
        }
        CredentialStrategy::Default => {
            Cred::default().map_err(|err| sanitize_error_message(&err))
        }
    }
}

fn callbacks(
    repo: &Repository,
    attempts: Rc<RefCell<Vec<CredentialAttempt>>>,
) -> RemoteCallbacks<'static> {
    let config = repo.config().ok().map(Rc::new);

    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed| {
        let plan = build_credential_plan(allowed, config.is_some());
        let mut last_failure = None;

        for strategy in plan {
            match apply_strategy(&strategy, config.as_deref(), url, username_from_url) {
                Ok(cred) => {
                    if let Ok(mut log) = attempts.try_borrow_mut() {
                        log.push(CredentialAttempt {
                            strategy,
                            failure: None,
                        });
                    }
                    return Ok(cred);
                }
                Err(message) => {
                    if let Ok(mut log) = attempts.try_borrow_mut() {
                        log.push(CredentialAttempt {
                            strategy,
                            failure: Some(message.clone()),
                        });
                    }
                    last_failure = Some(message);
                }
            }
        }

        Err(Error::from_str(
            &last_failure.unwrap_or_else(|| "no credential strategy succeeded".to_string()),
        ))
    });

    callbacks
}

fn auth_exhausted(attempts: &[CredentialAttempt]) -> bool {
    !attempts.is_empty() && attempts.iter().all(|attempt| attempt.failure.is_some())
}

/// Send the metadata ref to the remote. Branch refs are never touched; the
/// refspec names the notes ref on both sides.
pub fn push_notes(repo: &Repository, remote_name: &str, notes_ref: &str) -> Result<(), SyncError> {
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|err| SyncError::from_git("unable to locate remote", err))?;

    let attempts: Rc<RefCell<Vec<CredentialAttempt>>> = Rc::new(RefCell::new(Vec::new()));
    let rejections: Rc<RefCell<Vec<(String, String)>>> = Rc::new(RefCell::new(Vec::new()));

    let mut cbs = callbacks(repo, Rc::clone(&attempts));
    let rejections_for_cb = Rc::clone(&rejections);
    cbs.push_update_reference(move |refname, status| {
        if let Some(status) = status
            && let Ok(mut entries) = rejections_for_cb.try_borrow_mut()
        {
            entries.push((refname.to_string(), status.to_string()));
        }
        Ok(())
    });

    let mut opts = PushOptions::new();
    opts.remote_callbacks(cbs);

    let refspec = format!("{notes_ref}:{notes_ref}");
    if let Err(err) = remote.push(&[refspec.as_str()], Some(&mut opts)) {
        let attempts = attempts.borrow().clone();
        if auth_exhausted(&attempts) {
            return Err(SyncError::Auth {
                remote: remote_name.to_string(),
                attempts,
            });
        }
        return Err(SyncError::from_git("failed to push metadata ref", err));
    }

    let rejections = rejections.borrow();
    if let Some((name, status)) = rejections.first() {
        return Err(SyncError::General(format!(
            "remote rejected {name}: {status}"
        )));
    }

    Ok(())
}

/// Fetch the remote metadata ref into `staging_ref` for reconciliation.
/// Returns false when the remote has no metadata ref yet.
pub fn fetch_notes(
    repo: &Repository,
    remote_name: &str,
    notes_ref: &str,
    staging_ref: &str,
) -> Result<bool, SyncError> {
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|err| SyncError::from_git("unable to locate remote", err))?;

    let attempts: Rc<RefCell<Vec<CredentialAttempt>>> = Rc::new(RefCell::new(Vec::new()));
    let mut opts = FetchOptions::new();
    opts.remote_callbacks(callbacks(repo, Rc::clone(&attempts)));

    let refspec = format!("+{notes_ref}:{staging_ref}");
    if let Err(err) = remote.fetch(&[refspec.as_str()], Some(&mut opts), None) {
        let attempts = attempts.borrow().clone();
        if auth_exhausted(&attempts) {
            return Err(SyncError::Auth {
                remote: remote_name.to_string(),
                attempts,
            });
        }
        // A remote without the ref is an empty fetch, not a failure.
        if err.code() == ErrorCode::NotFound {
            return Ok(false);
        }
        return Err(SyncError::from_git("failed to fetch metadata ref", err));
    }

    Ok(repo.find_reference(staging_ref).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_prefers_helper_then_keys_then_default() {
        let plan = build_credential_plan(
            CredentialType::USER_PASS_PLAINTEXT | CredentialType::SSH_KEY,
            true,
        );
        assert_eq!(plan.first(), Some(&CredentialStrategy::CredentialHelper));
        assert_eq!(plan.last(), Some(&CredentialStrategy::Default));
        assert!(plan.contains(&CredentialStrategy::SshKey(SshKeyKind::IdEd25519)));
    }

    #[test]
    fn plan_without_helper_still_ends_in_default() {
        let plan = build_credential_plan(CredentialType::USERNAME, false);
        assert_eq!(
            plan,
            vec![CredentialStrategy::Username, CredentialStrategy::Default]
        );
    }

    #[test]
    fn auth_exhausted_requires_every_attempt_failing() {
        assert!(!auth_exhausted(&[]));
        let failed = CredentialAttempt {
            strategy: CredentialStrategy::Default,
            failure: Some("nope".to_string()),
        };
        let ok = CredentialAttempt {
            strategy: CredentialStrategy::Default,
            failure: None,
        };
        assert!(auth_exhausted(&[failed.clone()]));
        assert!(!auth_exhausted(&[failed, ok]));
    }
}
