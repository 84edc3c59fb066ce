use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use zeroize::Zeroizing;

use crate::barrier::{Phase, Progress};
use crate::cli::SessionCommand;
use crate::domain::{Secret, SecretId, SplitConfig};
use crate::lifecycle::{CombineHandle, SecretLifecycle, SignOutcome, SigningHandle, UnsignOutcome};
use crate::session::SessionContext;

/// Source of interactive answers for one participant session
pub trait Prompter {
    /// Reads a visible line
    ///
    /// # Errors
    /// Returns an error if input cannot be read
    fn ask(&mut self, prompt: &str) -> Result<String>;

    /// Reads a line without echoing it
    ///
    /// # Errors
    /// Returns an error if input cannot be read
    fn ask_hidden(&mut self, prompt: &str) -> Result<Zeroizing<String>>;
}

/// Messages for the session that issued a command, including those that
/// arrive later from background waits
///
/// A recovered secret travels to the requester as one of these, so every
/// message is wiped once the receiver drops it.
pub type Notices = mpsc::UnboundedSender<Zeroizing<String>>;

fn notify(notices: &Notices, message: impl Into<String>) {
    // A closed receiver means the session is gone; nothing left to tell
    let _ = notices.send(Zeroizing::new(message.into()));
}

/// Asks for a new passphrase twice
fn read_new_passphrase<P: Prompter>(prompter: &mut P) -> Result<Zeroizing<String>> {
    let passphrase = prompter.ask_hidden("Your encryption passphrase")?;
    let confirm = prompter.ask_hidden("Confirm your encryption passphrase")?;
    if passphrase.is_empty() {
        bail!("Passphrase must not be empty");
    }
    if *passphrase != *confirm {
        bail!("Passphrases do not match");
    }
    Ok(passphrase)
}

/// Formats a row of `list` output
#[must_use]
pub fn format_secret_row(secret: &Secret) -> String {
    format!(
        "{}\t{}/{}\t{}\t{}\t{}",
        secret.id,
        *secret.threshold,
        *secret.parts,
        secret.status(),
        secret.label,
        secret.created_at.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Renders a recovered secret for its requester, as text when it is UTF-8
/// and as hex otherwise
///
/// The buffer is sized up front so the plaintext is never left behind in a
/// reallocated, unwiped copy.
fn recovered_notice(requester: &str, id: &SecretId, plaintext: &[u8]) -> Zeroizing<String> {
    let prefix = format!("[{requester}] Recovered secret {id}: ");
    let mut message = Zeroizing::new(String::with_capacity(prefix.len() + plaintext.len() * 2));
    message.push_str(&prefix);
    match std::str::from_utf8(plaintext) {
        Ok(text) => message.push_str(text),
        Err(_) => {
            let out: &mut String = &mut message;
            for byte in plaintext {
                let _ = write!(out, "{byte:02x}");
            }
        }
    }
    message
}

fn describe_progress(id: &SecretId, verb: &str, progress: Progress) -> String {
    format!(
        "Secret {id}: {}/{} {verb}",
        progress.received, progress.expected
    )
}

/// Runs one command for `ctx`
///
/// `split` and `combine` return straight after setting up; their waits run
/// on background tasks that report through `notices`. The handle of that
/// task is returned so callers can await it.
///
/// # Errors
/// Returns an error if input is invalid or the engine rejects the command
pub async fn execute<P: Prompter>(
    engine: &SecretLifecycle,
    ctx: &SessionContext,
    command: SessionCommand,
    prompter: &mut P,
    notices: &Notices,
) -> Result<Option<JoinHandle<()>>> {
    match command {
        SessionCommand::Split { parts, threshold } => {
            let config = SplitConfig::from_raw(parts, *threshold)?;
            let label = prompter.ask("Label")?;
            let secret = prompter.ask_hidden("The secret to split")?;
            let passphrase = read_new_passphrase(prompter)?;

            let raw = Zeroizing::new(secret.as_bytes().to_vec());
            let handle = engine
                .create(ctx, label.trim(), raw, passphrase, config)
                .context("Failed to create secret")?;
            let id = handle.secret().id;
            notify(
                notices,
                format!("Secret {id} created ({config}). Ask the other holders to run: sign {id}"),
            );
            Ok(Some(tokio::spawn(await_signatures(handle, notices.clone()))))
        }
        SessionCommand::Sign { id } => {
            let passphrase = read_new_passphrase(prompter)?;
            match engine
                .sign(ctx, &id, passphrase)
                .with_context(|| format!("Failed to sign secret {id}"))?
            {
                SignOutcome::Accepted(progress) => {
                    notify(notices, describe_progress(&id, "signed", progress));
                }
                SignOutcome::AlreadySigned => {
                    notify(notices, format!("You already signed secret {id}"));
                }
            }
            Ok(None)
        }
        SessionCommand::Combine { id } => {
            let handle = engine
                .begin_combine(ctx, &id)
                .with_context(|| format!("Failed to combine secret {id}"))?;
            notify(
                notices,
                format!(
                    "Combining secret {id}: {} holders must run: unsign {id}",
                    *handle.secret().threshold
                ),
            );
            let requester = ctx.username().to_string();
            Ok(Some(tokio::spawn(await_unsignings(
                handle,
                requester,
                notices.clone(),
            ))))
        }
        SessionCommand::Unsign { id } => {
            let passphrase = prompter.ask_hidden("Your encryption passphrase")?;
            let outcome = engine
                .unsign(ctx, &id, &passphrase)
                .await
                .with_context(|| format!("Failed to unsign secret {id}"))?;
            let message = match outcome {
                UnsignOutcome::Accepted { progress, .. } => describe_progress(&id, "unsigned", progress),
                UnsignOutcome::NoShares => format!("You hold no share of secret {id}"),
                UnsignOutcome::NoMatchingShare => {
                    "Passphrase did not unlock any of your shares, try again".to_string()
                }
                UnsignOutcome::AlreadyContributed => {
                    format!("Your share is already part of the combine for secret {id}")
                }
            };
            notify(notices, message);
            Ok(None)
        }
        SessionCommand::List => {
            let secrets = engine.list(ctx).context("Failed to list secrets")?;
            if secrets.is_empty() {
                notify(notices, "No secrets");
            }
            for secret in &secrets {
                notify(notices, format_secret_row(secret));
            }
            Ok(None)
        }
        SessionCommand::Abort { id } => {
            engine
                .abort(ctx, &id)
                .with_context(|| format!("Failed to abort secret {id}"))?;
            notify(notices, format!("Secret {id} aborted"));
            Ok(None)
        }
        SessionCommand::Cancel { id } => {
            engine
                .cancel_combine(ctx, &id)
                .with_context(|| format!("Failed to cancel combine of secret {id}"))?;
            notify(notices, format!("Combine of secret {id} cancelled"));
            Ok(None)
        }
    }
}

async fn await_signatures(handle: SigningHandle, notices: Notices) {
    let id = handle.secret().id;
    let mut progress = handle.progress();
    let wait = handle.wait();
    tokio::pin!(wait);
    let mut watching = true;

    loop {
        tokio::select! {
            outcome = &mut wait => {
                match outcome {
                    Ok(secret) => notify(
                        &notices,
                        format!("Secret {id} is ready: {} shares stored", *secret.parts),
                    ),
                    Err(e) => notify(&notices, format!("Secret {id} was not split: {e}")),
                }
                break;
            }
            changed = progress.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let snapshot = *progress.borrow_and_update();
                if snapshot.phase == Phase::Collecting {
                    notify(&notices, describe_progress(&id, "signed", snapshot));
                }
            }
        }
    }
}

async fn await_unsignings(handle: CombineHandle, requester: String, notices: Notices) {
    let id = handle.secret().id;
    let mut progress = handle.progress();
    let recover = handle.recover();
    tokio::pin!(recover);
    let mut watching = true;

    loop {
        tokio::select! {
            outcome = &mut recover => {
                match outcome {
                    Ok(plaintext) => {
                        let _ = notices.send(recovered_notice(&requester, &id, &plaintext));
                    }
                    Err(e) => notify(&notices, format!("Secret {id} was not recovered: {e}")),
                }
                break;
            }
            changed = progress.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let snapshot = *progress.borrow_and_update();
                if snapshot.phase == Phase::Collecting {
                    notify(&notices, describe_progress(&id, "unsigned", snapshot));
                }
            }
        }
    }
}
