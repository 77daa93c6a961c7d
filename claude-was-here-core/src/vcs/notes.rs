use std::time::Duration;

use git2::{Error, ErrorCode, Oid, Repository};

const WRITE_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Annotation blob attached to `commit` under `notes_ref`, if any. A note
/// whose content is not valid UTF-8 reads as absent.
pub fn read(repo: &Repository, notes_ref: &str, commit: Oid) -> Result<Option<String>, Error> {
    match repo.find_note(Some(notes_ref), commit) {
        Ok(note) => Ok(note.message().map(str::to_string)),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Attach (or overwrite) the note on `commit`. The ref update is retried on
/// lock contention; after the final attempt the error surfaces to the caller.
pub fn write(repo: &Repository, notes_ref: &str, commit: Oid, content: &str) -> Result<(), Error> {
    let sig = super::signature(repo)?;

    let mut attempt = 1;
    loop {
        match repo.note(&sig, &sig, Some(notes_ref), commit, content, true) {
            Ok(_) => return Ok(()),
            Err(err) if err.code() == ErrorCode::Locked && attempt < WRITE_ATTEMPTS => {
                attempt += 1;
                std::thread::sleep(RETRY_BACKOFF);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Every `(annotated commit, blob)` pair under the ref. A missing ref is an
/// empty list, not an error.
pub fn list(repo: &Repository, notes_ref: &str) -> Result<Vec<(Oid, String)>, Error> {
    let notes = match repo.notes(Some(notes_ref)) {
        Ok(notes) => notes,
        Err(err) if err.code() == ErrorCode::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut out = Vec::new();
    for item in notes {
        let (_, annotated) = item?;
        if let Some(blob) = read(repo, notes_ref, annotated)? {
            out.push((annotated, blob));
        }
    }
    Ok(out)
}
