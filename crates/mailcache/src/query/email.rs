//! Email and folder retrieval

use anyhow::Result;

use crate::accounts::AccountRegistry;
use crate::models::{Email, Folder};
use crate::remote::api::FetchRange;
use crate::remote::normalize_message;
use crate::storage::MailStore;

/// Get a cached email by id, repairing a missing body when possible
///
/// If both bodies are empty, the message is fetched again by UID through the
/// owning account's session and the cache row is updated. Repair is best
/// effort: on any failure the cached record is returned as is. Only an
/// unknown id is an error.
pub fn get_email(store: &dyn MailStore, registry: &mut AccountRegistry, id: i64) -> Result<Email> {
    let email = store.get_email_by_id(id)?;
    if !email.has_no_body() {
        return Ok(email);
    }

    match repair_body(store, registry, &email) {
        Ok(Some(repaired)) => Ok(repaired),
        Ok(None) => Ok(email),
        Err(e) => {
            log::warn!("[REPAIR] Could not repair email {}: {:#}", id, e);
            Ok(email)
        }
    }
}

/// Re-fetch a bodyless email and write its body back to the cache
///
/// Returns `None` when the server no longer has a body for it either.
fn repair_body(
    store: &dyn MailStore,
    registry: &mut AccountRegistry,
    email: &Email,
) -> Result<Option<Email>> {
    log::info!(
        "[REPAIR] Email {} ({}/{} uid {}) has no body, fetching again",
        email.id,
        email.account_name,
        email.folder_path,
        email.uid
    );

    let handle = registry.get(&email.account_name)?;
    let fetched = handle.run(|session| {
        session.fetch_messages(&email.folder_path, FetchRange::Uid(email.uid))
    })?;

    let Some(raw) = fetched.into_iter().find(|m| m.uid == email.uid) else {
        log::warn!("[REPAIR] Server returned no message for uid {}", email.uid);
        return Ok(None);
    };

    let fresh = normalize_message(raw);
    if fresh.has_no_body() {
        log::warn!("[REPAIR] Re-fetched uid {} still has no body", email.uid);
        return Ok(None);
    }

    let mut record = email.to_record();
    record.body_text = fresh.body_text;
    record.body_html = fresh.body_html;
    record.headers = fresh.headers;
    store.upsert_email(email.account_id, email.folder_id, &record)?;

    log::info!("[REPAIR] Email {} body restored", email.id);

    let repaired = match store.get_email_by_id(email.id) {
        Ok(repaired) => repaired,
        Err(_) => Email {
            body_text: record.body_text,
            body_html: record.body_html,
            headers: record.headers,
            ..email.clone()
        },
    };
    Ok(Some(repaired))
}

/// List cached folders, optionally for one account by name
pub fn list_folders(store: &dyn MailStore, account: Option<&str>) -> Result<Vec<Folder>> {
    let account_id = match account {
        Some(name) => Some(store.get_account_id_by_name(name)?),
        None => None,
    };
    store.list_folders(account_id)
}
