//! Removing PDF encryption
//!
//! Attempts run in a fixed order: the password as given, the trimmed
//! password, the empty password, and finally loading with the encryption
//! dictionary ignored. The first attempt that yields pages wins and its
//! pages are copied into a fresh, unencrypted document. When the standard
//! handler rejects every password there is nothing to fall back to.

use super::assemble::{all_pages, rebuild};
use super::{load_raw, save};
use crate::tools::error::{ToolError, ToolResult};
use lopdf::encryption::{self, DecryptionError};
use lopdf::{Document, Object, ObjectId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnlockMethod {
    NotEncrypted,
    Password,
    TrimmedPassword,
    EmptyPassword,
    IgnoreEncryption,
}

pub fn unlock(bytes: &[u8], password: Option<&str>) -> ToolResult<(Vec<u8>, UnlockMethod)> {
    let original = load_raw(bytes)?;
    if !original.is_encrypted() {
        return finish(original, UnlockMethod::NotEncrypted);
    }

    let supplied = password.filter(|p| !p.is_empty());
    let mut attempts: Vec<(UnlockMethod, &str)> = Vec::new();
    if let Some(pw) = supplied {
        attempts.push((UnlockMethod::Password, pw));
        let trimmed = pw.trim();
        if trimmed != pw && !trimmed.is_empty() {
            attempts.push((UnlockMethod::TrimmedPassword, trimmed));
        }
    }
    attempts.push((UnlockMethod::EmptyPassword, ""));

    let total = attempts.len();
    let mut rejected = 0;
    for (method, pw) in attempts {
        let mut doc = original.clone();
        match decrypt(&mut doc, pw) {
            Ok(()) => {}
            Err(DecryptionError::IncorrectPassword) => {
                rejected += 1;
                tracing::debug!(?method, "PDF password rejected");
                continue;
            }
            Err(e) => {
                tracing::debug!(?method, error = %e, "PDF unlock attempt failed");
                continue;
            }
        }
        match finish(doc, method) {
            Ok(done) => return Ok(done),
            Err(e) => tracing::debug!(?method, error = %e, "Decrypted PDF could not be rebuilt"),
        }
    }

    let locked = || {
        if supplied.is_some() {
            ToolError::WrongPassword
        } else {
            ToolError::invalid("This PDF needs a password to open")
        }
    };

    // Ignoring the handler would only yield ciphertext pages
    if rejected == total {
        return Err(locked());
    }

    let mut doc = original;
    doc.trailer.remove(b"Encrypt");
    finish(doc, UnlockMethod::IgnoreEncryption).map_err(|e| {
        tracing::debug!(error = %e, "PDF unlock with encryption ignored failed");
        locked()
    })
}

/// Decrypt in place with the standard security handler.
///
/// `Document::decrypt` only understands handlers that declare crypt
/// filters (V4), so the older RC4 handlers (V1 and V2) are decrypted here
/// object by object.
pub(crate) fn decrypt(doc: &mut Document, password: &str) -> Result<(), DecryptionError> {
    let key = encryption::get_encryption_key(&*doc, password, true)?;

    let has_crypt_filters = doc.get_encrypted().map(|d| d.has(b"CF")).unwrap_or(false);
    if has_crypt_filters {
        return doc.decrypt(password).map_err(|e| match e {
            lopdf::Error::Decryption(e) => e,
            _ => DecryptionError::UnsupportedEncryption,
        });
    }

    let encrypt_id = doc.trailer.get(b"Encrypt").and_then(Object::as_reference).ok();
    for (&id, obj) in doc.objects.iter_mut() {
        if Some(id) == encrypt_id {
            continue;
        }
        decrypt_object(&key, id, obj)?;
    }
    doc.trailer.remove(b"Encrypt");
    Ok(())
}

/// Strings nested in arrays and dictionaries share the key of the
/// indirect object that holds them
fn decrypt_object(key: &[u8], id: ObjectId, obj: &mut Object) -> Result<(), DecryptionError> {
    match encryption::decrypt_object(key, id, &*obj, false) {
        Ok(plain) => match obj {
            Object::String(content, _) => *content = plain,
            Object::Stream(stream) => {
                for (_, value) in stream.dict.iter_mut() {
                    decrypt_object(key, id, value)?;
                }
                stream.set_content(plain);
            }
            _ => {}
        },
        Err(DecryptionError::NotDecryptable) => match obj {
            Object::Array(items) => {
                for item in items.iter_mut() {
                    decrypt_object(key, id, item)?;
                }
            }
            Object::Dictionary(dict) => {
                for (_, value) in dict.iter_mut() {
                    decrypt_object(key, id, value)?;
                }
            }
            _ => {}
        },
        Err(e) => return Err(e),
    }
    Ok(())
}

fn finish(doc: Document, method: UnlockMethod) -> ToolResult<(Vec<u8>, UnlockMethod)> {
    let pages = all_pages(&doc);
    if pages.is_empty() {
        return Err(ToolError::invalid("The PDF has no pages"));
    }
    let mut rebuilt = rebuild(vec![(doc, pages)])?;
    Ok((save(&mut rebuilt)?, method))
}
