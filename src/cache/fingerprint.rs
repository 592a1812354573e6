use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::constants::FINGERPRINT_BYTES;
use crate::models::ConversationRecord;

/// Content fingerprint of a conversation.
///
/// Covers only the mutable, analysis-relevant fields: the ordered messages,
/// the contact name and `updated_at`. The id and any extra fields are ignored.
/// This is a change detector, not a security boundary: SHA-256 truncated to 128 bits,
/// lowercase hex.
pub fn fingerprint(conversation: &ConversationRecord) -> String {
    let mut hasher = Sha256::new();

    hasher.update((conversation.messages.len() as u64).to_le_bytes());
    for message in &conversation.messages {
        feed(&mut hasher, Some(&message.sender));
        feed(&mut hasher, Some(&message.text));
        feed(&mut hasher, timestamp(message.timestamp).as_deref());
    }
    feed(&mut hasher, conversation.contact_name.as_deref());
    feed(&mut hasher, timestamp(conversation.updated_at).as_deref());

    hasher.finalize()[..FINGERPRINT_BYTES]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

// Length-prefixed with a presence tag so field boundaries can't be shifted
fn feed(hasher: &mut Sha256, field: Option<&str>) {
    match field {
        Some(value) => {
            hasher.update([1u8]);
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        None => hasher.update([0u8]),
    }
}

fn timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversationMessage;
    use chrono::TimeZone;
    use serde_json::json;

    fn conversation(id: &str) -> ConversationRecord {
        ConversationRecord::new(id).with_contact("Ana").with_messages(vec![
            ConversationMessage::new("client", "hola")
                .at(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
            ConversationMessage::new("agent", "buenos dias"),
        ])
    }

    #[test]
    fn test_deterministic_and_compact() {
        let a = fingerprint(&conversation("c1"));
        assert_eq!(a, fingerprint(&conversation("c1")));
        assert_eq!(a.len(), FINGERPRINT_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ignores_id_and_extra_fields() {
        let mut other = conversation("c2");
        other.extra.insert("phone".to_string(), json!("+34600000000"));
        assert_eq!(fingerprint(&conversation("c1")), fingerprint(&other));
    }

    #[test]
    fn test_detects_content_changes() {
        let base = fingerprint(&conversation("c1"));

        let mut edited = conversation("c1");
        edited.messages[1].text = "buenas tardes".to_string();
        assert_ne!(base, fingerprint(&edited));

        let renamed = conversation("c1").with_contact("Ana Maria");
        assert_ne!(base, fingerprint(&renamed));

        let mut touched = conversation("c1");
        touched.updated_at = Some(Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap());
        assert_ne!(base, fingerprint(&touched));
    }

    #[test]
    fn test_field_boundaries_matter() {
        let a = ConversationRecord::new("x")
            .with_messages(vec![ConversationMessage::new("ab", "c")]);
        let b = ConversationRecord::new("x")
            .with_messages(vec![ConversationMessage::new("a", "bc")]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
