//! Partitioning of messages by sender and by notification identity.

use std::collections::{HashMap, HashSet};

use crate::domain::{MessageMetadata, SenderGroup};

/// Normalized sender identity.
///
/// Lower-cased; a `Name <addr>` value collapses to `addr`, anything else is
/// the whole trimmed value. The address is the last bracketed part, so a
/// display name containing `<` does not leak into the key.
pub fn sender_key(from: &str) -> String {
    let lowered = from.trim().to_lowercase();
    let Some(close) = lowered.rfind('>') else {
        return lowered;
    };
    match lowered[..close].rfind('<') {
        Some(open) => lowered[open + 1..close].trim().to_string(),
        None => lowered,
    }
}

/// Identity of an automated notification: sender plus subject with digits
/// removed, so codes and counters do not split otherwise identical mails.
pub fn duplicate_key(from: &str, subject: &str) -> String {
    let subject: String = subject
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_digit())
        .collect();
    format!("{}|||{}", from.to_lowercase(), subject)
}

/// Partitions items by key, keeping keys in first-occurrence order and
/// items in input order within each partition.
pub fn partition_by_key<T, F>(items: impl IntoIterator<Item = T>, key: F) -> Vec<(String, Vec<T>)>
where
    F: Fn(&T) -> String,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut partitions: Vec<(String, Vec<T>)> = Vec::new();

    for item in items {
        let k = key(&item);
        match index.get(&k) {
            Some(&i) => partitions[i].1.push(item),
            None => {
                index.insert(k.clone(), partitions.len());
                partitions.push((k, vec![item]));
            }
        }
    }

    partitions
}

/// Groups messages by [`sender_key`].
///
/// The display sender and `List-Unsubscribe` directive of a group come from
/// its first message. A message id seen twice is only grouped once.
pub fn group_by_sender(messages: &[MessageMetadata]) -> Vec<SenderGroup> {
    let mut seen = HashSet::new();
    let unique = messages
        .iter()
        .filter(|m| seen.insert(m.reference.id.clone()));

    partition_by_key(unique, |m| sender_key(&m.headers.from))
        .into_iter()
        .filter_map(|(key, members)| {
            let first = members.first()?;
            Some(SenderGroup {
                key,
                sender: first.headers.from.clone(),
                list_unsubscribe: first.headers.list_unsubscribe.clone(),
                messages: members.iter().map(|m| m.reference.clone()).collect(),
            })
        })
        .collect()
}
