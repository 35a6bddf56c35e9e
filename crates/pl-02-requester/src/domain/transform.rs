//! Payload transforms applied after a successful claim.

use shared_types::{ChatMessage, MessageId, ReactionRow, ReactionTally};
use std::collections::{HashMap, HashSet};

/// Order a history page oldest first and drop repeated message ids.
///
/// Ties on `sent_at` keep server order. The first occurrence of an id wins.
pub fn order_history(mut messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
    let mut seen = HashSet::with_capacity(messages.len());
    messages.retain(|m| seen.insert(m.id.clone()));
    messages
}

/// Fold raw reaction tallies into one display row per message.
///
/// Rows keep the order in which messages first appear. Within a row, counts
/// for the same emoji are summed, zero counts are dropped, and reactions are
/// ordered by count descending, then emoji.
pub fn reaction_rows(tallies: Vec<ReactionTally>) -> Vec<ReactionRow> {
    let mut order: Vec<MessageId> = Vec::new();
    let mut grouped: HashMap<MessageId, HashMap<String, u32>> = HashMap::new();

    for tally in tallies {
        if tally.count == 0 {
            continue;
        }
        let per_emoji = grouped.entry(tally.message_id.clone()).or_insert_with(|| {
            order.push(tally.message_id.clone());
            HashMap::new()
        });
        let slot = per_emoji.entry(tally.emoji).or_insert(0);
        *slot = slot.saturating_add(tally.count);
    }

    order
        .into_iter()
        .filter_map(|message_id| {
            let per_emoji = grouped.remove(&message_id)?;
            let mut reactions: Vec<(String, u32)> = per_emoji.into_iter().collect();
            reactions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            let total = reactions
                .iter()
                .fold(0u32, |acc, (_, count)| acc.saturating_add(*count));
            Some(ReactionRow {
                message_id,
                reactions,
                total,
            })
        })
        .collect()
}
