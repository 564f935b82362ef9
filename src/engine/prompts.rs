//! Message templates sent to participants

use super::state::Roster;

/// Characters of an ending reply quoted in smart-mode end notices
const END_QUOTE_CHARS: usize = 200;

fn directive_syntax(roster: &Roster) -> String {
    format!(
        "optionally add \"PASS TO [name]\" (only from: {}), \"REDIRECT\", or \"END CONVERSATION\".",
        roster.joined()
    )
}

pub fn duo_opening(other: &str) -> String {
    format!("Hello! Please introduce yourself to {other}.")
}

pub fn duo_relay(speaker: &str, reply: &str) -> String {
    format!("{speaker} just said: \"{reply}\"\n\nPlease respond.")
}

pub fn duo_continue(speaker: &str, reply: &str) -> String {
    format!("{speaker} responded: \"{reply}\"\n\nPlease continue or end the conversation.")
}

/// Appended to every smart-mode turn message
pub fn smart_reminder(roster: &Roster) -> String {
    format!("Please respond, then {}", directive_syntax(roster))
}

pub fn smart_opening(roster: &Roster, starter: &str) -> String {
    let others = roster.others(&[starter]).join(", ");
    let all = roster.joined();
    format!(
        "You're in a {n}-way conversation ONLY with {others}. \
         DO NOT pass to or mention agents not in this list: {all}.\n\n\
         For each turn:\n\
         1. Give your response/thoughts first\n\
         2. Then optionally add one of these commands:\n   \
         - \"PASS TO [name]\" to give them the next turn (only from: {all})\n   \
         - \"REDIRECT\" to ask the previous speaker to clarify\n   \
         - \"END CONVERSATION\" to end the discussion\n   \
         - Or just respond normally and it will rotate to the next person\n\n\
         Please start the conversation.",
        n = roster.len(),
    )
}

pub fn smart_continue(history: &str, reminder: &str) -> String {
    format!("Recent conversation:\n\n{history}\n\n{reminder}")
}

pub fn smart_passed(history: &str, from: &str, content: &str, reminder: &str) -> String {
    format!(
        "Recent conversation:\n\n{history}\n\n\
         {from} passed to you with: \"{content}\"\n\n{reminder}"
    )
}

pub fn smart_clarify(history: &str, asker: &str, content: &str, roster: &Roster) -> String {
    format!(
        "Recent conversation:\n\n{history}\n\n{asker} asks you to clarify: \"{content}\"\n\n\
         Please respond with clarification, then {}",
        directive_syntax(roster)
    )
}

pub fn observer_notice(history: &str, speaker: &str, target: &str) -> String {
    format!(
        "[OBSERVER] Recent conversation:\n\n{history}\n\n{speaker} passed to {target}.\n\n\
         (You're observing - brief acknowledgment only)"
    )
}

pub fn smart_end_notice(speaker: &str, reply: &str) -> String {
    let head: String = reply.chars().take(END_QUOTE_CHARS).collect();
    format!("[CONVERSATION ENDED] {speaker} ended with: \"{head}...\"")
}

/// Appended to every broadcast-mode turn message
pub fn broadcast_reminder(roster: &Roster) -> String {
    format!(
        "Please respond with your thoughts, then optionally add \"PASS TO [name]: [message]\" \
         (only from: {}) or \"END CONVERSATION\".",
        roster.joined()
    )
}

pub fn broadcast_opening(roster: &Roster, starter: &str) -> String {
    let others = roster.others(&[starter]).join(", ");
    let all = roster.joined();
    format!(
        "You're in a {n}-way conversation with {others}. Everyone sees every pass.\n\n\
         For each turn:\n\
         1. Give your response/thoughts first\n\
         2. Then optionally add one of these commands:\n   \
         - \"PASS TO [name]: [message]\" to hand them the next turn (only from: {all})\n   \
         - \"END CONVERSATION\" to end the discussion\n   \
         - Or just respond normally and it will rotate to the next person\n\n\
         Please start the conversation.",
        n = roster.len(),
    )
}

pub fn said(speaker: &str, reply: &str, reminder: &str) -> String {
    format!("{speaker} said: \"{reply}\"\n\n{reminder}")
}

pub fn broadcast_passed(speaker: &str, said: &str, content: &str, reminder: &str) -> String {
    format!("{speaker} said: \"{said}\"\n\nThen passed to you with: \"{content}\"\n\n{reminder}")
}

pub fn broadcast_observer(speaker: &str, said: &str, target: &str, content: &str) -> String {
    format!(
        "[OBSERVER MODE] {speaker} said: \"{said}\"\n\n\
         Then passed to {target} with: \"{content}\"\n\n\
         (You're observing this exchange - no response needed)"
    )
}

pub fn broadcast_end_notice(speaker: &str, reply: &str) -> String {
    format!("[CONVERSATION ENDED] {speaker} ended with: \"{reply}\"")
}
