//! Remote/local session reconciliation
//!
//! The remote is authoritative for every chat it knows about: matching
//! local sessions get their messages replaced wholesale, unknown chats with
//! enough history become new sessions, and local sessions the remote does
//! not know are dropped. Reconciliation never leaves the session list empty.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::chat::{ChatMessage, ChatMetadata, ChatSession, ModelConfig, Role, DEFAULT_TOPIC};
use crate::remote::RemoteMessageRecord;

/// Messages of a remote chat needed before it becomes a local session
pub const MIN_MESSAGES_FOR_NEW_SESSION: usize = 3;

/// Remote messages grouped by chat, in first-seen chat order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganizedChats {
    groups: Vec<(String, Vec<ChatMessage>)>,
}

impl OrganizedChats {
    /// Messages of `chat_id`
    pub fn get(&self, chat_id: &str) -> Option<&[ChatMessage]> {
        self.groups
            .iter()
            .find(|(id, _)| id == chat_id)
            .map(|(_, messages)| messages.as_slice())
    }

    /// Whether the remote has messages for `chat_id`
    pub fn contains(&self, chat_id: &str) -> bool {
        self.get(chat_id).is_some()
    }

    /// Chat ids in first-seen order
    pub fn chat_ids(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(id, _)| id.as_str())
    }

    /// Iterates over `(chat_id, messages)`
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ChatMessage])> {
        self.groups.iter().map(|(id, m)| (id.as_str(), m.as_slice()))
    }

    /// Number of chats
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True when the remote has no messages
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn to_chat_message(record: &RemoteMessageRecord) -> ChatMessage {
    let role = Role::from_remote(&record.role);
    let mut message = ChatMessage::new(role, record.text.clone())
        .with_id(record.id.clone())
        .with_date(record.timestamp());
    if role != Role::User && !record.model_id.is_empty() {
        message.model = Some(record.model_id.clone());
    }
    message
}

/// Groups remote messages by chat and orders each group as a conversation
///
/// User and non-user messages are sorted by time separately, then
/// interleaved: after each user message comes the earliest unused reply
/// that is not older than it. The reply cursor only moves forward, so a
/// reply passed over this way is not emitted. Replies left after the last
/// user message are appended in order.
///
/// # Examples
///
/// ```
/// use chatweave::remote::RemoteMessageRecord;
/// use chatweave::sync::organize_chat_messages;
///
/// let record = |id: &str, role: &str, at: &str| RemoteMessageRecord {
///     id: id.to_string(),
///     chat_id: "c1".to_string(),
///     role: role.to_string(),
///     created_at: at.to_string(),
///     ..Default::default()
/// };
/// let organized = organize_chat_messages(&[
///     record("u3", "user", "2024-01-01T00:00:03Z"),
///     record("a2", "assistant", "2024-01-01T00:00:02Z"),
///     record("u1", "user", "2024-01-01T00:00:01Z"),
/// ]);
/// let ids: Vec<&str> = organized.get("c1").unwrap().iter().map(|m| m.id.as_str()).collect();
/// assert_eq!(ids, vec!["u1", "a2", "u3"]);
/// ```
pub fn organize_chat_messages(records: &[RemoteMessageRecord]) -> OrganizedChats {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<&str, Vec<&RemoteMessageRecord>> = HashMap::new();
    for record in records {
        let group = grouped.entry(record.chat_id.as_str()).or_default();
        if group.is_empty() {
            order.push(record.chat_id.clone());
        }
        group.push(record);
    }

    let groups = order
        .into_iter()
        .map(|chat_id| {
            let records = grouped.remove(chat_id.as_str()).unwrap_or_default();
            let (mut users, mut replies): (Vec<ChatMessage>, Vec<ChatMessage>) = records
                .into_iter()
                .map(to_chat_message)
                .partition(|m| m.role == Role::User);
            users.sort_by_key(|m| m.date);
            replies.sort_by_key(|m| m.date);

            let mut combined = Vec::with_capacity(users.len() + replies.len());
            let mut replies = replies.into_iter().peekable();
            for user in users {
                let at = user.date;
                combined.push(user);
                while replies.next_if(|reply| reply.date < at).is_some() {}
                if let Some(reply) = replies.next() {
                    combined.push(reply);
                }
            }
            combined.extend(replies);
            (chat_id, combined)
        })
        .collect();

    OrganizedChats { groups }
}

/// Counts of what a reconciliation changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Local sessions whose messages were replaced
    pub updated: usize,
    /// Sessions created from remote chats
    pub created: usize,
    /// Local sessions dropped as duplicates or unknown to the remote
    pub removed: usize,
    /// True when the result would have been empty and the prior list was kept
    pub kept_prior: bool,
}

/// Result of [`reconcile`]
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// New local session list
    pub sessions: Vec<ChatSession>,
    /// What changed
    pub report: SyncReport,
}

/// Remote chats that will become new sessions but are still unnamed
///
/// These are asked to autorename before reconciling so the new session
/// starts with a real topic.
pub fn chats_needing_rename(
    organized: &OrganizedChats,
    chats: &HashMap<String, ChatMetadata>,
    local: &[ChatSession],
) -> Vec<String> {
    let known: HashSet<&str> = local.iter().map(|s| s.chat_id.as_str()).collect();
    organized
        .iter()
        .filter(|(chat_id, messages)| {
            !known.contains(chat_id) && messages.len() >= MIN_MESSAGES_FOR_NEW_SESSION
        })
        .filter(|(chat_id, _)| {
            chats
                .get(*chat_id)
                .map(|chat| chat.name == DEFAULT_TOPIC)
                .unwrap_or(true)
        })
        .map(|(chat_id, _)| chat_id.to_string())
        .collect()
}

/// Merges the remote state into the local session list
///
/// 1. Local sessions whose correlation id is known remotely get the remote
///    messages.
/// 2. Remote chats without a local session and with at least
///    [`MIN_MESSAGES_FOR_NEW_SESSION`] messages become new sessions,
///    prepended in creation order.
/// 3. Sessions are deduplicated by correlation id, keeping the position of
///    the first occurrence and the content of the last.
/// 4. Sessions unknown to the remote are dropped, unless that leaves
///    nothing, in which case `local` is returned unchanged.
///
/// # Arguments
///
/// * `organized` - Remote messages from [`organize_chat_messages`]
/// * `chats` - Remote chat metadata by correlation id
/// * `local` - Current local sessions
/// * `model_config` - Model configuration of newly created sessions
pub fn reconcile(
    organized: &OrganizedChats,
    chats: &HashMap<String, ChatMetadata>,
    local: &[ChatSession],
    model_config: &ModelConfig,
) -> Reconciled {
    let mut report = SyncReport::default();
    let mut matched: HashSet<&str> = HashSet::new();

    let mut sessions: Vec<ChatSession> = local
        .iter()
        .map(|session| {
            let mut session = session.clone();
            if let Some(messages) = organized.get(&session.chat_id) {
                session.messages = messages.to_vec();
                session.clamp_indices();
                report.updated += 1;
            }
            session
        })
        .collect();
    for session in local {
        if organized.contains(&session.chat_id) {
            matched.insert(session.chat_id.as_str());
        }
    }

    for (chat_id, messages) in organized.iter() {
        if matched.contains(chat_id) || messages.len() < MIN_MESSAGES_FOR_NEW_SESSION {
            continue;
        }
        let topic = chats
            .get(chat_id)
            .map(|chat| chat.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        debug!(chat_id, messages = messages.len(), "Creating session from remote chat");
        sessions.insert(
            0,
            ChatSession::from_remote(model_config.clone(), chat_id, topic, messages.to_vec()),
        );
        report.created += 1;
    }

    let before = sessions.len();
    let deduped = dedup_by_chat_id(sessions);
    let filtered: Vec<ChatSession> = deduped
        .into_iter()
        .filter(|session| organized.contains(&session.chat_id))
        .collect();

    if filtered.is_empty() {
        info!("Remote snapshot matches no session, keeping local sessions");
        return Reconciled {
            sessions: local.to_vec(),
            report: SyncReport {
                kept_prior: true,
                ..SyncReport::default()
            },
        };
    }

    report.removed = before - filtered.len();
    Reconciled {
        sessions: filtered,
        report,
    }
}

/// First-occurrence position, last-occurrence value
fn dedup_by_chat_id(sessions: Vec<ChatSession>) -> Vec<ChatSession> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<ChatSession> = Vec::with_capacity(sessions.len());
    for session in sessions {
        match index.get(&session.chat_id) {
            Some(&position) => unique[position] = session,
            None => {
                index.insert(session.chat_id.clone(), unique.len());
                unique.push(session);
            }
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(chat: &str, id: &str, role: &str, second: u32) -> RemoteMessageRecord {
        RemoteMessageRecord {
            id: id.to_string(),
            chat_id: chat.to_string(),
            role: role.to_string(),
            text: format!("text {}", id),
            created_at: format!("2024-01-01T00:00:{:02}Z", second),
            model_id: "gpt-4o".to_string(),
            ..Default::default()
        }
    }

    fn ids(messages: &[ChatMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    fn meta(name: &str) -> ChatMetadata {
        ChatMetadata {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn session_for(chat_id: &str) -> ChatSession {
        let mut session = ChatSession::new(ModelConfig::default());
        session.chat_id = chat_id.to_string();
        session
    }

    #[test]
    fn test_interleave_basic() {
        let organized = organize_chat_messages(&[
            record("c1", "u3", "user", 3),
            record("c1", "a2", "assistant", 2),
            record("c1", "u1", "user", 1),
        ]);
        assert_eq!(ids(organized.get("c1").unwrap()), vec!["u1", "a2", "u3"]);
    }

    #[test]
    fn test_interleave_leftover_replies_appended() {
        let organized = organize_chat_messages(&[
            record("c1", "u1", "user", 1),
            record("c1", "a2", "assistant", 2),
            record("c1", "a3", "assistant", 3),
            record("c1", "a4", "assistant", 4),
        ]);
        assert_eq!(ids(organized.get("c1").unwrap()), vec!["u1", "a2", "a3", "a4"]);
    }

    #[test]
    fn test_interleave_missing_reply() {
        let organized = organize_chat_messages(&[
            record("c1", "u1", "user", 1),
            record("c1", "u2", "user", 2),
            record("c1", "a3", "assistant", 3),
        ]);
        assert_eq!(ids(organized.get("c1").unwrap()), vec!["u1", "a3", "u2"]);
    }

    #[test]
    fn test_interleave_skips_replies_older_than_user() {
        let organized = organize_chat_messages(&[
            record("c1", "a0", "assistant", 0),
            record("c1", "u1", "user", 1),
            record("c1", "a2", "assistant", 2),
        ]);
        assert_eq!(ids(organized.get("c1").unwrap()), vec!["u1", "a2"]);
    }

    #[test]
    fn test_roles_and_models_mapped() {
        let organized = organize_chat_messages(&[
            record("c1", "u1", "user", 1),
            record("c1", "a2", "bot", 2),
        ]);
        let messages = organized.get("c1").unwrap();
        assert_eq!(messages[0].role, Role::User);
        assert!(messages[0].model.is_none());
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_groups_keep_first_seen_order() {
        let organized = organize_chat_messages(&[
            record("b", "1", "user", 1),
            record("a", "2", "user", 1),
            record("b", "3", "user", 2),
        ]);
        assert_eq!(organized.chat_ids().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_reconcile_replaces_matching_session() {
        let organized = organize_chat_messages(&[
            record("c1", "u1", "user", 1),
            record("c1", "a2", "assistant", 2),
        ]);
        let mut local = session_for("c1");
        local.messages = vec![ChatMessage::user("stale")];
        local.last_summarize_index = 1;
        let result = reconcile(&organized, &HashMap::new(), &[local], &ModelConfig::default());
        assert_eq!(result.sessions.len(), 1);
        assert_eq!(ids(&result.sessions[0].messages), vec!["u1", "a2"]);
        assert_eq!(result.report.updated, 1);
    }

    #[test]
    fn test_reconcile_creates_only_meaningful_chats() {
        let organized = organize_chat_messages(&[
            record("big", "u1", "user", 1),
            record("big", "a2", "assistant", 2),
            record("big", "u3", "user", 3),
            record("small", "u4", "user", 4),
            record("small", "a5", "assistant", 5),
        ]);
        let chats: HashMap<String, ChatMetadata> =
            [("big".to_string(), meta("Big Chat"))].into_iter().collect();
        let result = reconcile(&organized, &chats, &[session_for("local")], &ModelConfig::default());
        assert_eq!(result.sessions.len(), 1);
        assert_eq!(result.sessions[0].chat_id, "big");
        assert_eq!(result.sessions[0].topic, "Big Chat");
        assert_eq!(result.report.created, 1);
        assert_eq!(result.report.removed, 1);
    }

    #[test]
    fn test_reconcile_dedups_last_value_first_position() {
        let organized = organize_chat_messages(&[record("c1", "u1", "user", 1), record("c2", "u2", "user", 1)]);
        let mut first = session_for("c1");
        first.topic = "first".to_string();
        let other = session_for("c2");
        let mut second = session_for("c1");
        second.topic = "second".to_string();

        let result = reconcile(
            &organized,
            &HashMap::new(),
            &[first, other, second],
            &ModelConfig::default(),
        );
        assert_eq!(result.sessions.len(), 2);
        assert_eq!(result.sessions[0].chat_id, "c1");
        assert_eq!(result.sessions[0].topic, "second");
        assert_eq!(result.sessions[1].chat_id, "c2");
    }

    #[test]
    fn test_reconcile_empty_remote_keeps_prior() {
        let local = vec![session_for("a"), session_for("b")];
        let result = reconcile(&OrganizedChats::default(), &HashMap::new(), &local, &ModelConfig::default());
        assert!(result.report.kept_prior);
        assert_eq!(result.sessions, local);
    }

    #[test]
    fn test_reconcile_is_stable() {
        let records = vec![
            record("c1", "u1", "user", 1),
            record("c1", "a2", "assistant", 2),
            record("c1", "u3", "user", 3),
        ];
        let organized = organize_chat_messages(&records);
        let first = reconcile(&organized, &HashMap::new(), &[session_for("x")], &ModelConfig::default());
        let second = reconcile(&organized, &HashMap::new(), &first.sessions, &ModelConfig::default());
        assert_eq!(first.sessions, second.sessions);
        assert_eq!(second.report.created, 0);
    }

    #[test]
    fn test_reconcile_clamps_indices() {
        let organized = organize_chat_messages(&[record("c1", "u1", "user", 1)]);
        let mut local = session_for("c1");
        local.messages = (0..5).map(|i| ChatMessage::user(format!("{}", i))).collect();
        local.last_summarize_index = 5;
        local.clear_context_index = Some(4);
        let result = reconcile(&organized, &HashMap::new(), &[local], &ModelConfig::default());
        assert_eq!(result.sessions[0].last_summarize_index, 1);
        assert_eq!(result.sessions[0].clear_context_index, Some(1));
    }

    #[test]
    fn test_chats_needing_rename() {
        let organized = organize_chat_messages(&[
            record("new", "u1", "user", 1),
            record("new", "a2", "assistant", 2),
            record("new", "u3", "user", 3),
            record("named", "u4", "user", 1),
            record("named", "a5", "assistant", 2),
            record("named", "u6", "user", 3),
            record("known", "u7", "user", 1),
            record("known", "a8", "assistant", 2),
            record("known", "u9", "user", 3),
        ]);
        let chats: HashMap<String, ChatMetadata> = [
            ("new".to_string(), meta(DEFAULT_TOPIC)),
            ("named".to_string(), meta("Has Name")),
            ("known".to_string(), meta(DEFAULT_TOPIC)),
        ]
        .into_iter()
        .collect();
        let rename = chats_needing_rename(&organized, &chats, &[session_for("known")]);
        assert_eq!(rename, vec!["new"]);
    }
}
