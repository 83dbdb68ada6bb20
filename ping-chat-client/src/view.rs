//! Text rendering of the chat state
//!
//! Every function here is pure: it takes the current state and returns the
//! text to print. The app loop decides when to redraw.

use chrono::{DateTime, Local, Utc};
use ping_chat_core::{ActiveThread, Conversation, Message, MessageKind, Reconciler, User};
use std::fmt::Write;
use tokio::time::Instant;

use crate::error_handler::{ToastLevel, Toasts};

/// Clears the terminal and moves the cursor home
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Tick shown under a sent message that has not been seen
pub const SENT_TICK: &str = "✓";

/// Tick shown under a sent message the counterpart has seen
pub const SEEN_TICK: &str = "✓✓";

const PREVIEW_WIDTH: usize = 40;

/// Format a timestamp for the thread and list
pub fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

fn truncate(text: &str, width: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= width && first_line.len() == text.len() {
        return first_line.to_string();
    }
    let mut shortened: String = first_line.chars().take(width.saturating_sub(1)).collect();
    shortened.push('…');
    shortened
}

pub fn render_login(pending_email: Option<&str>) -> String {
    let mut out = String::from("Ping chat\n\n");
    if let Some(email) = pending_email {
        let _ = writeln!(out, "Last code was sent to {}", email);
    }
    out.push_str("Enter your email to receive a login code (/login <email>)\n");
    out
}

pub fn render_verify(email: &str, resend_secs: u64) -> String {
    let mut out = String::from("Ping chat\n\n");
    let _ = writeln!(out, "Enter the 6-digit code sent to {}", email);
    if resend_secs > 0 {
        let _ = writeln!(out, "Resend code in {}s", resend_secs);
    } else {
        out.push_str("Didn't get it? /resend\n");
    }
    out
}

/// One line per conversation, numbered for `/open`
pub fn render_conversations(reconciler: &Reconciler) -> String {
    let conversations = reconciler.conversations();
    if conversations.is_empty() {
        return "No chats yet. Find someone with /users\n".to_string();
    }

    let mut out = String::new();
    for (index, conversation) in conversations.iter().enumerate() {
        let _ = writeln!(out, "{}", conversation_line(index + 1, conversation, reconciler));
    }
    out
}

fn conversation_line(number: usize, conversation: &Conversation, reconciler: &Reconciler) -> String {
    let marker = if reconciler.is_active(&conversation.id) {
        '>'
    } else {
        ' '
    };
    let presence = if reconciler.is_online(&conversation.participant.id) {
        "●"
    } else {
        "○"
    };

    let mut line = format!(
        "{}{:>2}. {} {}",
        marker, number, presence, conversation.participant.name
    );

    if conversation.unseen_count > 0 {
        let _ = write!(line, " ({})", conversation.unseen_count);
    }

    if let Some(preview) = &conversation.latest_message {
        let prefix = if conversation.last_sent_by(reconciler.current_user()) {
            "You: "
        } else {
            ""
        };
        let _ = write!(
            line,
            "  {}{}  {}",
            prefix,
            truncate(&preview.text, PREVIEW_WIDTH),
            format_time(conversation.updated_at)
        );
    }

    line
}

/// Directory search results, numbered for `/new`
pub fn render_users(users: &[&User], reconciler: &Reconciler) -> String {
    if users.is_empty() {
        return "No users found\n".to_string();
    }

    let mut out = String::new();
    for (index, user) in users.iter().enumerate() {
        let presence = if reconciler.is_online(&user.id) {
            "●"
        } else {
            "○"
        };
        let _ = writeln!(
            out,
            "{:>3}. {} {} <{}>",
            index + 1,
            presence,
            user.name,
            user.email
        );
    }
    out
}

/// Counterpart name with typing or presence status
pub fn render_header(thread: &ActiveThread, reconciler: &Reconciler) -> String {
    let counterpart = thread.counterpart.as_ref().or_else(|| {
        reconciler
            .conversation(&thread.conversation_id)
            .map(|c| &c.participant)
    });

    let Some(user) = counterpart else {
        return "Loading…\n".to_string();
    };

    let status = if thread.remote_typing {
        "typing…"
    } else if reconciler.is_online(&user.id) {
        "online"
    } else {
        "offline"
    };

    format!("{} ({})\n", user.name, status)
}

fn message_body(message: &Message) -> String {
    match (message.kind, &message.text, &message.image) {
        (MessageKind::Image, caption, Some(image)) => match caption {
            Some(caption) => format!("[image {}] {}", image.url, caption),
            None => format!("[image {}]", image.url),
        },
        (_, Some(text), _) => text.clone(),
        _ => String::new(),
    }
}

/// Thread messages oldest first with seen ticks on own messages
pub fn render_thread(thread: &ActiveThread, current_user: &str) -> String {
    if !thread.loaded && thread.messages.is_empty() {
        return "Loading messages…\n".to_string();
    }
    if thread.messages.is_empty() {
        if thread.load_failed {
            return "Couldn't load messages. /open to retry\n".to_string();
        }
        return "Say hi!\n".to_string();
    }

    let mut out = String::new();
    for message in &thread.messages {
        let time = format_time(message.created_at);
        if message.is_from(current_user) {
            let tick = if message.seen { SEEN_TICK } else { SENT_TICK };
            let _ = writeln!(out, "{:>40} {} {}", message_body(message), time, tick);
        } else {
            let _ = writeln!(out, "{} {}", time, message_body(message));
        }
    }
    out
}

pub fn render_toasts(toasts: &Toasts, now: Instant) -> String {
    let mut out = String::new();
    for toast in toasts.visible(now) {
        let icon = match toast.level {
            ToastLevel::Info => "i",
            ToastLevel::Success => "+",
            ToastLevel::Error => "!",
        };
        let _ = writeln!(out, "[{}] {}", icon, toast.text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ping_chat_core::ImageRef;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn bob() -> User {
        User::new("u2", "Bob", "bob@example.com")
    }

    fn reconciler() -> Reconciler {
        let mut reconciler = Reconciler::new("u1");
        reconciler.replace_conversations(vec![
            Conversation::new("c1", bob(), at(0)),
            Conversation::new("c2", User::new("u3", "Carol", "carol@example.com"), at(10)),
        ]);
        reconciler
    }

    #[test]
    fn test_conversation_list_badges_and_previews() {
        let mut reconciler = reconciler();
        let image = ImageRef {
            url: "https://cdn.example.com/cat.png".to_string(),
            id: "img-1".to_string(),
        };
        reconciler.apply_incoming_message(Message::image("m1", "c1", "u2", image, None, at(20)), true);
        reconciler.apply_local_send(Message::text("m2", "c2", "u1", "hello", at(15)));
        reconciler.set_online_users(vec!["u2".to_string()]);

        let rendered = render_conversations(&reconciler);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  1. ○ Carol"));
        assert!(lines[0].contains("You: hello"));
        assert!(lines[1].starts_with("  2. ● Bob (1)"));
        assert!(lines[1].contains("📷 Image"));
    }

    #[test]
    fn test_active_conversation_marker() {
        let mut reconciler = reconciler();
        reconciler.select_conversation("c1");

        let rendered = render_conversations(&reconciler);
        assert!(rendered.lines().any(|l| l.starts_with("> ") && l.contains("Bob")));
    }

    #[test]
    fn test_empty_conversation_list() {
        let reconciler = Reconciler::new("u1");
        assert!(render_conversations(&reconciler).contains("/users"));
    }

    #[test]
    fn test_thread_ticks() {
        let mut reconciler = reconciler();
        reconciler.select_conversation("c1");
        reconciler.apply_thread(
            "c1",
            vec![
                Message::text("m1", "c1", "u2", "hi there", at(1)),
                Message::text("m2", "c1", "u1", "hey", at(2)),
                Message::text("m3", "c1", "u1", "how are you", at(3)),
            ],
            bob(),
        );
        reconciler.apply_seen_update("c1", "u2", Some(&["m2".to_string()][..]), at(4));

        let thread = reconciler.active_thread().unwrap();
        let rendered = render_thread(thread, "u1");
        let lines: Vec<&str> = rendered.lines().collect();

        assert!(lines[0].ends_with("hi there"));
        assert!(lines[1].ends_with(SEEN_TICK));
        assert!(lines[2].ends_with(&format!("{} {}", format_time(at(3)), SENT_TICK)));
        assert!(!lines[2].ends_with(SEEN_TICK));
    }

    #[test]
    fn test_thread_loading_and_empty() {
        let mut reconciler = reconciler();
        reconciler.select_conversation("c1");
        let thread = reconciler.active_thread().unwrap();
        assert_eq!(render_thread(thread, "u1"), "Loading messages…\n");

        reconciler.apply_thread("c1", Vec::new(), bob());
        let thread = reconciler.active_thread().unwrap();
        assert_eq!(render_thread(thread, "u1"), "Say hi!\n");

        reconciler.select_conversation("c1");
        reconciler.fail_thread("c1");
        let thread = reconciler.active_thread().unwrap();
        assert!(render_thread(thread, "u1").contains("/open to retry"));
    }

    #[test]
    fn test_header_status() {
        let mut reconciler = reconciler();
        reconciler.select_conversation("c1");
        let thread = reconciler.active_thread().unwrap();
        assert_eq!(render_header(thread, &reconciler), "Bob (offline)\n");

        reconciler.set_online_users(vec!["u2".to_string()]);
        let thread = reconciler.active_thread().unwrap();
        assert_eq!(render_header(thread, &reconciler), "Bob (online)\n");

        reconciler.apply_remote_typing("c1", "u2", true);
        let thread = reconciler.active_thread().unwrap();
        assert_eq!(render_header(thread, &reconciler), "Bob (typing…)\n");
    }

    #[test]
    fn test_user_list() {
        let reconciler = reconciler();
        let users = [bob()];
        let refs: Vec<&User> = users.iter().collect();
        assert_eq!(
            render_users(&refs, &reconciler),
            "  1. ○ Bob <bob@example.com>\n"
        );
        assert_eq!(render_users(&[], &reconciler), "No users found\n");
    }

    #[test]
    fn test_verify_countdown() {
        let rendered = render_verify("ada@example.com", 42);
        assert!(rendered.contains("ada@example.com"));
        assert!(rendered.contains("Resend code in 42s"));
        assert!(render_verify("ada@example.com", 0).contains("/resend"));
    }

    #[test]
    fn test_truncate_preview() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 5), "abcd…");
        assert_eq!(truncate("line one\nline two", 20), "line one…");
    }

    #[test]
    fn test_toasts() {
        let now = Instant::now();
        let mut toasts = Toasts::default();
        toasts.info("Logged out", now);
        assert_eq!(render_toasts(&toasts, now), "[i] Logged out\n");
    }
}
