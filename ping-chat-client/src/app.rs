//! Application state and event loop
//!
//! One task owns all chat state and processes [`AppEvent`]s one at a time:
//! terminal input, realtime events, connection lifecycle changes and REST
//! completions. REST calls run as spawned tasks that post their result back
//! into the same queue. The typing idle timer is the only other wake-up.

use anyhow::bail;
use chrono::Utc;
use ping_chat_core::{
    Attachment, ChannelEvent, ChatApi, ChatError, ChatId, Conversation, DirectoryCache, EventKind,
    IncomingEvent, Message, OtpCode, OutgoingEvent, OutgoingMessage, RealtimeChannel,
    RealtimeConfig, Reconciler, Result, SessionStore, ThreadPage, TransportFactory,
    TypingDebouncer, User, UserId,
};
use std::fmt::Write as _;
use std::future::Future;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::error_handler::ErrorHandler;
use crate::view;

const HELP: &str = "Commands: /chats, /users [query], /open <n|chat id>, /new <n|user id>, \
/image <path> [caption], /logout, /quit. End a line with \\ to keep typing.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Verify,
    Chat,
}

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(String),
    Verify(String),
    Resend,
    Chats,
    Users(Option<String>),
    Open(String),
    New(String),
    Image {
        path: PathBuf,
        caption: Option<String>,
    },
    Logout,
    Quit,
    Help,
    /// Line ending in `\`: the message continues on the next line
    Compose(String),
    Text(String),
}

impl Command {
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let trimmed = line.trim();

        if !trimmed.starts_with('/') {
            return Ok(match line.trim_end().strip_suffix('\\') {
                Some(partial) => Command::Compose(partial.to_string()),
                None => Command::Text(line.to_string()),
            });
        }

        let (name, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (trimmed, ""),
        };

        let required = |usage: &str| -> anyhow::Result<String> {
            if rest.is_empty() {
                bail!("Usage: {}", usage)
            }
            Ok(rest.to_string())
        };

        let command = match name {
            "/login" => Command::Login(required("/login <email>")?),
            "/verify" => Command::Verify(required("/verify <code>")?),
            "/resend" => Command::Resend,
            "/chats" => Command::Chats,
            "/users" => Command::Users((!rest.is_empty()).then(|| rest.to_string())),
            "/open" => Command::Open(required("/open <number|chat id>")?),
            "/new" => Command::New(required("/new <number|user id>")?),
            "/image" => {
                let args = required("/image <path> [caption]")?;
                match args.split_once(char::is_whitespace) {
                    Some((path, caption)) => Command::Image {
                        path: PathBuf::from(path),
                        caption: Some(caption.trim().to_string()),
                    },
                    None => Command::Image {
                        path: PathBuf::from(&args),
                        caption: None,
                    },
                }
            }
            "/logout" => Command::Logout,
            "/quit" | "/exit" => Command::Quit,
            "/help" => Command::Help,
            other => bail!("Unknown command {}. Type /help", other),
        };

        Ok(command)
    }
}

/// Result of a REST call made on behalf of the loop
#[derive(Debug)]
pub enum Completion {
    Users(Result<Vec<User>>),
    Conversations(Result<Vec<Conversation>>),
    Thread {
        conversation_id: ChatId,
        result: Result<ThreadPage>,
    },
    Created(Result<ChatId>),
    Sent(Result<Message>),
}

/// Everything the loop reacts to
#[derive(Debug)]
pub enum AppEvent {
    Input(String),
    InputClosed,
    Realtime(IncomingEvent),
    Channel(ChannelEvent),
    Completed(Completion),
}

/// Why the loop woke up
enum Wake {
    Event(AppEvent),
    QueueClosed,
    TypingIdle,
    Redraw,
}

pub struct App {
    api: Arc<dyn ChatApi>,
    session: SessionStore,
    directory: DirectoryCache,
    realtime_config: RealtimeConfig,
    transports: Arc<dyn TransportFactory>,
    reconciler: Option<Reconciler>,
    realtime: Option<RealtimeChannel>,
    typing: TypingDebouncer,
    draft: String,
    errors: ErrorHandler,
    screen: Screen,
    /// Last `/users` query while the user list is shown
    user_query: Option<String>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    running: bool,
    dirty: bool,
}

impl App {
    pub fn new(
        api: Arc<dyn ChatApi>,
        session: SessionStore,
        directory: DirectoryCache,
        realtime_config: RealtimeConfig,
        transports: Arc<dyn TransportFactory>,
        typing_idle: Duration,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            api,
            session,
            directory,
            realtime_config,
            transports,
            reconciler: None,
            realtime: None,
            typing: TypingDebouncer::new(typing_idle),
            draft: String::new(),
            errors: ErrorHandler::new(),
            screen: Screen::Login,
            user_query: None,
            events_tx,
            events_rx,
            running: true,
            dirty: true,
        }
    }

    #[cfg(test)]
    pub fn screen(&self) -> Screen {
        self.screen
    }

    #[cfg(test)]
    pub fn reconciler(&self) -> Option<&Reconciler> {
        self.reconciler.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Queue handle for producers outside the loop
    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.events_tx.clone()
    }

    /// Restore the stored session, then load users, conversations and realtime
    pub async fn start(&mut self) {
        match self.session.init().await {
            Ok(Some(user)) => {
                let mut reconciler = Reconciler::new(user.id.clone());

                if let Err(e) = self.directory.refresh_users().await {
                    self.report(&e, "fetching users").await;
                }
                if let Err(e) = self.directory.refresh_conversations(&mut reconciler).await {
                    self.report(&e, "fetching conversations").await;
                }

                if self.session.is_authenticated() {
                    self.enter_chat(&user, reconciler).await;
                }
            }
            Ok(None) => info!("No stored session, showing login"),
            Err(e) => self.report(&e, "restoring session").await,
        }
        self.dirty = true;
    }

    /// Process events until `/quit` or the end of input
    pub async fn run<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        while self.is_running() {
            if self.dirty {
                let now = Instant::now();
                self.errors.toasts_mut().prune(now);
                out.write_all(self.render(now).as_bytes())?;
                out.flush()?;
                self.dirty = false;
            }

            match self.next_wake().await {
                Wake::Event(event) => self.handle_event(event).await,
                Wake::QueueClosed => break,
                Wake::TypingIdle => self.flush_typing(Instant::now()),
                Wake::Redraw => self.dirty = true,
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn next_wake(&mut self) -> Wake {
        let typing_deadline = self.typing.deadline();
        let toast_expiry = self.errors.toasts().next_expiry();
        let countdown = self.screen == Screen::Verify;

        tokio::select! {
            event = self.events_rx.recv() => match event {
                Some(event) => Wake::Event(event),
                None => Wake::QueueClosed,
            },
            _ = sleep_until(typing_deadline.unwrap_or_else(Instant::now)), if typing_deadline.is_some() => {
                Wake::TypingIdle
            }
            _ = sleep_until(toast_expiry.unwrap_or_else(Instant::now)), if toast_expiry.is_some() => {
                Wake::Redraw
            }
            _ = sleep(Duration::from_secs(1)), if countdown => Wake::Redraw,
        }
    }

    pub async fn handle_event(&mut self, event: AppEvent) {
        self.dirty = true;
        match event {
            AppEvent::Input(line) => self.handle_input(&line).await,
            AppEvent::InputClosed => {
                info!("Input closed");
                self.running = false;
            }
            AppEvent::Realtime(event) => self.handle_realtime(event),
            AppEvent::Channel(event) => self.handle_channel(event).await,
            AppEvent::Completed(completion) => self.handle_completion(completion).await,
        }
    }

    async fn handle_input(&mut self, line: &str) {
        if line.trim().is_empty() && self.draft.is_empty() {
            return;
        }

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                self.errors.toasts_mut().info(e.to_string(), Instant::now());
                return;
            }
        };

        match (self.screen, command) {
            (_, Command::Quit) => self.running = false,
            (_, Command::Help) => self.errors.toasts_mut().info(HELP, Instant::now()),
            (Screen::Login | Screen::Verify, Command::Login(email)) => self.login(&email).await,
            (Screen::Login, Command::Text(email)) => self.login(&email).await,
            (Screen::Verify, Command::Verify(code) | Command::Text(code)) => {
                self.verify(&code).await
            }
            (Screen::Verify, Command::Resend) => self.resend().await,
            (Screen::Chat, command) => self.handle_chat_command(command).await,
            (screen, command) => {
                debug!("Ignoring {:?} on {:?} screen", command, screen);
                self.errors
                    .toasts_mut()
                    .info("Log in first (/login <email>)", Instant::now());
            }
        }
    }

    async fn handle_chat_command(&mut self, command: Command) {
        match command {
            Command::Chats => {
                self.user_query = None;
                self.refresh_conversations();
            }
            Command::Users(query) => {
                self.user_query = Some(query.unwrap_or_default());
                self.refresh_users();
            }
            Command::Open(target) => match self.resolve_conversation(&target) {
                Some(conversation_id) => self.select(conversation_id),
                None => self
                    .errors
                    .toasts_mut()
                    .info(format!("No chat {}", target), Instant::now()),
            },
            Command::New(target) => self.start_conversation(&target),
            Command::Image { path, caption } => self.send(caption, Some(path)),
            Command::Compose(text) => self.compose(&text),
            Command::Text(text) => {
                let body = self.take_draft(&text);
                self.send(Some(body), None);
            }
            Command::Logout => self.logout().await,
            Command::Login(_) | Command::Verify(_) | Command::Resend => {
                self.errors
                    .toasts_mut()
                    .info("Already logged in", Instant::now());
            }
            Command::Quit | Command::Help => {}
        }
    }

    // Authentication

    async fn login(&mut self, email: &str) {
        match self.session.login(email).await {
            Ok(message) => {
                self.errors.toasts_mut().success(message, Instant::now());
                self.screen = Screen::Verify;
            }
            Err(e) => self.report(&e, "requesting login code").await,
        }
    }

    async fn resend(&mut self) {
        match self.session.resend(Instant::now()).await {
            Ok(message) => self.errors.toasts_mut().success(message, Instant::now()),
            Err(e) => self.report(&e, "resending login code").await,
        }
    }

    async fn verify(&mut self, input: &str) {
        let code = match OtpCode::from_pasted(input) {
            Ok(code) => code,
            Err(e) => {
                self.report(&e, "reading code").await;
                return;
            }
        };

        let verified = match self.session.verify(&code).await {
            Ok(verified) => verified,
            Err(e) => {
                self.report(&e, "verifying code").await;
                return;
            }
        };

        self.errors
            .toasts_mut()
            .success(verified.message, Instant::now());

        let mut reconciler = Reconciler::new(verified.user.id.clone());
        let (users, conversations) =
            tokio::join!(self.api.fetch_all_users(), self.api.fetch_conversations());

        match users {
            Ok(users) => self.directory.replace_users(users),
            Err(e) => self.report(&e, "fetching users").await,
        }
        match conversations {
            Ok(conversations) => reconciler.replace_conversations(conversations),
            Err(e) => self.report(&e, "fetching conversations").await,
        }

        if self.session.is_authenticated() {
            self.enter_chat(&verified.user, reconciler).await;
        }
    }

    async fn enter_chat(&mut self, user: &User, reconciler: Reconciler) {
        info!("Entering chat as {}", user.email);
        self.reconciler = Some(reconciler);
        self.screen = Screen::Chat;
        self.open_realtime(&user.id).await;
    }

    async fn logout(&mut self) {
        self.teardown().await;
        if let Err(e) = self.session.logout().await {
            self.report(&e, "logging out").await;
        }
        self.screen = Screen::Login;
        self.errors.toasts_mut().info("Logged out", Instant::now());
    }

    /// The services rejected our token: drop everything and ask for a new login
    async fn expire_session(&mut self) {
        warn!("Session no longer valid, returning to login");
        self.teardown().await;
        if let Err(e) = self.session.logout().await {
            warn!("Failed to clear stored session: {}", e);
        }
        self.screen = Screen::Login;
    }

    async fn report(&mut self, error: &ChatError, context: &str) {
        let relogin = self.errors.handle_error(error, context, Instant::now());
        if relogin && self.session.is_authenticated() {
            self.expire_session().await;
        }
    }

    // Realtime

    async fn open_realtime(&mut self, user_id: &str) {
        let (channel, lifecycle) =
            match RealtimeChannel::connect(self.realtime_config.clone(), user_id, self.transports.clone()) {
                Ok(pair) => pair,
                Err(e) => {
                    self.report(&e, "opening realtime channel").await;
                    return;
                }
            };

        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        for kind in EventKind::ALL {
            channel.on(kind, incoming_tx.clone()).await;
        }

        forward(incoming_rx, self.events_tx.clone(), AppEvent::Realtime);
        forward(lifecycle, self.events_tx.clone(), AppEvent::Channel);
        self.realtime = Some(channel);
    }

    fn emit(&self, event: OutgoingEvent) {
        let Some(channel) = &self.realtime else {
            return;
        };

        let name = event.name();
        if let Err(e) = channel.emit(event) {
            debug!("Dropping {} event: {}", name, e);
        }
    }

    fn handle_realtime(&mut self, event: IncomingEvent) {
        let Some(reconciler) = self.reconciler.as_mut() else {
            debug!("Ignoring {} without a session", event.kind());
            return;
        };

        match event {
            IncomingEvent::NewMessage(message) => {
                let background = !reconciler.is_active(&message.conversation_id);
                let outcome = reconciler.apply_incoming_message(message, background);
                if !outcome.known_conversation {
                    self.refresh_conversations();
                }
            }
            IncomingEvent::MessageSeen(update) => {
                reconciler.apply_seen_update(
                    &update.chat_id,
                    &update.user_id,
                    update.message_ids.as_deref(),
                    Utc::now(),
                );
            }
            IncomingEvent::UserTyping(update) => {
                reconciler.apply_remote_typing(&update.chat_id, &update.user_id, true);
            }
            IncomingEvent::UserStoppedTyping(update) => {
                reconciler.apply_remote_typing(&update.chat_id, &update.user_id, false);
            }
            IncomingEvent::OnlineUsers(user_ids) => reconciler.set_online_users(user_ids),
        }
    }

    async fn handle_channel(&mut self, event: ChannelEvent) {
        if self.realtime.is_none() {
            debug!("Ignoring {:?} from a closed channel", event);
            return;
        }

        match event {
            ChannelEvent::Connected => info!("Realtime channel connected"),
            ChannelEvent::Reconnected => {
                info!("Realtime channel reconnected");
                self.refresh_conversations();
                if let Some(chat_id) = self.active_conversation() {
                    self.emit(OutgoingEvent::JoinChat { chat_id });
                }
                self.errors
                    .toasts_mut()
                    .success("Reconnected", Instant::now());
            }
            ChannelEvent::Disconnected { reason } => {
                warn!("Realtime channel lost: {}", reason);
                self.errors
                    .toasts_mut()
                    .info("Connection lost, reconnecting…", Instant::now());
            }
            ChannelEvent::GaveUp => {
                if let Some(channel) = self.realtime.take() {
                    if let Err(e) = channel.disconnect().await {
                        debug!("Realtime task ended with: {}", e);
                    }
                }
                self.report(&ChatError::ChannelClosed, "realtime channel")
                    .await;
            }
        }
    }

    // REST

    fn spawn_completion<F>(&self, request: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let completion = request.await;
            if events.send(AppEvent::Completed(completion)).is_err() {
                debug!("App loop gone, dropping completion");
            }
        });
    }

    fn refresh_conversations(&self) {
        let api = self.api.clone();
        self.spawn_completion(async move { Completion::Conversations(api.fetch_conversations().await) });
    }

    fn refresh_users(&self) {
        let api = self.api.clone();
        self.spawn_completion(async move { Completion::Users(api.fetch_all_users().await) });
    }

    async fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Users(Ok(users)) => {
                if self.reconciler.is_some() {
                    self.directory.replace_users(users);
                }
            }
            Completion::Users(Err(e)) => self.report(&e, "fetching users").await,
            Completion::Conversations(Ok(conversations)) => {
                if let Some(reconciler) = self.reconciler.as_mut() {
                    reconciler.replace_conversations(conversations);
                }
            }
            Completion::Conversations(Err(e)) => self.report(&e, "fetching conversations").await,
            Completion::Thread {
                conversation_id,
                result: Ok(page),
            } => {
                let applied = self
                    .reconciler
                    .as_mut()
                    .is_some_and(|r| r.apply_thread(&conversation_id, page.messages, page.user));
                // Opening a thread marks it seen server-side
                if applied {
                    self.refresh_conversations();
                }
            }
            Completion::Thread {
                conversation_id,
                result: Err(e),
            } => {
                if let Some(reconciler) = self.reconciler.as_mut() {
                    reconciler.fail_thread(&conversation_id);
                }
                self.report(&e, "loading messages").await;
            }
            Completion::Created(Ok(conversation_id)) => {
                if self.reconciler.is_some() {
                    self.select(conversation_id);
                }
            }
            Completion::Created(Err(e)) => self.report(&e, "starting chat").await,
            Completion::Sent(Ok(message)) => {
                let unknown = self
                    .reconciler
                    .as_mut()
                    .is_some_and(|r| !r.apply_local_send(message).known_conversation);
                if unknown {
                    self.refresh_conversations();
                }
            }
            Completion::Sent(Err(e)) => self.report(&e, "sending message").await,
        }
    }

    // Conversations

    fn active_conversation(&self) -> Option<ChatId> {
        self.reconciler
            .as_ref()
            .and_then(|r| r.active_conversation_id())
            .map(String::from)
    }

    /// A list number as shown by the view, or a chat id
    fn resolve_conversation(&self, target: &str) -> Option<ChatId> {
        let reconciler = self.reconciler.as_ref()?;
        match target.parse::<usize>() {
            Ok(number) => number
                .checked_sub(1)
                .and_then(|index| reconciler.conversations().get(index))
                .map(|c| c.id.clone()),
            Err(_) => Some(target.to_string()),
        }
    }

    fn user_results(&self) -> Vec<&User> {
        match (&self.user_query, &self.reconciler) {
            (Some(query), Some(reconciler)) => {
                self.directory.search(query, reconciler.current_user())
            }
            _ => Vec::new(),
        }
    }

    /// A number from the last user list, or a user id
    fn resolve_user(&self, target: &str) -> Option<UserId> {
        match target.parse::<usize>() {
            Ok(number) => number
                .checked_sub(1)
                .and_then(|index| self.user_results().get(index).map(|u| u.id.clone())),
            Err(_) => Some(target.to_string()),
        }
    }

    fn select(&mut self, conversation_id: ChatId) {
        let Some(reconciler) = self.reconciler.as_mut() else {
            return;
        };

        let room = reconciler.select_conversation(&conversation_id);
        self.typing.cancel();
        self.draft.clear();
        self.user_query = None;

        for event in room.events() {
            self.emit(event);
        }

        let api = self.api.clone();
        self.spawn_completion(async move {
            let result = api.fetch_thread(&conversation_id).await;
            Completion::Thread {
                conversation_id,
                result,
            }
        });
    }

    fn start_conversation(&mut self, target: &str) {
        let Some(user_id) = self.resolve_user(target) else {
            self.errors
                .toasts_mut()
                .info(format!("No user {}", target), Instant::now());
            return;
        };

        let existing = self.reconciler.as_ref().and_then(|r| {
            r.conversations()
                .iter()
                .find(|c| c.participant.id == user_id)
                .map(|c| c.id.clone())
        });

        match existing {
            Some(conversation_id) => self.select(conversation_id),
            None => {
                let api = self.api.clone();
                self.spawn_completion(async move {
                    Completion::Created(api.create_conversation(&user_id).await)
                });
            }
        }
    }

    // Composer

    fn take_draft(&mut self, last_line: &str) -> String {
        let mut body = std::mem::take(&mut self.draft);
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(last_line);
        body
    }

    fn compose(&mut self, text: &str) {
        let Some(reconciler) = &self.reconciler else {
            return;
        };
        let Some(chat_id) = reconciler.active_conversation_id() else {
            self.errors
                .toasts_mut()
                .info("Open a chat first (/open)", Instant::now());
            return;
        };

        let events = self
            .typing
            .input(reconciler.current_user(), chat_id, Instant::now());

        if !self.draft.is_empty() {
            self.draft.push('\n');
        }
        self.draft.push_str(text);

        for event in events {
            self.emit(event);
        }
    }

    fn flush_typing(&mut self, now: Instant) {
        if let Some(event) = self.typing.poll(now) {
            self.emit(event);
        }
    }

    fn send(&mut self, text: Option<String>, image: Option<PathBuf>) {
        let Some(reconciler) = &self.reconciler else {
            return;
        };
        let Some(chat_id) = reconciler.active_conversation_id().map(String::from) else {
            self.errors
                .toasts_mut()
                .info("Open a chat first (/open)", Instant::now());
            return;
        };

        let stop = self.typing.finish(reconciler.current_user(), &chat_id);
        self.emit(stop);

        let api = self.api.clone();
        self.spawn_completion(async move {
            Completion::Sent(deliver(api, chat_id, text, image).await)
        });
    }

    // Teardown

    async fn teardown(&mut self) {
        if self.typing.is_pending() {
            if let (Some(reconciler), Some(chat_id)) = (&self.reconciler, self.active_conversation()) {
                let stop = self.typing.finish(reconciler.current_user(), &chat_id);
                self.emit(stop);
            }
        }
        self.typing.cancel();
        self.draft.clear();
        self.user_query = None;

        if let Some(reconciler) = self.reconciler.as_mut() {
            for event in reconciler.clear_selection().events() {
                self.emit(event);
            }
        }

        if let Some(channel) = self.realtime.take() {
            if let Err(e) = channel.disconnect().await {
                warn!("Failed to close realtime channel: {}", e);
            }
        }

        self.reconciler = None;
        self.directory.replace_users(Vec::new());
    }

    async fn shutdown(&mut self) {
        info!("Shutting down");
        self.teardown().await;
    }

    // Rendering

    pub fn render(&self, now: Instant) -> String {
        let mut out = String::from(view::CLEAR_SCREEN);

        match self.screen {
            Screen::Login => out.push_str(&view::render_login(self.session.pending_email())),
            Screen::Verify => out.push_str(&view::render_verify(
                self.session.pending_email().unwrap_or_default(),
                self.session.resend_remaining_secs(now).unwrap_or(0),
            )),
            Screen::Chat => self.render_chat(&mut out),
        }

        let toasts = view::render_toasts(self.errors.toasts(), now);
        if !toasts.is_empty() {
            out.push('\n');
            out.push_str(&toasts);
        }
        out
    }

    fn render_chat(&self, out: &mut String) {
        let Some(reconciler) = &self.reconciler else {
            return;
        };

        let name = self.session.user().map(|u| u.name.as_str()).unwrap_or_default();
        let _ = writeln!(out, "Ping chat: {}", name);
        if self.realtime.as_ref().is_some_and(|c| !c.is_connected()) {
            out.push_str("Connecting to chat server…\n");
        }
        match reconciler.total_unseen() {
            0 => out.push('\n'),
            unseen => {
                let _ = writeln!(out, "{} unread\n", unseen);
            }
        }

        if self.user_query.is_some() {
            out.push_str("Users (/new <n> to chat)\n");
            out.push_str(&view::render_users(&self.user_results(), reconciler));
            out.push('\n');
        }

        out.push_str("Chats (/open <n>)\n");
        out.push_str(&view::render_conversations(reconciler));

        if let Some(thread) = reconciler.active_thread() {
            out.push('\n');
            out.push_str(&view::render_header(thread, reconciler));
            out.push_str(&view::render_thread(thread, reconciler.current_user()));
            if !self.draft.is_empty() {
                let _ = writeln!(out, "… {}", self.draft.replace('\n', " ⏎ "));
            }
        }
    }
}

async fn deliver(
    api: Arc<dyn ChatApi>,
    chat_id: ChatId,
    text: Option<String>,
    image: Option<PathBuf>,
) -> Result<Message> {
    let attachment = match image {
        Some(path) => Some(Attachment::from_path(path).await?),
        None => None,
    };
    let message = OutgoingMessage::new(chat_id, text.as_deref(), attachment)?;
    api.send_message(&message).await
}

/// Forward every item of `source` into the app queue
fn forward<T: Send + 'static>(
    mut source: mpsc::UnboundedReceiver<T>,
    events: mpsc::UnboundedSender<AppEvent>,
    wrap: fn(T) -> AppEvent,
) {
    tokio::spawn(async move {
        while let Some(item) = source.recv().await {
            if events.send(wrap(item)).is_err() {
                break;
            }
        }
    });
}

/// Read stdin lines on a dedicated thread
///
/// Blocking reads keep the runtime free; the thread ends with the input or
/// the process.
pub fn spawn_input_reader(events: mpsc::UnboundedSender<AppEvent>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("ping-chat-input".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if events.send(AppEvent::Input(line)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read input: {}", e);
                        break;
                    }
                }
            }
            let _ = events.send(AppEvent::InputClosed);
        })?;
    Ok(())
}
