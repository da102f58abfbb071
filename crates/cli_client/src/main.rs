//! Terminal client for the Gatechat messaging gateway
//! Conversation list, conversation view, live updates over a QUIC channel

mod config_file;
mod input;
mod raw_mode;
mod view;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config_file::{ConfigManager, Overrides};
use crossterm::event::{self, Event};
use gatechat_core::config::ClientConfig;
use gatechat_core::render::RenderCache;
use gatechat_core::store::View;
use gatechat_core::{
    retryable, ChannelManager, GatewayClient, QuicTransport, RetryConfig, RetryPreset, Store,
};
use input::{map_key, Action};
use raw_mode::TerminalGuard;
use std::fs::OpenOptions;
use std::io::{stdout, Stdout};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use view::ListRenderer;

/// How often the input thread checks whether the app is gone
const INPUT_POLL: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "gatechat")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Terminal client for the Gatechat messaging gateway", long_about = None)]
struct Args {
    /// Config file (default: <config dir>/gatechat/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gateway address, overrides the config file
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Skip gateway certificate verification (development only)
    #[arg(long, default_value_t = false)]
    insecure: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log to stderr instead of the log file
    #[arg(long, default_value_t = false)]
    log_stderr: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let manager = ConfigManager::resolve(args.config.clone())?;

    if let Some(Command::Init { force }) = args.command {
        manager.init(force)?;
        println!("Wrote {}", manager.path().display());
        println!("Set credentials.token and gateway.fingerprint before connecting.");
        return Ok(());
    }

    let overrides = Overrides {
        endpoint: args.endpoint.clone(),
        insecure: args.insecure,
    };
    let config = manager.load_with(&overrides)?;

    setup_logging(&args.log_level, args.log_stderr)?;
    info!("Starting gatechat v{}", env!("CARGO_PKG_VERSION"));

    run(config).await
}

fn setup_logging(level: &str, to_stderr: bool) -> Result<()> {
    let log_level = level.parse::<Level>().unwrap_or(Level::INFO);

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    if to_stderr {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(());
    }

    // The UI owns the terminal, so logs go to a file
    let dir = dirs::data_local_dir()
        .context("No data directory on this platform, pass --log-stderr")?
        .join("gatechat");
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join("gatechat.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();

    Ok(())
}

async fn run(config: ClientConfig) -> Result<()> {
    let store = Store::with_settings(config.settings.clone());
    let transport = QuicTransport::new(&config.gateway).context("Failed to set up the channel transport")?;
    let client = GatewayClient::new(&config.gateway, config.credentials.clone())
        .context("Failed to set up the gateway client")?;

    let channel = ChannelManager::spawn(transport, store.clone(), config.channel_config());
    channel.connect();

    // Every store change wakes the draw loop
    let wake = Arc::new(Notify::new());
    let _subscription = store.subscribe({
        let wake = wake.clone();
        move |_| wake.notify_one()
    });

    let (notice_tx, mut notices) = mpsc::unbounded_channel();
    let mut app = App {
        store: store.clone(),
        channel: &channel,
        client,
        retry: config.retry,
        page_size: config.settings.page_size,
        notices: notice_tx,
        notice: None,
        cache: RenderCache::new(ListRenderer::new(config.settings.show_timestamps)),
        out: stdout(),
        size: crossterm::terminal::size()?,
        force_rebuild: true,
    };
    app.load_lists();

    let (key_tx, mut keys) = mpsc::unbounded_channel();
    std::thread::spawn(move || read_input(key_tx));

    let guard = TerminalGuard::enter().context("Failed to enter raw mode")?;
    app.draw()?;

    loop {
        tokio::select! {
            Some(event) = keys.recv() => {
                match event {
                    Event::Key(key) => {
                        let action = map_key(key, store.navigation().get().view);
                        if action == Action::Quit {
                            break;
                        }
                        app.handle(action);
                    }
                    Event::Resize(width, height) => {
                        app.size = (width, height);
                        app.force_rebuild = true;
                    }
                    _ => continue,
                }
                app.draw()?;
            }
            Some(notice) = notices.recv() => {
                app.notice = Some(notice);
                app.draw()?;
            }
            _ = wake.notified() => {
                app.draw()?;
            }
        }
    }

    drop(guard);
    drop(app);
    info!("Shutting down");
    channel.disconnect();
    channel.close().await;
    Ok(())
}

/// Forwards terminal events until the receiver is dropped
fn read_input(events: mpsc::UnboundedSender<Event>) {
    while !events.is_closed() {
        match event::poll(INPUT_POLL) {
            Ok(true) => match event::read() {
                Ok(event) => {
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Terminal read failed: {}", e);
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                tracing::error!("Terminal poll failed: {}", e);
                break;
            }
        }
    }
}

struct App<'a> {
    store: Store,
    channel: &'a ChannelManager,
    client: GatewayClient,
    retry: RetryPreset,
    page_size: usize,
    notices: mpsc::UnboundedSender<String>,
    notice: Option<String>,
    cache: RenderCache<ListRenderer>,
    out: Stdout,
    size: (u16, u16),
    force_rebuild: bool,
}

impl App<'_> {
    fn handle(&mut self, action: Action) {
        self.channel.mark_activity();
        match action {
            Action::SelectNext => {
                self.store.select_next();
                self.keep_selection_visible();
            }
            Action::SelectPrevious => {
                self.store.select_previous();
                self.keep_selection_visible();
            }
            Action::PageDown => self.page(true),
            Action::PageUp => self.page(false),
            Action::Open => {
                if let Some(id) = self.store.open_selected() {
                    self.cache.destroy();
                    self.load_history(id);
                }
            }
            Action::Back => {
                self.store.close_conversation();
                self.force_rebuild = true;
            }
            Action::Type(c) => {
                let mut draft = self.store.navigation().get().draft.clone();
                draft.push(c);
                self.store.set_draft(draft);
            }
            Action::Backspace => {
                let mut draft = self.store.navigation().get().draft.clone();
                if draft.pop().is_some() {
                    self.store.set_draft(draft);
                }
            }
            Action::Send => self.send_draft(),
            Action::ToggleTimestamps => self.store.toggle_timestamps(),
            Action::Quit | Action::Ignore => {}
        }
    }

    fn retry_config(&self) -> RetryConfig {
        self.retry.config()
    }

    fn visible_rows(&self) -> usize {
        view::visible_rows(self.size.1)
    }

    fn keep_selection_visible(&self) {
        let nav = self.store.navigation().get();
        let rows = self.visible_rows();
        if nav.selected_index < nav.scroll_offset {
            self.store.scroll_to(nav.selected_index);
        } else if nav.selected_index >= nav.scroll_offset + rows {
            self.store.scroll_to(nav.selected_index + 1 - rows);
        }
    }

    fn page(&self, down: bool) {
        let len = self.store.conversations().get().conversations.len();
        let offset = self.store.navigation().get().scroll_offset;
        let rows = self.visible_rows();
        let target = if down {
            (offset + rows).min(len.saturating_sub(1))
        } else {
            offset.saturating_sub(rows)
        };
        self.store.scroll_to(target);
    }

    /// Initial conversation and contact lists
    fn load_lists(&self) {
        let store = self.store.clone();
        let notices = self.notices.clone();
        let list = retryable(
            |client: GatewayClient| async move { client.list_conversations().await },
            self.retry_config(),
        );
        let contacts = retryable(
            |client: GatewayClient| async move { client.list_contacts().await },
            self.retry_config(),
        );
        let client = self.client.clone();

        tokio::spawn(async move {
            match list.call(client.clone()).await {
                Ok(conversations) => store.set_conversations(conversations),
                Err(e) => {
                    tracing::error!("Failed to load conversations: {}", e);
                    let _ = notices.send(format!("could not load conversations: {}", e));
                }
            }
            match contacts.call(client).await {
                Ok(contacts) => store.set_contacts(contacts),
                Err(e) => tracing::warn!("Failed to load contacts: {}", e),
            }
        });
    }

    fn load_history(&self, conversation_id: String) {
        let store = self.store.clone();
        let notices = self.notices.clone();
        let limit = self.page_size;
        let fetch = retryable(
            move |(client, id): (GatewayClient, String)| async move { client.fetch_history(&id, limit).await },
            self.retry_config(),
        );
        let client = self.client.clone();

        tokio::spawn(async move {
            match fetch.call((client, conversation_id.clone())).await {
                Ok(history) => store.set_history(&conversation_id, history),
                Err(e) => {
                    tracing::error!("Failed to load history for {}: {}", conversation_id, e);
                    let _ = notices.send(format!("could not load history: {}", e));
                }
            }
        });
    }

    fn send_draft(&self) {
        let nav = self.store.navigation().get();
        let Some(conversation_id) = nav.active_conversation.clone() else {
            return;
        };
        let body = nav.draft.trim().to_string();
        if body.is_empty() {
            return;
        }
        self.store.set_draft(String::new());

        let store = self.store.clone();
        let notices = self.notices.clone();
        let send = retryable(
            |(client, id, body): (GatewayClient, String, String)| async move {
                client.send_message(&id, &body).await
            },
            self.retry_config(),
        );
        let client = self.client.clone();

        tokio::spawn(async move {
            match send.call((client, conversation_id, body)).await {
                Ok(message) => store.receive_message(message),
                Err(e) => {
                    tracing::error!("Failed to send message: {}", e);
                    let _ = notices.send(format!("message not sent: {}", e));
                }
            }
        });
    }

    fn draw(&mut self) -> Result<()> {
        let state = self.store.get_state();
        let notice = self.notice.as_deref();

        match state.navigation.view {
            View::ConversationList => {
                if self.cache.renderer().show_timestamps != state.settings.show_timestamps {
                    self.cache.renderer_mut().show_timestamps = state.settings.show_timestamps;
                    self.cache.destroy();
                }
                if self.force_rebuild {
                    self.cache.destroy();
                }
                let strategy = self.cache.render(&state, &state.conversations.conversations, self.force_rebuild);
                self.force_rebuild = false;
                tracing::trace!("List drawn with {:?}", strategy);
                view::draw_list(&mut self.out, &self.cache, &state, notice, self.size)?;
            }
            _ => view::draw_conversation(&mut self.out, &state, notice, self.size)?,
        }
        Ok(())
    }
}
