//! TUI application loop for the deployment wizard.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;

use crate::chain::rpc::RpcClient;
use crate::chain::{ChainBackend, ChainError, ErrorSink};
use crate::config::Config;
use crate::deploy::{self, DeployUpdate};
use crate::ui::terminal_guard::TerminalGuard;
use crate::ui::wizard_view::{ScreenAction, WizardScreen};
use crate::wizard::{Prefill, Wizard};

/// Error sink for the TUI: failures are logged and surfaced as a status
/// notice instead of being printed over the alternate screen.
#[derive(Clone)]
pub struct UiErrorSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ErrorSink for UiErrorSink {
    fn report(&self, error: &ChainError) {
        tracing::error!(%error, "contract deployment failed");
        let _ = self.tx.send(error.to_string());
    }
}

pub struct App {
    config: Config,
    backend: Arc<RpcClient>,
    wizard: Wizard,
    screen: WizardScreen,
    updates: Option<mpsc::UnboundedReceiver<DeployUpdate>>,
    notice_tx: mpsc::UnboundedSender<String>,
    notice_rx: mpsc::UnboundedReceiver<String>,
    notice: Option<String>,
    should_quit: bool,
}

impl App {
    /// Connect to the node, load the owner accounts and open a wizard
    /// session.
    pub async fn new(config: Config, prefill: Prefill) -> Result<Self> {
        let backend = Arc::new(
            RpcClient::new(&config.node.url, config.node.request_timeout())
                .context("Failed to build the node client")?,
        );
        let accounts = backend
            .accounts()
            .await
            .with_context(|| format!("Failed to load accounts from {}", config.node.url))?;
        tracing::info!(count = accounts.len(), "loaded owner accounts");

        let wizard = Wizard::new(accounts, prefill);
        let screen = WizardScreen::new(&wizard);
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            backend,
            wizard,
            screen,
            updates: None,
            notice_tx,
            notice_rx,
            notice: None,
            should_quit: false,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        let _guard = TerminalGuard::new()?;
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;

        let tick_rate = Duration::from_millis(self.config.ui.refresh_rate_ms);

        while !self.should_quit {
            self.drain_updates();

            terminal.draw(|f| {
                self.screen.render(f, &self.wizard);
                if let Some(ref notice) = self.notice {
                    render_notice(f, notice);
                }
            })?;

            if event::poll(tick_rate)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, key: crossterm::event::KeyEvent) {
        match self.screen.handle_key(key, &mut self.wizard) {
            Some(ScreenAction::Close) => self.should_quit = true,
            Some(ScreenAction::StartDeployment) => self.start_deployment(),
            None => {}
        }
    }

    /// Finalize the wizard's fields and hand them to the deployment
    /// tracker. The one-way step transition means this runs at most once.
    fn start_deployment(&mut self) {
        match self.wizard.begin_deployment() {
            Ok(request) => {
                tracing::info!(name = %request.name, "starting contract deployment");
                let sink = UiErrorSink {
                    tx: self.notice_tx.clone(),
                };
                self.updates = Some(deploy::spawn(self.backend.clone(), sink, request));
            }
            Err(err) => {
                tracing::warn!(%err, "deployment not started");
            }
        }
    }

    /// Apply everything the tracker reported since the last tick.
    fn drain_updates(&mut self) {
        if let Some(rx) = &mut self.updates {
            while let Ok(update) = rx.try_recv() {
                match update {
                    DeployUpdate::Phase { phase, txhash } => {
                        self.wizard.apply_phase(phase, txhash);
                    }
                    DeployUpdate::Completed { address } => self.wizard.complete(address),
                    DeployUpdate::Rejected => self.wizard.reject(),
                    DeployUpdate::Failed { detail } => self.wizard.fail(detail),
                }
            }
        }
        while let Ok(notice) = self.notice_rx.try_recv() {
            self.notice = Some(notice);
        }
    }
}

fn render_notice(frame: &mut ratatui::Frame, notice: &str) {
    use ratatui::layout::Rect;
    use ratatui::style::{Color, Style};
    use ratatui::widgets::Paragraph;

    let area = frame.area();
    if area.height == 0 {
        return;
    }
    let line = Rect::new(area.x, area.y + area.height - 1, area.width, 1);
    frame.render_widget(
        Paragraph::new(notice.to_string()).style(Style::default().fg(Color::Red)),
        line,
    );
}
