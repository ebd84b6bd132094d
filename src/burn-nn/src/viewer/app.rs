use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use log::{debug, info, warn};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use ratatui::{Terminal, prelude::*};
use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver},
    time::{Duration, Instant},
};

use crate::viewer::{
    export::{ExportError, save_figures},
    logs::{LogEntry, Metrics},
    plot::{Figure, LayoutOptions, build_figures},
    ui::ui,
};

pub const DEFAULT_SAVE_NAME: &str = "plot.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Open,
    SaveName,
    SaveDir,
}

impl PromptKind {
    pub fn title(self) -> &'static str {
        match self {
            PromptKind::Open => "Open logs (space separated paths)",
            PromptKind::SaveName => "File name",
            PromptKind::SaveDir => "Save to directory",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CurrentScreen {
    #[default]
    Main,
    Prompt(PromptKind),
    Message,
    Exiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEntry {
    pub name: String,
    pub checked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    SeparateTabs,
    Grid,
    SideBySide,
    Connect,
}

type WatchEvents = Receiver<notify::Result<notify::Event>>;

pub struct Viewer {
    pub exit: bool,
    pub current_screen: CurrentScreen,
    pub logs: Vec<LogEntry>,
    pub metrics: Metrics,
    pub checklist: Vec<MetricEntry>,
    pub cursor: usize,
    pub options: LayoutOptions,
    pub figures: Vec<Figure>,
    pub active_tab: usize,
    pub input: String,
    pub save_name: String,
    pub message: Option<Message>,
    watcher: Option<(RecommendedWatcher, WatchEvents)>,
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewer {
    pub fn new() -> Self {
        Self {
            exit: false,
            current_screen: CurrentScreen::default(),
            logs: Vec::new(),
            metrics: Metrics::default(),
            checklist: Vec::new(),
            cursor: 0,
            options: LayoutOptions::default(),
            figures: Vec::new(),
            active_tab: 0,
            input: String::new(),
            save_name: DEFAULT_SAVE_NAME.to_string(),
            message: None,
            watcher: None,
        }
    }

    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let tick_rate = Duration::from_millis(250);
        let mut last_tick = Instant::now();
        while !self.exit {
            terminal.draw(|frame| self.render(frame))?;

            let timeout = tick_rate.saturating_sub(last_tick.elapsed());
            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key_event(key);
                }
            }

            if last_tick.elapsed() >= tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn render(&self, frame: &mut Frame) {
        ui(frame, self);
    }

    fn on_tick(&mut self) {
        let changed = self.drain_watch_events();
        for path in changed {
            self.on_file_changed(&path);
        }
    }

    fn show(&mut self, level: MessageLevel, text: impl Into<String>) {
        self.message = Some(Message {
            level,
            text: text.into(),
        });
        self.current_screen = CurrentScreen::Message;
    }

    /// Replaces every loaded log. Files that fail to parse are reported and
    /// skipped; the rest still load.
    pub fn load_logs(&mut self, paths: &[PathBuf]) {
        self.watcher = None;
        self.logs.clear();
        self.figures.clear();
        self.active_tab = 0;

        let mut failures = Vec::new();
        for path in paths {
            match LogEntry::load(path) {
                Ok(entry) => self.logs.push(entry),
                Err(err) => {
                    warn!("{err}");
                    failures.push(err.to_string());
                }
            }
        }

        self.metrics = Metrics::detect(&self.logs);
        self.checklist = self
            .metrics
            .names()
            .iter()
            .map(|name| MetricEntry {
                name: name.clone(),
                checked: false,
            })
            .collect();
        self.cursor = 0;
        self.watch_logs();

        let summary = (!self.logs.is_empty()).then(|| {
            format!(
                "Loaded {} logs. Metrics: {}",
                self.logs.len(),
                self.metrics.names().join(", ")
            )
        });
        if let Some(summary) = &summary {
            info!("{summary}");
        }
        match (failures.is_empty(), summary) {
            (true, Some(summary)) => self.show(MessageLevel::Info, summary),
            (true, None) => {}
            (false, summary) => {
                failures.extend(summary);
                self.show(MessageLevel::Error, failures.join("\n"));
            }
        }
    }

    fn watch_logs(&mut self) {
        if self.logs.is_empty() {
            return;
        }
        let (tx, rx) = mpsc::channel();
        let mut watcher = match notify::recommended_watcher(tx) {
            Ok(watcher) => watcher,
            Err(err) => {
                warn!("File watching unavailable: {err}");
                return;
            }
        };
        for log in &self.logs {
            if let Err(err) = watcher.watch(&log.path, RecursiveMode::NonRecursive) {
                warn!("Cannot watch {}: {err}", log.path.display());
            }
        }
        self.watcher = Some((watcher, rx));
    }

    /// Paths of loaded logs touched since the last call, without duplicates.
    fn drain_watch_events(&mut self) -> Vec<PathBuf> {
        let Some((watcher, events)) = &mut self.watcher else {
            return Vec::new();
        };
        let mut changed: Vec<PathBuf> = Vec::new();
        while let Ok(event) = events.try_recv() {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    debug!("watch error: {err}");
                    continue;
                }
            };
            if !matches!(
                event.kind,
                EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
            ) {
                continue;
            }
            for path in event.paths {
                // Editors that save by rename drop the watch; re-arm it.
                if matches!(event.kind, EventKind::Remove(_)) && path.exists() {
                    if let Err(err) = watcher.watch(&path, RecursiveMode::NonRecursive) {
                        debug!("Cannot re-watch {}: {err}", path.display());
                    }
                }
                if !changed.contains(&path) {
                    changed.push(path);
                }
            }
        }
        changed
    }

    /// Re-reads the log at `path` and re-renders the current figures, if any.
    pub fn on_file_changed(&mut self, path: &Path) {
        let Some(log) = self.logs.iter_mut().find(|log| log.path == path) else {
            return;
        };
        if let Err(err) = log.reload() {
            debug!("Keeping previous contents of {}: {err}", path.display());
            return;
        }
        debug!("Reloaded {}", path.display());

        if self.figures.is_empty() {
            return;
        }
        if let Ok(figures) = build_figures(
            &self.logs,
            &self.metrics,
            &self.selected_metrics(),
            self.options,
        ) {
            self.set_figures(figures);
        }
    }

    pub fn selected_metrics(&self) -> Vec<String> {
        self.checklist
            .iter()
            .filter(|entry| entry.checked)
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn select_all(&mut self) {
        for entry in &mut self.checklist {
            entry.checked = true;
        }
    }

    pub fn toggle_current(&mut self) {
        if let Some(entry) = self.checklist.get_mut(self.cursor) {
            entry.checked = !entry.checked;
        }
    }

    pub fn move_cursor(&mut self, down: bool) {
        if self.checklist.is_empty() {
            return;
        }
        self.cursor = if down {
            (self.cursor + 1).min(self.checklist.len() - 1)
        } else {
            self.cursor.saturating_sub(1)
        };
    }

    pub fn toggle_option(&mut self, toggle: Toggle) {
        let flag = match toggle {
            Toggle::SeparateTabs => &mut self.options.separate_tabs,
            Toggle::Grid => &mut self.options.grid,
            Toggle::SideBySide => &mut self.options.side_by_side,
            Toggle::Connect => &mut self.options.connect,
        };
        *flag = !*flag;
    }

    fn set_figures(&mut self, figures: Vec<Figure>) {
        self.active_tab = self.active_tab.min(figures.len().saturating_sub(1));
        self.figures = figures;
    }

    pub fn plot_selected(&mut self) {
        match build_figures(
            &self.logs,
            &self.metrics,
            &self.selected_metrics(),
            self.options,
        ) {
            Ok(figures) => {
                self.active_tab = 0;
                self.set_figures(figures);
            }
            Err(err) => self.show(MessageLevel::Warning, err.to_string()),
        }
    }

    pub fn save_plots(&mut self, name: &str, dir: &Path) {
        match save_figures(&self.figures, dir, name) {
            Ok(paths) => {
                let text = format!("Saved {} images to {}", paths.len(), dir.display());
                self.show(MessageLevel::Info, text);
            }
            Err(err) => {
                warn!("{err:#}");
                let level = if err.is::<ExportError>() {
                    MessageLevel::Warning
                } else {
                    MessageLevel::Error
                };
                self.show(level, format!("{err:#}"));
            }
        }
    }

    fn next_tab(&mut self, forward: bool) {
        let len = self.figures.len();
        if len == 0 {
            return;
        }
        self.active_tab = if forward {
            (self.active_tab + 1) % len
        } else {
            (self.active_tab + len - 1) % len
        };
    }

    fn open_prompt(&mut self, kind: PromptKind, initial: &str) {
        self.input = initial.to_string();
        self.current_screen = CurrentScreen::Prompt(kind);
    }

    fn submit_prompt(&mut self, kind: PromptKind) {
        let input = std::mem::take(&mut self.input);
        self.current_screen = CurrentScreen::Main;
        match kind {
            PromptKind::Open => {
                let paths: Vec<PathBuf> = input.split_whitespace().map(PathBuf::from).collect();
                if !paths.is_empty() {
                    self.load_logs(&paths);
                }
            }
            PromptKind::SaveName => {
                if input.trim().is_empty() {
                    self.show(MessageLevel::Warning, "Enter filename.");
                    return;
                }
                self.save_name = input.trim().to_string();
                self.open_prompt(PromptKind::SaveDir, ".");
            }
            PromptKind::SaveDir => {
                let dir = input.trim();
                if dir.is_empty() {
                    return;
                }
                let name = self.save_name.clone();
                self.save_plots(&name, Path::new(dir));
            }
        }
    }

    pub fn handle_key_event(&mut self, key_event: KeyEvent) {
        if key_event.kind != KeyEventKind::Press {
            return;
        }
        match self.current_screen {
            CurrentScreen::Exiting => match key_event.code {
                KeyCode::Char('y') => {
                    self.exit = true;
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.current_screen = CurrentScreen::Main;
                }
                _ => {}
            },
            CurrentScreen::Message => {
                self.message = None;
                self.current_screen = CurrentScreen::Main;
            }
            CurrentScreen::Prompt(kind) => match key_event.code {
                KeyCode::Enter => self.submit_prompt(kind),
                KeyCode::Esc => {
                    self.input.clear();
                    self.current_screen = CurrentScreen::Main;
                }
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Char(c) => self.input.push(c),
                _ => {}
            },
            CurrentScreen::Main => match key_event.code {
                KeyCode::Char('q') => {
                    self.current_screen = CurrentScreen::Exiting;
                }
                KeyCode::Char('o') => self.open_prompt(PromptKind::Open, ""),
                KeyCode::Char('s') => self.toggle_option(Toggle::SeparateTabs),
                KeyCode::Char('g') => self.toggle_option(Toggle::Grid),
                KeyCode::Char('b') => self.toggle_option(Toggle::SideBySide),
                KeyCode::Char('c') => self.toggle_option(Toggle::Connect),
                KeyCode::Char('a') => self.select_all(),
                KeyCode::Char(' ') => self.toggle_current(),
                KeyCode::Char('p') | KeyCode::Enter => self.plot_selected(),
                KeyCode::Char('w') => {
                    if self.figures.is_empty() {
                        self.show(MessageLevel::Warning, "Nothing to save, plot some metrics first.");
                    } else {
                        let name = self.save_name.clone();
                        self.open_prompt(PromptKind::SaveName, &name);
                    }
                }
                KeyCode::Up => self.move_cursor(false),
                KeyCode::Down => self.move_cursor(true),
                KeyCode::Left => self.next_tab(false),
                KeyCode::Right => self.next_tab(true),
                _ => {}
            },
        }
    }
}
