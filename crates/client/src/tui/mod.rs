mod screens;

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::app::App;
use crate::keys::{HeldKeys, steering_key};

pub use screens::Mode;

const POLL_TIMEOUT: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    ToggleConnection,
    SendChat(String),
    ChangeMode(Mode),
}

fn sailing_command(code: KeyCode) -> Action {
    match code {
        KeyCode::Enter | KeyCode::Char('t' | 'T') => Action::ChangeMode(Mode::Chat),
        KeyCode::Char('c' | 'C') => Action::ToggleConnection,
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Action::Quit,
        _ => Action::None,
    }
}

pub struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    mode: Mode,
    chat_input: String,
    notice: Option<String>,
    held: HeldKeys,
    enhanced_keys: bool,
    should_quit: bool,
}

impl Tui {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

        let enhanced_keys = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if enhanced_keys {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            mode: Mode::Sailing,
            chat_input: String::new(),
            notice: None,
            held: HeldKeys::new(enhanced_keys),
            enhanced_keys,
            should_quit: false,
        })
    }

    pub fn run(&mut self, app: &mut App) -> io::Result<()> {
        while !self.should_quit {
            app.frame();
            app.set_input(self.held.keys(Instant::now()));
            self.draw(app)?;

            if event::poll(POLL_TIMEOUT)? {
                self.drain_events(app)?;
            }
        }

        Ok(())
    }

    fn drain_events(&mut self, app: &mut App) -> io::Result<()> {
        loop {
            if let Event::Key(key) = event::read()? {
                let action = self.handle_key(key);
                self.process_action(action, app);
            }
            if self.should_quit || !event::poll(Duration::ZERO)? {
                return Ok(());
            }
        }
    }

    fn draw(&mut self, app: &App) -> io::Result<()> {
        let mode = self.mode;
        let chat_input = self.chat_input.as_str();
        let notice = self.notice.as_deref();

        self.terminal.draw(|frame| {
            screens::render(frame, app, mode, chat_input, notice);
        })?;

        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.kind == KeyEventKind::Release {
            if let Some(steer) = steering_key(key.code) {
                self.held.release(steer);
            }
            return Action::None;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }

        match self.mode {
            Mode::Sailing => self.handle_sailing_key(key.code),
            Mode::Chat => self.handle_chat_key(key.code),
        }
    }

    fn handle_sailing_key(&mut self, code: KeyCode) -> Action {
        if let Some(steer) = steering_key(code) {
            self.held.press(steer, Instant::now());
            return Action::None;
        }

        sailing_command(code)
    }

    fn handle_chat_key(&mut self, code: KeyCode) -> Action {
        match code {
            KeyCode::Esc => Action::ChangeMode(Mode::Sailing),
            KeyCode::Enter => Action::SendChat(std::mem::take(&mut self.chat_input)),
            KeyCode::Backspace => {
                self.chat_input.pop();
                Action::None
            }
            KeyCode::Char(c) => {
                self.chat_input.push(c);
                Action::None
            }
            _ => Action::None,
        }
    }

    fn process_action(&mut self, action: Action, app: &mut App) {
        match action {
            Action::None => {}
            Action::Quit => {
                self.should_quit = true;
            }
            Action::ToggleConnection => {
                self.notice = app.toggle_connection().err().map(|err| err.to_string());
            }
            Action::SendChat(text) => {
                app.send_chat(&text);
                self.mode = Mode::Sailing;
            }
            Action::ChangeMode(mode) => {
                // Steering keys typed into chat must not keep the ship turning.
                self.held.clear();
                self.mode = mode;
            }
        }
    }

    pub fn restore_terminal(&mut self) -> io::Result<()> {
        if self.enhanced_keys {
            execute!(self.terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
            self.enhanced_keys = false;
        }
        terminal::disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            cursor::Show
        )?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = self.restore_terminal();
    }
}

pub fn run(app: &mut App) -> io::Result<()> {
    let mut tui = Tui::new()?;
    let result = tui.run(app);
    tui.restore_terminal()?;
    result
}
