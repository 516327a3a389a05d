// SPDX-License-Identifier: Apache-2.0

//! TUI Dashboard using ratatui.
//!
//! Visualizes the live event rate and the listener's counters. Same data as
//! the single-line monitor; the callback still does nothing but one counter
//! increment.

use std::error::Error;
use std::io::stdout;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use irqstream_core::{Config, IrqListener, ListenerStats};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};

/// Dashboard state.
struct App {
    /// Whether to quit the application.
    should_quit: bool,
    /// Events counted in the current one-second window.
    pulses: Arc<AtomicU32>,
    /// Rate from the last completed window.
    current_cps: u32,
    /// Highest rate seen this session.
    peak_cps: u32,
    /// When the current window closes.
    next_tick: Instant,
}

impl App {
    fn new(pulses: Arc<AtomicU32>) -> Self {
        Self {
            should_quit: false,
            pulses,
            current_cps: 0,
            peak_cps: 0,
            next_tick: Instant::now() + Duration::from_secs(1),
        }
    }

    /// Close the one-second window if it has elapsed.
    fn tick(&mut self) {
        if Instant::now() >= self.next_tick {
            self.next_tick += Duration::from_secs(1);
            self.current_cps = self.pulses.swap(0, Ordering::Relaxed);
            self.peak_cps = self.peak_cps.max(self.current_cps);
        }
    }
}

/// Run the TUI dashboard. Returns when the user quits.
pub fn run_dashboard(config: &Config) -> Result<(), Box<dyn Error>> {
    let pulses = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&pulses);

    let mut listener = IrqListener::new(config.listener.clone());
    let stats = listener.stats();
    listener.start(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    })?;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = App::new(pulses);

    // Main loop
    loop {
        terminal.draw(|frame| render(frame, &app, &stats))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
                        _ => {}
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }

        app.tick();
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    listener.stop();

    Ok(())
}

fn render(frame: &mut Frame, app: &App, stats: &ListenerStats) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(8),    // Main content
            Constraint::Length(3), // Footer
        ])
        .split(frame.area());

    // Title
    let title = Paragraph::new(" IRQSTREAM MONITOR ")
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    frame.render_widget(title, main_layout[0]);

    // Rate cell colored by the same thresholds as the plain readout.
    let rate_style = if app.current_cps > 50_000 {
        Style::default().fg(Color::Red)
    } else if app.current_cps > 10_000 {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Green)
    };

    let rows = vec![
        Row::new(vec![
            Cell::from("Live CPS"),
            Cell::from(format!("{} Hz", app.current_cps)).style(rate_style),
        ]),
        Row::new(vec![
            Cell::from("Peak CPS"),
            Cell::from(format!("{} Hz", app.peak_cps)),
        ]),
        Row::new(vec![
            Cell::from("Delivered"),
            Cell::from(stats.delivered().to_string()),
        ]),
        Row::new(vec![
            Cell::from("Lost to overrun"),
            Cell::from(stats.dropped().to_string()),
        ]),
        Row::new(vec![
            Cell::from("Attached"),
            Cell::from(if stats.attached() { "yes" } else { "no" }),
        ]),
    ];

    let table = Table::new(rows, [Constraint::Length(18), Constraint::Min(12)]).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Listener "),
    );
    frame.render_widget(table, main_layout[1]);

    // Footer
    let footer = Paragraph::new(" q / Esc: quit ")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, main_layout[2]);
}
