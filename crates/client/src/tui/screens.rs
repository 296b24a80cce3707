use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Row, Table};

use seaway::{ConnectionStatus, RemoteEntity};

use crate::app::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sailing,
    Chat,
}

pub fn render(frame: &mut Frame, app: &App, mode: Mode, chat_input: &str, notice: Option<&str>) {
    let area = frame.area();

    let block = Block::default()
        .title(" Seaway ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(area);

    render_status(frame, chunks[0], app, notice);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);
    render_entities(frame, body[0], app);
    render_chat(frame, body[1], app);

    render_input(frame, chunks[2], mode, chat_input);
    render_help(frame, chunks[3], mode);
}

fn status_style(status: ConnectionStatus) -> (&'static str, Color) {
    match status {
        ConnectionStatus::Open => ("online", Color::Green),
        ConnectionStatus::Connecting => ("connecting", Color::Yellow),
        ConnectionStatus::Closed => ("offline", Color::Red),
    }
}

fn render_status(frame: &mut Frame, area: Rect, app: &App, notice: Option<&str>) {
    let client = app.client();
    let stats = client.stats();
    let (label, color) = status_style(client.status());

    let mut status = vec![
        Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(app.options().url.as_str(), Style::default().fg(Color::White)),
    ];
    if client.connection().reconnect_timer().is_pending() {
        status.push(Span::styled(
            format!("  retry {}", client.connection().retry_count()),
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(notice) = notice {
        status.push(Span::styled(
            format!("  {}", notice),
            Style::default().fg(Color::Red),
        ));
    }

    let rtt = stats
        .rtt_ms
        .map(|rtt| format!("RTT: {:.1}ms", rtt))
        .unwrap_or_else(|| "RTT: -".to_string());
    let traffic = format!(
        "{}  Frames: {} sent / {} recv / {} dropped",
        rtt, stats.frames_sent, stats.frames_received, stats.frames_dropped
    );

    let lines = vec![
        Line::from(status),
        Line::from(Span::styled(traffic, Style::default().fg(Color::DarkGray))),
    ];

    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(widget, area);
}

fn entity_row(entity: &RemoteEntity, local: &str) -> Row<'static> {
    let state = entity.current;
    let lag = entity
        .target()
        .map(|target| format!("{:.2}", target.position.distance(state.position)))
        .unwrap_or_else(|| "-".to_string());

    let style = if entity.name == local {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else if entity.is_initialized() {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    Row::new(vec![
        entity.name.clone(),
        format!("{:>8.1}", state.x()),
        format!("{:>8.1}", state.z()),
        format!("{:>6.0}", state.heading.to_degrees()),
        format!("{:>6.1}", state.velocity),
        lag,
    ])
    .style(style)
}

fn render_entities(frame: &mut Frame, area: Rect, app: &App) {
    let world = app.client().world();
    let local = app.options().name.as_str();
    let rows: Vec<Row> = world
        .sorted()
        .into_iter()
        .map(|entity| entity_row(entity, local))
        .collect();

    let header = Row::new(vec!["Ship", "X", "Z", "Hdg", "Speed", "Lag"])
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

    let table = Table::new(
        rows,
        [
            Constraint::Min(12),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(7),
            Constraint::Length(7),
            Constraint::Length(6),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .title(format!(" Ships ({}) ", world.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(table, area);
}

fn render_chat(frame: &mut Frame, area: Rect, app: &App) {
    let chat = app.chat();
    let visible = area.height.saturating_sub(2) as usize;

    let items: Vec<ListItem> = chat
        .iter()
        .skip(chat.len().saturating_sub(visible))
        .map(|message| {
            let sender_color = if message.sender == "system" {
                Color::Magenta
            } else {
                Color::Cyan
            };
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{}: ", message.sender),
                    Style::default().fg(sender_color),
                ),
                Span::styled(message.message.clone(), Style::default().fg(Color::White)),
            ]))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Chat ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(list, area);
}

fn render_input(frame: &mut Frame, area: Rect, mode: Mode, chat_input: &str) {
    let (text, border) = match mode {
        Mode::Chat => (format!("{}_", chat_input), Color::Yellow),
        Mode::Sailing => (String::from("Press T to chat"), Color::DarkGray),
    };

    let input = Paragraph::new(text)
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .title(" Message ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        );
    frame.render_widget(input, area);
}

fn render_help(frame: &mut Frame, area: Rect, mode: Mode) {
    let help = match mode {
        Mode::Sailing => "WASD/↑↓←→ Steer  T Chat  C Connect/Disconnect  Q Quit",
        Mode::Chat => "Enter Send  Esc Cancel",
    };

    let widget = Paragraph::new(help)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(widget, area);
}
