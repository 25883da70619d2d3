/// Market Regime Dashboard
///
/// Polls the quant backend for the indicator series and renders the
/// latest-point KPIs (spot price, RSI, AI regime, live signal) above the
/// price/EMA crossover chart. `r` asks the backend to recompute and
/// re-fetches after the advisory delay; `q` quits.
use std::{
    error::Error,
    io,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span, Text},
    widgets::{Axis, Block, BorderType, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame, Terminal,
};
use regime_tui::{
    chart, BackendConfig, DashboardState, HttpMarketApi, RsiBand, SyncController, SyncState,
};
use tokio::sync::Mutex;

// Colors - balanced palette for easy reading
const C_BUY: Color = Color::Rgb(100, 220, 100);
const C_SELL: Color = Color::Rgb(220, 100, 100);
const C_NEUTRAL: Color = Color::Rgb(180, 180, 100);
const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_BRIGHT: Color = Color::Rgb(220, 220, 220);
const C_ACCENT: Color = Color::Rgb(100, 180, 220);

type Controller = SyncController<HttpMarketApi>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let config = BackendConfig::from_env();
    let controller = Arc::new(SyncController::new(
        HttpMarketApi::new(config.clone()),
        config.refresh_delay,
    ));
    let store = controller.store();

    // Automatic fetch on startup, no user action required
    {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.initial_load().await });
    }

    let res = run_app(&mut terminal, store, controller).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    store: Arc<Mutex<DashboardState>>,
    controller: Arc<Controller>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        let snapshot = {
            let state = store.lock().await;
            state.clone()
        };

        terminal.draw(|f| ui(f, &snapshot))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('r') => {
                        // Mirror the disabled-while-syncing refresh control:
                        // a refresh in flight swallows further requests
                        if snapshot.sync != SyncState::Loading {
                            let controller = Arc::clone(&controller);
                            tokio::spawn(async move { controller.refresh().await });
                        }
                    }
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
}

fn ui(f: &mut Frame, state: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Min(0),
        ])
        .split(f.area());

    render_status_bar(f, chunks[0], state);
    render_kpi_cards(f, chunks[1], state);
    render_chart(f, chunks[2], state);
}

fn render_status_bar(f: &mut Frame, area: Rect, state: &DashboardState) {
    let (symbol, color, text) = match state.sync {
        SyncState::Idle => ("○", C_DIM, "STARTING"),
        SyncState::Loading => ("◌", C_NEUTRAL, "SYNCING..."),
        SyncState::Ready => ("●", C_BUY, "CONNECTED"),
        SyncState::Failed => ("○", C_SELL, "DISCONNECTED"),
    };

    let status = Span::styled(
        format!(" {symbol} {text} "),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    );

    let last_sync = Span::styled(
        match state.last_sync {
            Some(at) => format!(" last sync {} ", at.format("%H:%M:%S")),
            None => " no sync yet ".to_string(),
        },
        Style::default().fg(C_ACCENT),
    );

    let title = Span::styled(
        " ◆ MARKET REGIME DASHBOARD ◆ ",
        Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
    );

    let help = Span::styled(" [R] Refresh  [Q] Quit ", Style::default().fg(C_DIM));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(C_ACCENT));

    let paragraph = Paragraph::new(Line::from(vec![status, last_sync, title, help]))
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

fn render_kpi_cards(f: &mut Frame, area: Rect, state: &DashboardState) {
    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(area);

    let rsi_color = match state.kpis.rsi_band {
        Some(RsiBand::Overbought) => C_SELL,
        Some(RsiBand::Oversold) => C_BUY,
        Some(RsiBand::Neutral) => C_BRIGHT,
        None => C_DIM,
    };

    let signal_color = if state.kpis.signal.is_buy() {
        C_BUY
    } else {
        C_DIM
    };

    render_card(f, cards[0], "Spot Price", &state.kpis.price, C_BRIGHT);
    render_card(f, cards[1], "RSI (14)", &state.kpis.rsi, rsi_color);
    render_card(
        f,
        cards[2],
        "Market Regime (AI)",
        state.kpis.regime.as_str(),
        C_NEUTRAL,
    );
    render_card(
        f,
        cards[3],
        "Live Signal",
        state.kpis.signal.as_str(),
        signal_color,
    );
}

fn render_card(f: &mut Frame, area: Rect, title: &str, value: &str, value_color: Color) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(C_DIM))
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(C_DIM),
        ));

    let value_line = Line::from(Span::styled(
        value.to_string(),
        Style::default()
            .fg(value_color)
            .add_modifier(Modifier::BOLD),
    ));

    let paragraph = Paragraph::new(vec![Line::from(""), value_line])
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

fn render_chart(f: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(C_ACCENT))
        .title(Span::styled(
            " PRICE TREND & EMA CROSSOVER ",
            Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
        ));

    if state.chart.is_empty() {
        render_waiting_pane(f, area, block, state);
        return;
    }

    let close_data: Vec<(f64, f64)> = state
        .chart
        .iter()
        .map(|p| (p.timestamp.timestamp() as f64, p.close))
        .collect();
    let ema_fast_data: Vec<(f64, f64)> = state
        .chart
        .iter()
        .filter_map(|p| Some((p.timestamp.timestamp() as f64, p.ema_fast?)))
        .collect();
    let ema_slow_data: Vec<(f64, f64)> = state
        .chart
        .iter()
        .map(|p| (p.timestamp.timestamp() as f64, p.ema_slow))
        .collect();

    let mut datasets = vec![Dataset::default()
        .name("Price")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(C_ACCENT))
        .data(&close_data)];
    if !ema_fast_data.is_empty() {
        datasets.push(
            Dataset::default()
                .name("Fast EMA (9)")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(C_BUY))
                .data(&ema_fast_data),
        );
    }
    datasets.push(
        Dataset::default()
            .name("Slow EMA (21)")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(C_SELL))
            .data(&ema_slow_data),
    );

    let (x_low, x_high) = chart::x_bounds(&state.chart).unwrap_or((0.0, 1.0));
    let (y_low, y_high) = chart::y_bounds(&state.chart).unwrap_or((0.0, 1.0));
    // Breathing room so the extremes do not sit on the border
    let y_pad = ((y_high - y_low) * 0.05).max(1.0);

    let now = Utc::now();
    let x_labels: Vec<String> = state
        .chart
        .first()
        .into_iter()
        .chain(state.chart.get(state.chart.len() / 2))
        .chain(state.chart.last())
        .map(|p| chart::axis_label(p.timestamp, now))
        .collect();
    let y_labels: Vec<String> = [y_low, (y_low + y_high) / 2.0, y_high]
        .iter()
        .map(|v| format!("{v:.0}"))
        .collect();

    let widget = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(C_DIM))
                .bounds([x_low, x_high])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(C_DIM))
                .bounds([y_low - y_pad, y_high + y_pad])
                .labels(y_labels),
        );

    f.render_widget(widget, area);
}

fn render_waiting_pane(f: &mut Frame, area: Rect, block: Block, state: &DashboardState) {
    let mut lines = vec![Line::from("")];
    match state.sync {
        SyncState::Idle | SyncState::Loading => {
            lines.push(Line::from(Span::styled(
                "⏳ Connecting to backend...",
                Style::default().fg(C_DIM).add_modifier(Modifier::ITALIC),
            )));
            lines.push(Line::from(Span::styled(
                "The chart will appear automatically",
                Style::default().fg(C_DIM),
            )));
        }
        SyncState::Failed => {
            lines.push(Line::from(Span::styled(
                "✗ Disconnected from backend",
                Style::default().fg(C_SELL).add_modifier(Modifier::BOLD),
            )));
            if let Some(error) = &state.last_error {
                lines.push(Line::from(Span::styled(
                    error.clone(),
                    Style::default().fg(C_DIM),
                )));
            }
            lines.push(Line::from(Span::styled(
                "Press [R] to retry",
                Style::default().fg(C_NEUTRAL),
            )));
        }
        SyncState::Ready => {
            lines.push(Line::from(Span::styled(
                "No data yet",
                Style::default().fg(C_DIM),
            )));
            lines.push(Line::from(Span::styled(
                "Press [R] to ask the backend for a recompute",
                Style::default().fg(C_NEUTRAL),
            )));
        }
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}
