pub mod dashboard;
pub mod theme;


use chrono::{DateTime, Local};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Gauge, Paragraph};

use crate::format::{format_memory_detail, format_percent, truncate_unicode};
use crate::system::snapshot::NO_GPU_LABEL;
use crate::ui::dashboard::Dashboard;
use crate::ui::theme::Theme;

const TIME_CARD_HEIGHT: u16 = 5;
const STAT_CARD_HEIGHT: u16 = 4;

/// One stat card: title, gauge value and an optional detail line.
struct StatCard<'a> {
    title: &'static str,
    percent: f32,
    detail: Option<String>,
    color: ratatui::style::Color,
    theme: &'a Theme,
}

pub fn draw(frame: &mut Frame, dashboard: &Dashboard, now: DateTime<Local>) {
    let theme = Theme::default();
    let area = frame.area();
    frame.render_widget(
        Block::default().style(Style::default().bg(theme.background)),
        area,
    );

    let cards = stat_cards(dashboard, &theme);
    let mut constraints = vec![Constraint::Length(TIME_CARD_HEIGHT)];
    constraints.extend(cards.iter().map(|_| Constraint::Length(STAT_CARD_HEIGHT)));
    constraints.push(Constraint::Min(0));
    constraints.push(Constraint::Length(1));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    render_time_card(frame, chunks[0], now, &theme);
    for (card, chunk) in cards.iter().zip(chunks.iter().skip(1)) {
        render_stat_card(frame, *chunk, card);
    }
    if let Some(footer) = chunks.last() {
        render_footer(frame, *footer, dashboard, &theme);
    }
}

fn stat_cards<'a>(dashboard: &Dashboard, theme: &'a Theme) -> Vec<StatCard<'a>> {
    let mut cards = vec![StatCard {
        title: "CPU",
        percent: dashboard.cpu_percent,
        detail: None,
        color: theme.cpu,
        theme,
    }];

    let (memory_percent, memory_detail) = match dashboard.memory {
        Some(m) => (
            m.percent,
            Some(format_memory_detail(m.used_bytes, m.total_bytes)),
        ),
        None => (0.0, None),
    };
    cards.push(StatCard {
        title: "MEMORY",
        percent: memory_percent,
        detail: memory_detail,
        color: theme.memory,
        theme,
    });

    if dashboard.show_gpu {
        let (percent, label) = match &dashboard.gpu {
            Some(gpu) => (gpu.percent, gpu.label.clone()),
            None => (0.0, NO_GPU_LABEL.to_string()),
        };
        cards.push(StatCard {
            title: "GPU",
            percent,
            detail: Some(label),
            color: theme.gpu,
            theme,
        });
    }

    if dashboard.show_battery {
        let (percent, detail) = match dashboard.battery {
            Some(b) if b.charging => (b.percent, "Charging"),
            Some(b) => (b.percent, "On Battery"),
            None => (0.0, "Unknown"),
        };
        cards.push(StatCard {
            title: "BATTERY",
            percent,
            detail: Some(detail.to_string()),
            color: theme.battery,
            theme,
        });
    }

    cards
}

fn card_block(theme: &Theme) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(theme.background))
}

fn render_time_card(frame: &mut Frame, area: Rect, now: DateTime<Local>, theme: &Theme) {
    let block = card_block(theme);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = vec![
        Line::from(Span::styled(
            now.format("%H:%M:%S").to_string(),
            Style::default()
                .fg(theme.clock)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            now.format("%A, %B %d, %Y").to_string().to_uppercase(),
            Style::default().fg(theme.text_muted),
        )),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

fn render_stat_card(frame: &mut Frame, area: Rect, card: &StatCard<'_>) {
    let theme = card.theme;
    let block = card_block(theme).title(Span::styled(
        format!(" {} ", card.title),
        Style::default()
            .fg(theme.text_muted)
            .add_modifier(Modifier::BOLD),
    ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    let ratio = (card.percent as f64 / 100.0).clamp(0.0, 1.0);
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(card.color).bg(theme.gauge_track))
        .ratio(ratio)
        .label(Span::styled(
            format_percent(card.percent),
            Style::default()
                .fg(theme.text_main)
                .add_modifier(Modifier::BOLD),
        ));
    frame.render_widget(gauge, rows[0]);

    if let Some(detail) = &card.detail {
        let text = truncate_unicode(detail, rows[1].width as usize);
        frame.render_widget(
            Paragraph::new(Span::styled(text, Style::default().fg(theme.text_muted))),
            rows[1],
        );
    }
}

fn render_footer(frame: &mut Frame, area: Rect, dashboard: &Dashboard, theme: &Theme) {
    let text = truncate_unicode(&dashboard.platform_label, area.width as usize);
    frame.render_widget(
        Paragraph::new(Span::styled(text, Style::default().fg(theme.text_muted)))
            .alignment(Alignment::Center),
        area,
    );
}
