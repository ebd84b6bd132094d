use crate::viewer::{
    app::{CurrentScreen, MessageLevel, Viewer},
    logs::PALETTE,
    plot::{LineStyle, Panel, X_LABEL},
};
use ratatui::{
    prelude::*,
    symbols,
    widgets::{
        Axis, Block, Chart, Clear, Dataset, GraphType, List, ListItem, ListState, Paragraph, Tabs,
        Wrap,
    },
};

pub fn ui(f: &mut Frame, app: &Viewer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(f.area());

    match app.current_screen {
        CurrentScreen::Exiting => exiting_screen(f, chunks[0]),
        _ => main_screen(f, app, chunks[0]),
    }
    status_line(f, app, chunks[1]);

    match app.current_screen {
        CurrentScreen::Prompt(kind) => prompt_popup(f, kind.title(), &app.input),
        CurrentScreen::Message => message_popup(f, app),
        _ => {}
    }
}

fn main_screen(f: &mut Frame, app: &Viewer, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(75), Constraint::Percentage(25)])
        .split(area);

    figures_view(f, app, chunks[0]);
    side_panel(f, app, chunks[1]);
}

fn welcome(f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from("Learning Curve Viewer".bold()),
        Line::from(""),
        Line::from("Press 'o' to open CSV logs."),
        Line::from("Press 'a' then 'p' to plot every metric."),
        Line::from("Press 'q' to quit."),
    ];
    let paragraph = Paragraph::new(text)
        .block(Block::bordered().title("Figures"))
        .alignment(Alignment::Center);
    f.render_widget(paragraph, area);
}

fn figures_view(f: &mut Frame, app: &Viewer, area: Rect) {
    let Some(figure) = app.figures.get(app.active_tab) else {
        welcome(f, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let titles: Vec<String> = app.figures.iter().map(|fig| fig.title.clone()).collect();
    let tabs = Tabs::new(titles)
        .block(Block::bordered().title("Figures"))
        .select(app.active_tab)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, chunks[0]);

    let count = figure.panels.len().max(1) as u32;
    let areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints((0..count).map(|_| Constraint::Ratio(1, count)))
        .split(chunks[1]);
    for (panel, area) in figure.panels.iter().zip(areas.iter()) {
        render_panel(f, panel, *area);
    }
}

fn marker(style: LineStyle) -> symbols::Marker {
    match style {
        LineStyle::Solid => symbols::Marker::Braille,
        LineStyle::Dashed => symbols::Marker::Dot,
        LineStyle::Dotted => symbols::Marker::Bar,
        LineStyle::DashDot => symbols::Marker::HalfBlock,
    }
}

fn palette_color(index: usize) -> Color {
    let (r, g, b) = PALETTE[index % PALETTE.len()];
    Color::Rgb(r, g, b)
}

/// Interior grid lines at the quartiles of both axes.
fn grid_lines(x: [f64; 2], y: [f64; 2]) -> Vec<Vec<(f64, f64)>> {
    let at = |range: [f64; 2], t: f64| range[0] + (range[1] - range[0]) * t;
    [0.25, 0.5, 0.75]
        .into_iter()
        .flat_map(|t| {
            [
                vec![(x[0], at(y, t)), (x[1], at(y, t))],
                vec![(at(x, t), y[0]), (at(x, t), y[1])],
            ]
        })
        .collect()
}

fn axis_labels(range: [f64; 2]) -> Vec<String> {
    let mid = (range[0] + range[1]) / 2.0;
    [range[0], mid, range[1]]
        .iter()
        .map(|v| format!("{v:.3}"))
        .collect()
}

fn render_panel(f: &mut Frame, panel: &Panel, area: Rect) {
    let block = Block::bordered().title(panel.title.clone());
    let Some((x_bounds, y_bounds)) = panel.bounds() else {
        f.render_widget(Paragraph::new("No finite values").block(block), area);
        return;
    };

    let grid = if panel.grid {
        grid_lines(x_bounds, y_bounds)
    } else {
        Vec::new()
    };
    let segments: Vec<_> = panel
        .series
        .iter()
        .map(|series| (series, series.segments()))
        .collect();

    let mut datasets: Vec<Dataset> = grid
        .iter()
        .map(|line| {
            Dataset::default()
                .marker(symbols::Marker::Dot)
                .style(Style::default().fg(Color::DarkGray))
                .graph_type(GraphType::Line)
                .data(line)
        })
        .collect();
    for (series, parts) in &segments {
        for (idx, part) in parts.iter().enumerate() {
            let mut dataset = Dataset::default()
                .marker(marker(series.style))
                .style(Style::default().fg(palette_color(series.color)))
                .graph_type(GraphType::Line)
                .data(part);
            if idx == 0 {
                dataset = dataset.name(series.label.clone());
            }
            datasets.push(dataset);
        }
    }

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .title(X_LABEL)
                .style(Style::default().fg(Color::Gray))
                .bounds(x_bounds)
                .labels(axis_labels(x_bounds)),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds(y_bounds)
                .labels(axis_labels(y_bounds)),
        );

    f.render_widget(chart, area);
}

fn checkbox(checked: bool) -> &'static str {
    if checked { "[x]" } else { "[ ]" }
}

fn side_panel(f: &mut Frame, app: &Viewer, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(3), Constraint::Length(6)])
        .split(area);

    let options = &app.options;
    let lines: Vec<Line> = [
        (options.separate_tabs, 's', "Separate tabs"),
        (options.grid, 'g', "Grid"),
        (options.side_by_side, 'b', "Side by side"),
        (options.connect, 'c', "Connect logs"),
    ]
    .into_iter()
    .map(|(on, key, label)| Line::from(format!("{} ({key}) {label}", checkbox(on))))
    .collect();
    f.render_widget(
        Paragraph::new(lines).block(Block::bordered().title("Options")),
        chunks[0],
    );

    let items: Vec<ListItem> = app
        .checklist
        .iter()
        .map(|entry| {
            let color = app
                .metrics
                .color_index(&entry.name)
                .map(palette_color)
                .unwrap_or(Color::White);
            ListItem::new(Line::from(vec![
                Span::raw(format!("{} ", checkbox(entry.checked))),
                Span::styled(entry.name.clone(), Style::default().fg(color)),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(Block::bordered().title("Metrics"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state =
        ListState::default().with_selected((!app.checklist.is_empty()).then_some(app.cursor));
    f.render_stateful_widget(list, chunks[1], &mut state);

    let help = vec![
        Line::from("space toggle, a plot all"),
        Line::from("p/enter plot selected"),
        Line::from("←/→ tabs, w save"),
        Line::from("o open, q quit"),
    ];
    f.render_widget(
        Paragraph::new(help).block(Block::bordered().title("Keys")),
        chunks[2],
    );
}

fn status_line(f: &mut Frame, app: &Viewer, area: Rect) {
    let names: Vec<&str> = app.logs.iter().map(|log| log.name.as_str()).collect();
    let text = if names.is_empty() {
        "No logs loaded".to_string()
    } else {
        format!("{} logs: {}", names.len(), names.join(", "))
    };
    f.render_widget(Paragraph::new(text).style(Style::default().fg(Color::Gray)), area);
}

fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Fill(1), Constraint::Length(height), Constraint::Fill(1)])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn prompt_popup(f: &mut Frame, title: &str, input: &str) {
    let area = centered_rect(60, 3, f.area());
    f.render_widget(Clear, area);
    let paragraph = Paragraph::new(format!("{input}_"))
        .block(Block::bordered().title(title.to_string()).title_bottom("enter ok, esc cancel"));
    f.render_widget(paragraph, area);
}

fn message_popup(f: &mut Frame, app: &Viewer) {
    let Some(message) = &app.message else {
        return;
    };
    let (title, color) = match message.level {
        MessageLevel::Info => ("Info", Color::Cyan),
        MessageLevel::Warning => ("Warning", Color::Yellow),
        MessageLevel::Error => ("Error", Color::Red),
    };
    let height = message.text.lines().count() as u16 + 4;
    let area = centered_rect(60, height, f.area());
    f.render_widget(Clear, area);
    let paragraph = Paragraph::new(message.text.clone())
        .wrap(Wrap { trim: false })
        .block(
            Block::bordered()
                .title(title)
                .title_bottom("press any key")
                .border_style(Style::default().fg(color)),
        );
    f.render_widget(paragraph, area);
}

fn exiting_screen(f: &mut Frame, area: Rect) {
    let text = "Are you sure you want to quit? (y/n)";
    let paragraph = Paragraph::new(text)
        .block(Block::bordered().title("Exit"))
        .alignment(Alignment::Center);
    f.render_widget(paragraph, area);
}
