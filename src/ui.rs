use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};
use std::ops::Range;

use crate::app::{
    App, Choice, DeleteConfirm, FilterPicker, FormField, PortSelector, PullForm, RunForm,
    TextBody, TextView, ViewMode,
};
use crate::model::{ListFilter, Record, ResourceKind, Tier, short_id};
use crate::presentation::visible;
use crate::viewport::scroll_indicator;

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const SELECTED: Color = Color::Rgb(24, 36, 58);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);

struct TableModel {
    headers: &'static [&'static str],
    widths: &'static [Constraint],
    total: usize,
    rows: Vec<(Vec<String>, Tier)>,
}

pub fn render(frame: &mut Frame, app: &App) {
    if let Some(error) = app.fatal() {
        render_fatal(frame, error);
        return;
    }

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_tabs(frame, root[0], app);
    render_info(frame, root[1], app);
    match app.mode() {
        ViewMode::Logs(view) => render_text_view(frame, root[2], "Logs", view, app),
        ViewMode::Inspect(view) => render_text_view(frame, root[2], "Inspect", view, app),
        _ => render_table(frame, root[2], app),
    }
    render_status(frame, root[3], app);
    render_hints(frame, root[4], app);

    match app.mode() {
        ViewMode::PortSelector(selector) => render_port_selector(frame, selector),
        ViewMode::DeleteConfirm(confirm) => render_delete_confirm(frame, confirm),
        ViewMode::Filter(picker) => render_filter_picker(frame, picker, app),
        ViewMode::RunResource(form) => render_run_form(frame, form),
        ViewMode::Pull(form) => render_pull_form(frame, form),
        ViewMode::List | ViewMode::Logs(_) | ViewMode::Inspect(_) => {}
    }

    if app.show_help() {
        render_help(frame);
    }
}

fn render_tabs(frame: &mut Frame, area: Rect, app: &App) {
    let titles = ResourceKind::ALL
        .iter()
        .enumerate()
        .map(|(index, kind)| {
            let filter = app.filter(*kind);
            if filter == ListFilter::All {
                Line::from(format!("{} {}", index + 1, kind.title()))
            } else {
                Line::from(format!("{} {} [{}]", index + 1, kind.title(), filter.label()))
            }
        })
        .collect::<Vec<_>>();

    let tabs = Tabs::new(titles)
        .select(app.active_tab().index())
        .style(Style::default().fg(MUTED).bg(BG))
        .highlight_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
        .divider("│");
    frame.render_widget(tabs, area);
}

fn render_info(frame: &mut Frame, area: Rect, app: &App) {
    let kind = app.active_tab();
    let mut spans = vec![Span::styled(
        match app.engine_version() {
            Some(version) => format!(" docker {version} "),
            None => " docker ".to_string(),
        },
        Style::default().fg(Color::Black).bg(ACCENT),
    )];

    let refreshed = match app.last_refresh(kind) {
        Some(ts) => format!("  {} refreshed {ts}", kind.title()),
        None => format!("  {} not loaded yet", kind.title()),
    };
    spans.push(Span::styled(refreshed, Style::default().fg(MUTED)));

    if matches!(app.mode(), ViewMode::List)
        && let Some(indicator) = app.viewport().indicator(app.visible_len())
    {
        spans.push(Span::styled(
            format!("  {indicator}"),
            Style::default().fg(Color::White),
        ));
    }
    if app.loading() {
        spans.push(Span::styled(
            format!("  {} loading", app.spinner()),
            Style::default().fg(WARN),
        ));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn table_model(app: &App) -> TableModel {
    let kind = app.active_tab();
    let filter = app.filter(kind);
    let viewport = app.viewport();

    match kind {
        ResourceKind::Containers => {
            let rows = visible(app.containers(), filter);
            let range = viewport.range(rows.len());
            TableModel {
                headers: &["NAME", "IMAGE", "STATE", "STATUS", "PORTS", "CPU", "MEM"],
                widths: &[
                    Constraint::Percentage(18),
                    Constraint::Percentage(20),
                    Constraint::Length(10),
                    Constraint::Percentage(18),
                    Constraint::Percentage(22),
                    Constraint::Length(7),
                    Constraint::Length(10),
                ],
                total: rows.len(),
                rows: slice_rows(&rows, range, |row| {
                    vec![
                        row.name.clone(),
                        row.image.clone(),
                        row.state.label().to_string(),
                        row.status.clone(),
                        row.ports_summary(),
                        format_percent(row.cpu_percent),
                        format_memory(row.memory_usage.as_deref(), row.memory_percent),
                    ]
                }),
            }
        }
        ResourceKind::Images => {
            let rows = visible(app.images(), filter);
            let range = viewport.range(rows.len());
            TableModel {
                headers: &["REPOSITORY", "TAG", "ID", "SIZE", "CREATED", "USED"],
                widths: &[
                    Constraint::Percentage(34),
                    Constraint::Percentage(16),
                    Constraint::Length(14),
                    Constraint::Length(10),
                    Constraint::Percentage(18),
                    Constraint::Length(5),
                ],
                total: rows.len(),
                rows: slice_rows(&rows, range, |row| {
                    vec![
                        row.repository.clone(),
                        row.tag.clone(),
                        short_id(&row.id).to_string(),
                        row.size.clone(),
                        row.created.clone(),
                        yes_no(row.in_use),
                    ]
                }),
            }
        }
        ResourceKind::Volumes => {
            let rows = visible(app.volumes(), filter);
            let range = viewport.range(rows.len());
            TableModel {
                headers: &["NAME", "DRIVER", "MOUNTPOINT", "USED"],
                widths: &[
                    Constraint::Percentage(35),
                    Constraint::Length(10),
                    Constraint::Percentage(50),
                    Constraint::Length(5),
                ],
                total: rows.len(),
                rows: slice_rows(&rows, range, |row| {
                    vec![
                        row.name.clone(),
                        row.driver.clone(),
                        row.mountpoint.clone(),
                        yes_no(row.in_use),
                    ]
                }),
            }
        }
        ResourceKind::Networks => {
            let rows = visible(app.networks(), filter);
            let range = viewport.range(rows.len());
            TableModel {
                headers: &["NAME", "ID", "DRIVER", "SCOPE", "CONTAINERS"],
                widths: &[
                    Constraint::Percentage(34),
                    Constraint::Length(14),
                    Constraint::Length(10),
                    Constraint::Length(8),
                    Constraint::Length(10),
                ],
                total: rows.len(),
                rows: slice_rows(&rows, range, |row| {
                    vec![
                        row.name.clone(),
                        short_id(&row.id).to_string(),
                        row.driver.clone(),
                        row.scope.clone(),
                        row.containers.to_string(),
                    ]
                }),
            }
        }
    }
}

fn slice_rows<R: Record>(
    rows: &[&R],
    range: Range<usize>,
    cells: impl Fn(&R) -> Vec<String>,
) -> Vec<(Vec<String>, Tier)> {
    rows[range]
        .iter()
        .map(|row| (cells(row), row.tier()))
        .collect()
}

fn render_table(frame: &mut Frame, area: Rect, app: &App) {
    let model = table_model(app);
    let viewport = app.viewport();
    let first = viewport.scroll;

    let header = Row::new(model.headers.iter().map(|header| {
        Cell::from(*header).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().fg(ACCENT))
    .bottom_margin(1);

    let rows = model
        .rows
        .into_iter()
        .enumerate()
        .map(|(offset, (cells, tier))| {
            let mut style = Style::default().fg(tier_color(tier));
            if first + offset == viewport.selection {
                style = style.bg(SELECTED).add_modifier(Modifier::BOLD);
            }
            Row::new(cells.into_iter().map(Cell::from)).style(style)
        });

    let kind = app.active_tab();
    let filter = app.filter(kind);
    let title = if filter == ListFilter::All {
        format!(" {} ({}) ", kind.title(), model.total)
    } else {
        format!(" {} ({}, {}) ", kind.title(), model.total, filter.label())
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .style(Style::default().bg(PANEL));

    let table = Table::new(rows, model.widths.to_vec())
        .header(header)
        .block(block)
        .column_spacing(1);
    frame.render_widget(table, area);

    if model.total == 0 {
        let empty = if app.loading() {
            "Loading..."
        } else {
            "Nothing to show"
        };
        let inner = Rect {
            x: area.x + 2,
            y: area.y + 3,
            width: area.width.saturating_sub(4),
            height: 1.min(area.height.saturating_sub(4)),
        };
        frame.render_widget(
            Paragraph::new(empty).style(Style::default().fg(MUTED)),
            inner,
        );
    }
}

fn render_text_view(frame: &mut Frame, area: Rect, label: &str, view: &TextView, app: &App) {
    let height = app.detail_height();
    let (lines, style) = match &view.body {
        TextBody::Loading => (
            vec![Line::from(format!("{} loading...", app.spinner()))],
            Style::default().fg(MUTED),
        ),
        TextBody::Failed(error) => (
            vec![Line::from(error.clone())],
            Style::default().fg(ERROR),
        ),
        TextBody::Lines(lines) => {
            let end = view.scroll.saturating_add(height).min(lines.len());
            let start = view.scroll.min(end);
            (
                lines[start..end]
                    .iter()
                    .map(|line| Line::from(line.clone()))
                    .collect(),
                Style::default().fg(Color::White),
            )
        }
    };

    let mut title = format!(" {label}: {} ", view.target.name);
    if let Some(indicator) = scroll_indicator(view.scroll, height, view.line_count()) {
        title.push_str(&format!("({indicator}) "));
    }

    let paragraph = Paragraph::new(lines).style(style).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(ACCENT))
            .style(Style::default().bg(PANEL)),
    );
    frame.render_widget(paragraph, area);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let status = app.status();
    let (text, style) = if let Some(action) = app.action_in_progress() {
        (
            format!(" {} {} ", app.spinner(), action.in_progress_text()),
            Style::default().fg(Color::Black).bg(WARN),
        )
    } else if status.starts_with("Error:") {
        (
            format!(" {status} "),
            Style::default().fg(Color::Black).bg(ERROR),
        )
    } else {
        (format!(" {status} "), Style::default().fg(Color::White).bg(PANEL))
    };
    let width = usize::from(area.width);
    frame.render_widget(
        Paragraph::new(compact_text(&text, width.max(1))).style(style),
        area,
    );
}

fn render_hints(frame: &mut Frame, area: Rect, app: &App) {
    let hints = match app.mode() {
        ViewMode::List => list_hints(app.active_tab()),
        ViewMode::Logs(_) | ViewMode::Inspect(_) => {
            "↑↓ scroll  g/G top/bottom  r reload  esc back  q quit".to_string()
        }
        ViewMode::PortSelector(_) | ViewMode::Filter(_) => {
            "↑↓ choose  enter select  esc cancel".to_string()
        }
        ViewMode::DeleteConfirm(_) => "←→ toggle  y yes  n no  enter confirm  esc cancel".to_string(),
        ViewMode::RunResource(_) => "tab next field  enter run  esc cancel".to_string(),
        ViewMode::Pull(_) => "enter pull  esc cancel".to_string(),
    };
    frame.render_widget(
        Paragraph::new(format!(" {hints}")).style(Style::default().fg(MUTED).bg(BG)),
        area,
    );
}

fn list_hints(kind: ResourceKind) -> String {
    let extra = match kind {
        ResourceKind::Containers => "s start  x stop  R restart  c console  L logs  o ports  ",
        ResourceKind::Images => "n run  p pull  ",
        ResourceKind::Volumes | ResourceKind::Networks => "",
    };
    format!("{extra}i inspect  d delete  f filter  tab switch  ? help  q quit")
}

fn render_port_selector(frame: &mut Frame, selector: &PortSelector) {
    let lines = selector
        .ports
        .iter()
        .enumerate()
        .map(|(index, port)| choice_line(&format!("http://localhost:{port}"), index == selector.selection))
        .collect::<Vec<_>>();
    render_modal(
        frame,
        &format!(" Open port: {} ", selector.target.name),
        lines,
        50,
        40,
    );
}

fn render_delete_confirm(frame: &mut Frame, confirm: &DeleteConfirm) {
    let button = |label: &str, active: bool| {
        if active {
            Span::styled(
                format!("[ {label} ]"),
                Style::default()
                    .fg(Color::Black)
                    .bg(if label == "Yes" { ERROR } else { ACCENT })
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(format!("  {label}  "), Style::default().fg(MUTED))
        }
    };
    let lines = vec![
        Line::from(format!(
            "Delete {} {}?",
            confirm.target.kind.singular(),
            confirm.target.name
        )),
        Line::from(""),
        Line::from(vec![
            button("No", confirm.choice == Choice::No),
            Span::raw("   "),
            button("Yes", confirm.choice == Choice::Yes),
        ]),
    ];
    render_modal(frame, " Confirm delete ", lines, 50, 30);
}

fn render_filter_picker(frame: &mut Frame, picker: &FilterPicker, app: &App) {
    let current = app.filter(picker.kind);
    let lines = picker
        .options()
        .iter()
        .enumerate()
        .map(|(index, filter)| {
            let label = if *filter == current {
                format!("{} (current)", filter.label())
            } else {
                filter.label().to_string()
            };
            choice_line(&label, index == picker.selection)
        })
        .collect::<Vec<_>>();
    render_modal(
        frame,
        &format!(" Filter {} ", picker.kind.title()),
        lines,
        40,
        40,
    );
}

fn render_run_form(frame: &mut Frame, form: &RunForm) {
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Image    ", Style::default().fg(MUTED)),
            Span::styled(form.image.clone(), Style::default().fg(ACCENT)),
        ]),
        Line::from(""),
    ];
    for field in FormField::ALL {
        let focused = field == form.focus;
        let value = form.value(field);
        let (text, style) = if value.is_empty() && !focused {
            (field.hint().to_string(), Style::default().fg(MUTED))
        } else if focused {
            (format!("{value}▏"), Style::default().fg(Color::White).bg(SELECTED))
        } else {
            (value.to_string(), Style::default().fg(Color::White))
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!("{:<9}", field.label()),
                if focused {
                    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(MUTED)
                },
            ),
            Span::styled(text, style),
        ]));
    }
    if let Some(error) = &form.error {
        lines.push(Line::from(""));
        lines.push(Line::styled(error.clone(), Style::default().fg(ERROR)));
    }
    render_modal(frame, " Run container ", lines, 70, 50);
}

fn render_pull_form(frame: &mut Frame, form: &PullForm) {
    let mut lines = vec![
        Line::styled("Image reference", Style::default().fg(MUTED)),
        Line::styled(
            format!("{}▏", form.reference),
            Style::default().fg(Color::White).bg(SELECTED),
        ),
    ];
    if let Some(error) = &form.error {
        lines.push(Line::from(""));
        lines.push(Line::styled(error.clone(), Style::default().fg(ERROR)));
    }
    render_modal(frame, " Pull image ", lines, 60, 30);
}

fn render_help(frame: &mut Frame) {
    let lines = [
        "Navigation",
        "  j/k ↑/↓        move selection or scroll",
        "  PgUp/PgDn      page   g/G  top/bottom",
        "  tab/←/→ 1-4    switch tab",
        "",
        "Containers",
        "  s start  x stop  R restart  c console",
        "  L logs   o open published port",
        "",
        "Images",
        "  n run a container   p pull an image",
        "",
        "Every tab",
        "  i inspect  d delete  f filter  r refresh",
        "",
        "esc closes a view   q or ctrl+c quits   any key closes help",
    ]
    .into_iter()
    .map(Line::from)
    .collect::<Vec<_>>();
    render_modal(frame, " Help ", lines, 60, 70);
}

fn render_fatal(frame: &mut Frame, error: &str) {
    let area = centered_rect(70, 40, frame.area());
    let lines = vec![
        Line::styled(
            "Cannot reach the Docker engine",
            Style::default().fg(ERROR).add_modifier(Modifier::BOLD),
        ),
        Line::from(""),
        Line::from(error.to_string()),
        Line::from(""),
        Line::styled("Press q to quit.", Style::default().fg(MUTED)),
    ];
    frame.render_widget(Block::default().style(Style::default().bg(BG)), frame.area());
    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .title(" wharf ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ERROR))
                .style(Style::default().bg(PANEL)),
        ),
        area,
    );
}

fn render_modal(frame: &mut Frame, title: &str, lines: Vec<Line<'_>>, percent_x: u16, percent_y: u16) {
    let area = centered_rect(percent_x, percent_y, frame.area());
    frame.render_widget(Clear, area);
    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));
    frame.render_widget(modal, area);
}

fn choice_line(label: &str, selected: bool) -> Line<'static> {
    if selected {
        Line::styled(
            format!("› {label}"),
            Style::default()
                .fg(ACCENT)
                .bg(SELECTED)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Line::styled(format!("  {label}"), Style::default().fg(Color::White))
    }
}

fn tier_color(tier: Tier) -> Color {
    match tier {
        Tier::Active => Color::White,
        Tier::Inactive => MUTED,
        Tier::Dangling => WARN,
    }
}

fn format_percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |value| format!("{value:.1}%"))
}

/// Used memory from `docker stats` ("12.5MiB / 7.6GiB"), else the percentage.
fn format_memory(usage: Option<&str>, percent: Option<f64>) -> String {
    match usage.and_then(|usage| usage.split('/').next()) {
        Some(used) if !used.trim().is_empty() => used.trim().to_string(),
        _ => format_percent(percent),
    }
}

fn yes_no(value: bool) -> String {
    (if value { "yes" } else { "no" }).to_string()
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{compact_text, format_memory, format_percent, list_hints, render};
    use crate::app::App;
    use crate::message::Message;
    use crate::model::{Collection, ContainerRecord, ContainerState, ResourceKind};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::time::Duration;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>()
    }

    #[test]
    fn renders_selected_container_and_indicator() {
        let mut app = App::new(Duration::from_secs(2), 100);
        app.update(Message::Resize {
            width: 100,
            height: 14,
        });
        let containers = (0..20)
            .map(|index| ContainerRecord {
                id: format!("c{index}"),
                name: format!("svc-{index:02}"),
                image: "nginx:latest".to_string(),
                state: ContainerState::Running,
                status: "Up".to_string(),
                ports: Vec::new(),
                created: String::new(),
                cpu_percent: Some(1.5),
                memory_percent: None,
                memory_usage: None,
            })
            .collect();
        app.update(Message::Fetched {
            kind: ResourceKind::Containers,
            result: Ok(Collection::Containers(containers)),
        });

        let mut terminal = Terminal::new(TestBackend::new(100, 14)).expect("terminal");
        terminal
            .draw(|frame| render(frame, &app))
            .expect("draw frame");
        let text = buffer_text(&terminal);
        assert!(text.contains("svc-00"));
        assert!(text.contains("1-6 of 20"));
        assert!(!text.contains("svc-06"));
    }

    #[test]
    fn fatal_screen_replaces_dashboard() {
        let mut app = App::new(Duration::from_secs(2), 100);
        app.set_fatal("permission denied");
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).expect("terminal");
        terminal
            .draw(|frame| render(frame, &app))
            .expect("draw frame");
        let text = buffer_text(&terminal);
        assert!(text.contains("Cannot reach the Docker engine"));
        assert!(!text.contains("Containers"));
    }

    #[test]
    fn helpers_format_cells() {
        assert_eq!(format_percent(Some(12.345)), "12.3%");
        assert_eq!(format_percent(None), "-");
        assert_eq!(format_memory(Some("12.5MiB / 7.6GiB"), Some(0.2)), "12.5MiB");
        assert_eq!(format_memory(None, Some(0.3)), "0.3%");
        assert_eq!(compact_text("abcdef", 4), "abc…");
        assert!(list_hints(ResourceKind::Images).starts_with("n run"));
    }
}
