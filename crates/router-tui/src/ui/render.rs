use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Modifier, Style},
    text::Line,
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use super::app::{App, ClipChoice, Focus};

pub(crate) fn draw(f: &mut ratatui::Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),
            Constraint::Length(6),
            Constraint::Length(5),
        ])
        .split(f.area());

    let items: Vec<ListItem> = if let Some(err) = &app.device_error {
        vec![ListItem::new(format!("device enumeration failed: {err}"))]
    } else if app.devices.is_empty() {
        vec![ListItem::new("<no output devices>")]
    } else {
        let confirmed = app.confirmed_device.as_ref().map(|d| d.id);
        app.devices
            .iter()
            .map(|d| {
                let mut label = d.label();
                if confirmed == Some(d.id) {
                    label.push_str("  [selected]");
                }
                ListItem::new(label)
            })
            .collect()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(pane_title("Output Device", app.focus == Focus::Devices)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::BOLD))
        .highlight_symbol("▶ ");

    f.render_stateful_widget(list, chunks[0], &mut app.list_state);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);

    f.render_widget(
        channel_pane("Left (hw 1)", app.left_clip, app.focus == Focus::LeftChannel),
        panes[0],
    );
    f.render_widget(
        channel_pane(
            "Right (hw 2)",
            app.right_clip,
            app.focus == Focus::RightChannel,
        ),
        panes[1],
    );

    let output = app
        .confirmed_device
        .as_ref()
        .map(|d| d.label())
        .unwrap_or_else(|| "-".to_string());

    let footer_block = Block::default().borders(Borders::ALL).title("Status");
    let footer_inner = footer_block.inner(chunks[2]);
    f.render_widget(footer_block, chunks[2]);

    let footer_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(footer_inner);

    f.render_widget(
        Paragraph::new(Line::from(format!("status: {}", app.status))),
        footer_chunks[0],
    );
    f.render_widget(
        Paragraph::new(Line::from(format!(
            "output: {}   L: {}   R: {}",
            output,
            app.left_clip.name(),
            app.right_clip.name()
        ))),
        footer_chunks[1],
    );
    f.render_widget(
        Paragraph::new(Line::from(
            "keys: ↑/↓ select | Enter confirm device | Tab focus | Space toggle clip | p play | r refresh | q quit",
        )),
        footer_chunks[2],
    );
}

fn channel_pane(title: &str, choice: ClipChoice, focused: bool) -> Paragraph<'static> {
    let mark = |c: ClipChoice| if choice == c { "(•)" } else { "( )" };
    let lines = vec![
        Line::from(format!("{} ba", mark(ClipChoice::Ba))),
        Line::from(format!("{} da", mark(ClipChoice::Da))),
    ];

    Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(pane_title(title, focused)),
    )
}

fn pane_title(title: &str, focused: bool) -> String {
    if focused {
        format!("{title} ▶")
    } else {
        title.to_string()
    }
}
