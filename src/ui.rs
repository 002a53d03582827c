use crate::session::PlaybackSession;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

const ACCENT: Color = Color::Rgb(100, 203, 184);
const MUTED: Color = Color::Rgb(149, 173, 204);
const ALERT: Color = Color::Rgb(249, 174, 88);

pub fn draw(frame: &mut Frame, session: &PlaybackSession, selected: usize, status: &str) {
    let areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(4),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_playlist(frame, areas[0], session, selected);
    draw_transport(frame, areas[1], session);

    let footer = Paragraph::new(status.to_string())
        .style(Style::default().fg(MUTED))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(footer, areas[2]);
}

fn draw_playlist(frame: &mut Frame, area: Rect, session: &PlaybackSession, selected: usize) {
    let current = session.current_index();
    let items: Vec<ListItem> = session
        .playlist()
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let marker = if Some(index) == current { "> " } else { "  " };
            let mut line = format!("{marker}{}", track.title);
            if !track.category.is_empty() {
                line.push_str(&format!("  [{}]", track.category));
            }
            let style = if Some(index) == current {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(line).style(style)
        })
        .collect();

    let title = format!("Playlist ({})", session.playlist().len());
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default();
    if !session.playlist().is_empty() {
        state.select(Some(selected.min(session.playlist().len() - 1)));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_transport(frame: &mut Frame, area: Rect, session: &PlaybackSession) {
    let snapshot = session.snapshot();
    let state = if snapshot.loading {
        "Loading"
    } else if snapshot.playing {
        "Playing"
    } else if snapshot.current_track.is_some() {
        "Paused"
    } else {
        "Idle"
    };
    let title = snapshot
        .current_track
        .as_ref()
        .map_or("-", |track| track.title.as_str());
    let volume = if snapshot.muted {
        String::from("muted")
    } else {
        format!("{}%", (snapshot.volume * 100.0).round() as u16)
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled(format!("{state}: "), Style::default().fg(ACCENT)),
            Span::raw(title.to_string()),
        ]),
        Line::from(format!(
            "{} / {}   vol {volume}   loop {}   shuffle {}",
            format_time(snapshot.current_time),
            format_time(snapshot.duration),
            snapshot.loop_mode.label(),
            if snapshot.shuffle { "on" } else { "off" },
        )),
    ];
    if let Some(error) = &snapshot.last_error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(ALERT))));
    }

    let transport = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(session.backend_name()));
    frame.render_widget(transport, area);
}

fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::format_time;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(61.9), "01:01");
        assert_eq!(format_time(-4.0), "00:00");
    }
}
