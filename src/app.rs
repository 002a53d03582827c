use crate::audio::{AudioBackend, NullAudioBackend, RodioBackend};
use crate::config;
use crate::library;
use crate::model::{PersistedState, Settings};
use crate::session::{PlaybackSession, SessionEvent};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

const SEEK_STEP_SECS: f64 = 5.0;
const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Default)]
pub struct AppStartupOptions {
    /// Files or folders to play. Falls back to the folders from the last run.
    pub sources: Vec<PathBuf>,
    pub settings: Option<Settings>,
    pub null_audio: bool,
}

pub fn run_with_startup(options: AppStartupOptions) -> Result<()> {
    let persisted = config::load_state()?;
    let folders = if options.sources.is_empty() {
        persisted.folders.clone()
    } else {
        options.sources.clone()
    };

    let backend: Box<dyn AudioBackend> = if options.null_audio {
        Box::new(NullAudioBackend::new())
    } else {
        match RodioBackend::new() {
            Ok(backend) => Box::new(backend),
            Err(err) => {
                log::warn!("falling back to null audio: {err:#}");
                Box::new(NullAudioBackend::new())
            }
        }
    };

    let mut session = PlaybackSession::new(backend);
    let events = session.subscribe();
    session.set_playlist(library::scan_many(&folders));
    session.apply_settings(options.settings.unwrap_or(persisted.settings));

    let result = run_terminal(&mut session, &events);

    let state = PersistedState {
        folders,
        settings: session.settings(),
    };
    session.close();
    let save_result = config::save_state(&state);
    result?;
    save_result?;
    Ok(())
}

fn run_terminal(session: &mut PlaybackSession, events: &Receiver<SessionEvent>) -> Result<()> {
    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut selected = 0_usize;
    let mut status = String::from("space play/pause  n/p next/prev  m mute  l loop  s shuffle  q quit");
    let mut last_draw = Instant::now();

    let result: Result<()> = loop {
        session.tick();
        for event in events.try_iter() {
            if let Some(message) = status_for(&event) {
                status = message;
            }
        }

        if session.dirty || last_draw.elapsed() > Duration::from_millis(250) {
            terminal.draw(|frame| crate::ui::draw(frame, session, selected, &status))?;
            session.dirty = false;
            last_draw = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let outcome = match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break Ok(()),
            KeyCode::Char('q') => break Ok(()),
            KeyCode::Down => {
                selected = (selected + 1).min(session.playlist().len().saturating_sub(1));
                session.dirty = true;
                Ok(())
            }
            KeyCode::Up => {
                selected = selected.saturating_sub(1);
                session.dirty = true;
                Ok(())
            }
            KeyCode::Enter => session.load_index(selected, true),
            KeyCode::Char(' ') => session.toggle_play_pause(),
            KeyCode::Char('n') => session.next().map(drop),
            KeyCode::Char('p') => session.previous().map(drop),
            KeyCode::Right => session.seek(session.current_time() + SEEK_STEP_SECS),
            KeyCode::Left => session.seek(session.current_time() - SEEK_STEP_SECS),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                session.set_volume(session.volume() + VOLUME_STEP);
                Ok(())
            }
            KeyCode::Char('-') => {
                session.set_volume(session.volume() - VOLUME_STEP);
                Ok(())
            }
            KeyCode::Char('m') => {
                session.toggle_mute();
                Ok(())
            }
            KeyCode::Char('l') => {
                session.cycle_loop_mode();
                Ok(())
            }
            KeyCode::Char('s') => {
                session.toggle_shuffle();
                Ok(())
            }
            _ => Ok(()),
        };

        if let Err(err) = outcome {
            status = err.to_string();
            session.dirty = true;
        }
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn status_for(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Error { message } => Some(message.clone()),
        SessionEvent::EndOfPlaylist => Some(String::from("Reached end of playlist")),
        SessionEvent::LoopModeChanged { loop_mode } => {
            Some(format!("Loop: {}", loop_mode.label()))
        }
        SessionEvent::ShuffleChanged { enabled } => {
            Some(format!("Shuffle: {}", if *enabled { "on" } else { "off" }))
        }
        SessionEvent::VolumeChanged { volume, muted } => Some(if *muted {
            String::from("Muted")
        } else {
            format!("Volume: {}%", (volume * 100.0).round() as u16)
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LoopMode;

    #[test]
    fn status_reports_errors_and_policy_changes() {
        assert_eq!(
            status_for(&SessionEvent::Error {
                message: String::from("boom")
            }),
            Some(String::from("boom"))
        );
        assert_eq!(
            status_for(&SessionEvent::LoopModeChanged {
                loop_mode: LoopMode::All
            }),
            Some(String::from("Loop: all"))
        );
        assert_eq!(
            status_for(&SessionEvent::VolumeChanged {
                volume: 0.5,
                muted: false
            }),
            Some(String::from("Volume: 50%"))
        );
        assert_eq!(status_for(&SessionEvent::Closed), None);
    }
}
