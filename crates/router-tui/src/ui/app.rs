use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event as CEvent, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend, widgets::ListState};

use router_player::clip::AudioClip;
use router_player::config::PlayerConfig;
use router_player::device::{self, OutputDevice};
use router_player::playback::PlaybackError;
use router_player::route;

use super::render;

/// Which clip a channel plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ClipChoice {
    Ba,
    Da,
}

impl ClipChoice {
    pub(crate) fn toggled(self) -> Self {
        match self {
            ClipChoice::Ba => ClipChoice::Da,
            ClipChoice::Da => ClipChoice::Ba,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            ClipChoice::Ba => "ba",
            ClipChoice::Da => "da",
        }
    }
}

/// Which pane receives Space presses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Focus {
    Devices,
    LeftChannel,
    RightChannel,
}

/// Immutable snapshot of the user's choices, taken the moment Play fires.
///
/// Playback reads only this snapshot; whatever the UI state does afterwards
/// cannot affect a run already in flight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Selection {
    pub(crate) device_id: usize,
    pub(crate) device_label: String,
    pub(crate) left: ClipChoice,
    pub(crate) right: ClipChoice,
}

/// Launch the TUI and drive the event loop until quit.
pub(crate) fn run_tui(
    host: cpal::Host,
    ba: AudioClip,
    da: AudioClip,
    preselect: Option<&str>,
) -> Result<()> {
    let mut app = App::new(ba, da);
    app.refresh_devices(&host);
    if let Some(needle) = preselect {
        app.preselect_device(needle);
    }

    let mut term = init_terminal()?;
    let result = ui_loop(&mut term, &mut app, &host);

    restore_terminal(&mut term)?;
    result
}

/// In-memory UI state for rendering + interaction.
pub(crate) struct App {
    pub(crate) devices: Vec<OutputDevice>,
    pub(crate) device_error: Option<String>,
    pub(crate) list_state: ListState,
    pub(crate) confirmed_device: Option<OutputDevice>,
    pub(crate) left_clip: ClipChoice,
    pub(crate) right_clip: ClipChoice,
    pub(crate) focus: Focus,
    pub(crate) status: String,
    ba: AudioClip,
    da: AudioClip,
    cfg: PlayerConfig,
}

impl App {
    fn new(ba: AudioClip, da: AudioClip) -> Self {
        Self {
            devices: Vec::new(),
            device_error: None,
            list_state: ListState::default(),
            confirmed_device: None,
            left_clip: ClipChoice::Da,
            right_clip: ClipChoice::Da,
            focus: Focus::Devices,
            status: "Ready".into(),
            ba,
            da,
            cfg: PlayerConfig::default(),
        }
    }

    fn refresh_devices(&mut self, host: &cpal::Host) {
        self.apply_device_list(device::list_output_devices(host).map_err(|e| format!("{e}")));
    }

    /// Replace the device snapshot, keeping the highlight in range. An
    /// enumeration failure becomes a visible error state instead of a crash;
    /// `r` re-queries.
    fn apply_device_list(&mut self, result: std::result::Result<Vec<OutputDevice>, String>) {
        match result {
            Ok(devices) => {
                self.devices = devices;
                self.device_error = None;
                if self.devices.is_empty() {
                    self.list_state.select(None);
                } else {
                    let i = self
                        .list_state
                        .selected()
                        .unwrap_or(0)
                        .min(self.devices.len() - 1);
                    self.list_state.select(Some(i));
                }
            }
            Err(e) => {
                self.devices.clear();
                self.device_error = Some(e);
                self.list_state.select(None);
            }
        }
    }

    /// Highlight and confirm the first device whose name matches `needle`.
    fn preselect_device(&mut self, needle: &str) {
        let found = self
            .devices
            .iter()
            .position(|d| device::matches_device_name(&d.name, needle));
        match found {
            Some(i) => {
                self.list_state.select(Some(i));
                self.confirm_selected();
            }
            None => self.status = format!("No output device matched: {needle}"),
        }
    }

    fn select_next(&mut self) {
        if self.devices.is_empty() {
            return;
        }
        let i = self.list_state.selected().unwrap_or(0);
        let ni = (i + 1).min(self.devices.len() - 1);
        self.list_state.select(Some(ni));
    }

    fn select_prev(&mut self) {
        if self.devices.is_empty() {
            return;
        }
        let i = self.list_state.selected().unwrap_or(0);
        let ni = i.saturating_sub(1);
        self.list_state.select(Some(ni));
    }

    fn confirm_selected(&mut self) {
        let Some(i) = self.list_state.selected() else {
            self.status = "No device highlighted".into();
            return;
        };
        let Some(d) = self.devices.get(i) else {
            return;
        };
        self.confirmed_device = Some(d.clone());
        self.status = format!("Output: {}", d.label());
    }

    fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Devices => Focus::LeftChannel,
            Focus::LeftChannel => Focus::RightChannel,
            Focus::RightChannel => Focus::Devices,
        };
    }

    fn toggle_focused_clip(&mut self) {
        match self.focus {
            Focus::Devices => self.status = "Tab to a channel pane to change its clip".into(),
            Focus::LeftChannel => self.left_clip = self.left_clip.toggled(),
            Focus::RightChannel => self.right_clip = self.right_clip.toggled(),
        }
    }

    /// The snapshot Play acts on; `None` until a device has been confirmed.
    fn selection(&self) -> Option<Selection> {
        let device = self.confirmed_device.as_ref()?;
        Some(Selection {
            device_id: device.id,
            device_label: device.label(),
            left: self.left_clip,
            right: self.right_clip,
        })
    }

    fn play(&self, host: &cpal::Host, sel: &Selection) -> std::result::Result<(), PlaybackError> {
        route::play_selection(
            host,
            sel.device_id,
            self.clip(sel.left),
            self.clip(sel.right),
            &self.cfg,
        )
    }

    fn clip(&self, choice: ClipChoice) -> &AudioClip {
        match choice {
            ClipChoice::Ba => &self.ba,
            ClipChoice::Da => &self.da,
        }
    }
}

fn ui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    host: &cpal::Host,
) -> Result<()> {
    let tick = Duration::from_millis(33);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| render::draw(f, app))?;

        let timeout = tick.saturating_sub(last_tick.elapsed());
        if event::poll(timeout).context("poll terminal events")? {
            if let CEvent::Key(k) = event::read().context("read terminal event")? {
                match k.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Up => app.select_prev(),
                    KeyCode::Down => app.select_next(),
                    KeyCode::Tab => app.cycle_focus(),
                    KeyCode::Enter => app.confirm_selected(),
                    KeyCode::Char(' ') => app.toggle_focused_clip(),
                    KeyCode::Char('r') => {
                        app.refresh_devices(host);
                        app.status = "Device list refreshed".into();
                    }
                    KeyCode::Char('p') => match app.selection() {
                        None => app.status = "Pick a device first (Enter confirms)".into(),
                        Some(sel) => {
                            app.status = format!(
                                "Playing {} → left, {} → right on {}",
                                sel.left.name(),
                                sel.right.name(),
                                sel.device_label
                            );
                            // Playback blocks the loop; show what is about to
                            // happen before we stop redrawing.
                            terminal.draw(|f| render::draw(f, app))?;
                            app.status = match app.play(host, &sel) {
                                Ok(()) => format!(
                                    "Done: {} → left, {} → right",
                                    sel.left.name(),
                                    sel.right.name()
                                ),
                                Err(e) => format!("Playback failed: {e}"),
                            };
                        }
                    },
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick {
            last_tick = Instant::now();
        }
    }
}

fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("create terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        App::new(
            AudioClip::from_samples("ba", 48_000, vec![0.0; 480]),
            AudioClip::from_samples("da", 48_000, vec![0.0; 480]),
        )
    }

    fn dev(id: usize, name: &str) -> OutputDevice {
        OutputDevice {
            id,
            name: name.to_string(),
            max_output_channels: 2,
        }
    }

    #[test]
    fn channels_default_to_da() {
        let app = test_app();
        assert_eq!(app.left_clip, ClipChoice::Da);
        assert_eq!(app.right_clip, ClipChoice::Da);
    }

    #[test]
    fn toggle_affects_only_focused_channel() {
        let mut app = test_app();
        app.focus = Focus::LeftChannel;
        app.toggle_focused_clip();
        assert_eq!(app.left_clip, ClipChoice::Ba);
        assert_eq!(app.right_clip, ClipChoice::Da);

        app.focus = Focus::Devices;
        app.toggle_focused_clip();
        assert_eq!(app.left_clip, ClipChoice::Ba);
        assert_eq!(app.right_clip, ClipChoice::Da);
    }

    #[test]
    fn selection_requires_confirmed_device() {
        let mut app = test_app();
        assert!(app.selection().is_none());

        app.apply_device_list(Ok(vec![dev(0, "Speakers")]));
        assert!(app.selection().is_none());

        app.confirm_selected();
        let sel = app.selection().unwrap();
        assert_eq!(sel.device_id, 0);
        assert_eq!(sel.device_label, "0: Speakers");
    }

    #[test]
    fn selection_uses_confirmed_device_not_highlight() {
        let mut app = test_app();
        app.apply_device_list(Ok(vec![dev(0, "Speakers"), dev(4, "USB DAC")]));
        app.confirm_selected();
        app.select_next();

        let sel = app.selection().unwrap();
        assert_eq!(sel.device_id, 0);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_toggles() {
        let mut app = test_app();
        app.apply_device_list(Ok(vec![dev(2, "Speakers")]));
        app.confirm_selected();
        app.focus = Focus::RightChannel;
        app.toggle_focused_clip();

        let sel = app.selection().unwrap();
        assert_eq!(sel.right, ClipChoice::Ba);

        app.toggle_focused_clip();
        assert_eq!(sel.right, ClipChoice::Ba);
        assert_eq!(app.right_clip, ClipChoice::Da);
    }

    #[test]
    fn preselect_matches_case_insensitive_substring() {
        let mut app = test_app();
        app.apply_device_list(Ok(vec![dev(0, "Built-in Speakers"), dev(2, "USB DAC")]));
        app.preselect_device("usb");

        let sel = app.selection().unwrap();
        assert_eq!(sel.device_id, 2);
    }

    #[test]
    fn preselect_without_match_confirms_nothing() {
        let mut app = test_app();
        app.apply_device_list(Ok(vec![dev(0, "Speakers")]));
        app.preselect_device("hdmi");

        assert!(app.selection().is_none());
        assert!(app.status.contains("hdmi"));
    }

    #[test]
    fn enumeration_error_becomes_error_state() {
        let mut app = test_app();
        app.apply_device_list(Ok(vec![dev(0, "Speakers")]));
        app.apply_device_list(Err("backend unavailable".into()));

        assert!(app.devices.is_empty());
        assert_eq!(app.device_error.as_deref(), Some("backend unavailable"));
        assert!(app.list_state.selected().is_none());
    }

    #[test]
    fn refresh_clamps_highlight_to_new_list() {
        let mut app = test_app();
        app.apply_device_list(Ok(vec![
            dev(0, "A"),
            dev(1, "B"),
            dev(2, "C"),
        ]));
        app.list_state.select(Some(2));

        app.apply_device_list(Ok(vec![dev(0, "A")]));
        assert_eq!(app.list_state.selected(), Some(0));
    }
}
