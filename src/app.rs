//! Main application view for Voxmemo

use crate::audio::PipeWireBackend;
use crate::session::{
    format_clock, DconfPermissionGate, EventReceiver, RecordRequest, SessionController,
    SessionEvent, SessionState,
};
use gpui::prelude::*;
use gpui::*;
use log::debug;
use uuid::Uuid;
use std::time::{Duration, Instant};

pub type Session = SessionController<PipeWireBackend, DconfPermissionGate>;

/// How often backend events are drained when nothing else is running
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Number of level bars in the visualizer
pub const VISUALIZER_BARS: usize = 48;

/// The currently active view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ActiveView {
    #[default]
    Recorder,
    Recordings,
}

/// The root application view
pub struct Voxmemo {
    session: Session,
    events: EventReceiver,
    active_view: ActiveView,
    /// One-line message under the transport controls
    status: Option<SharedString>,
    /// Task driving the sampling timer, tagged with the timer generation
    sampling_task: Option<(u64, Task<()>)>,
    _event_pump: Task<()>,
}

impl Voxmemo {
    pub fn new(session: Session, events: EventReceiver, cx: &mut Context<Self>) -> Self {
        let event_pump = cx.spawn(async move |this: WeakEntity<Self>, cx: &mut AsyncApp| {
            loop {
                cx.background_executor().timer(EVENT_POLL_INTERVAL).await;

                let Some(this) = this.upgrade() else {
                    break;
                };
                let result = cx.update_entity(&this, |view, cx| {
                    if view.drain_events(cx) {
                        cx.notify();
                    }
                });
                if result.is_err() {
                    break;
                }
            }
        });

        Self {
            session,
            events,
            active_view: ActiveView::default(),
            status: None,
            sampling_task: None,
            _event_pump: event_pump,
        }
    }

    /// Dispatch queued backend events; returns whether any arrived
    fn drain_events(&mut self, cx: &mut Context<Self>) -> bool {
        let mut handled = false;
        while let Ok(event) = self.events.try_recv() {
            debug!("Session event: {:?}", event);
            self.session.handle_event(event);
            handled = true;
        }
        if handled {
            self.sync_timer(cx);
        }
        handled
    }

    /// Make the sampling task match the session's timer
    ///
    /// The task holds only a weak handle to this view and stops as soon as
    /// the view is gone or the timer was cancelled or restarted.
    fn sync_timer(&mut self, cx: &mut Context<Self>) {
        let timer = self.session.timer();
        if !timer.is_active() {
            self.sampling_task = None;
            return;
        }

        let generation = timer.generation();
        if self
            .sampling_task
            .as_ref()
            .is_some_and(|(running, _)| *running == generation)
        {
            return;
        }

        let first_delay = timer.interval();
        let task = cx.spawn(async move |this: WeakEntity<Self>, cx: &mut AsyncApp| {
            let mut delay = first_delay;
            loop {
                cx.background_executor().timer(delay).await;

                let Some(this) = this.upgrade() else {
                    break;
                };
                let next = cx
                    .update_entity(&this, |view, cx| {
                        let timer = view.session.timer();
                        if !timer.is_active() || timer.generation() != generation {
                            return None;
                        }
                        let now = Instant::now();
                        if view.session.tick(now) {
                            cx.notify();
                        }
                        view.session.timer().time_until_next(Instant::now())
                    })
                    .ok()
                    .flatten();

                match next {
                    Some(next) => delay = next,
                    None => break,
                }
            }
        });

        self.sampling_task = Some((generation, task));
    }

    fn toggle_playback(&mut self, cx: &mut Context<Self>) {
        self.session.toggle_playback(Instant::now());
        self.sync_timer(cx);
        cx.notify();
    }

    fn toggle_recording(&mut self, cx: &mut Context<Self>) {
        self.status = match self.session.toggle_recording(Instant::now()) {
            Some(RecordRequest::Denied) => Some(
                "Microphone access has been blocked. Restart with --reset-microphone-permission to be asked again."
                    .into(),
            ),
            Some(RecordRequest::Failed) => Some("Could not start recording".into()),
            _ => None,
        };
        self.sync_timer(cx);
        cx.notify();
    }

    fn answer_permission(&mut self, granted: bool, cx: &mut Context<Self>) {
        self.session
            .handle_event(SessionEvent::PermissionResolved { granted });
        self.status = Some(if granted {
            "Microphone access granted. Press Record to start.".into()
        } else {
            "We need microphone access to record".into()
        });
        cx.notify();
    }

    fn open_recording(&mut self, id: Uuid, cx: &mut Context<Self>) {
        let Some(path) = self
            .session
            .recordings()
            .get(id)
            .filter(|recording| recording.is_playable())
            .and_then(|recording| recording.source_path.clone())
        else {
            return;
        };

        if self.session.load_recording(&path) {
            self.active_view = ActiveView::Recorder;
            self.status = None;
        } else {
            self.status = Some(format!("Could not open {}", path.display()).into());
        }
        self.sync_timer(cx);
        cx.notify();
    }

    fn render_recorder_view(&self, cx: &mut Context<Self>) -> impl IntoElement {
        let display = self.session.display();
        let state = self.session.state();
        let is_playing = display.play_selected;
        let is_recording = display.record_selected;
        let has_player = self.session.has_player();
        let slider = display.slider();
        let progress = if slider.max > slider.min {
            ((slider.value - slider.min) / (slider.max - slider.min)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let visualizer = self.session.visualizer();
        let levels = visualizer.levels();
        let bars = visualizer.capacity();
        let padding = bars.saturating_sub(levels.len());
        let level_label = visualizer
            .latest()
            .filter(|_| self.session.timer().is_active())
            .map(|decibels| format!("{:.0} dB", decibels));
        let recording_to = self.session.recording_path().filter(|_| is_recording);
        let source_label = if let Some(path) = recording_to {
            path.file_name()
                .map(|name| format!("Recording to {}", name.to_string_lossy()))
        } else {
            self.session
                .player_source()
                .and_then(|path| path.file_name())
                .map(|name| name.to_string_lossy().to_string())
        };
        let status = self.status.clone();

        let headline = match state {
            SessionState::Recording => "Recording...",
            SessionState::Playing => "Playing",
            SessionState::Paused => "Paused",
            SessionState::Idle => "Ready",
        };

        div()
            .flex()
            .flex_col()
            .items_center()
            .justify_center()
            .size_full()
            .gap_8()
            .bg(rgb(0x16213e))
            .child(
                div()
                    .text_2xl()
                    .font_weight(FontWeight::BOLD)
                    .text_color(rgb(0xffffff))
                    .child(headline),
            )
            .when_some(source_label, |el, label| {
                el.child(div().text_sm().text_color(rgb(0x888888)).child(label))
            })
            .child(
                // Level meter: newest reading on the right
                div()
                    .w(px(400.0))
                    .h(px(120.0))
                    .bg(rgb(0x1a1a2e))
                    .rounded_lg()
                    .border_1()
                    .border_color(rgb(0x2d2d44))
                    .flex()
                    .items_end()
                    .justify_center()
                    .gap_1()
                    .pb_4()
                    .children((0..bars).map(|i| {
                        let level = i
                            .checked_sub(padding)
                            .and_then(|idx| levels.get(idx))
                            .copied()
                            .unwrap_or(0.0);
                        let height = (level * 90.0).clamp(3.0, 90.0);
                        div().w(px(4.0)).h(px(height)).rounded_sm().bg(if height > 80.0 {
                            rgb(0xe94560)
                        } else if height > 55.0 {
                            rgb(0xFF9800)
                        } else {
                            rgb(0x4CAF50)
                        })
                    })),
            )
            .when_some(level_label, |el, label| {
                el.child(div().text_xs().text_color(rgb(0x888888)).child(label))
            })
            .when(is_recording, |el| {
                el.child(
                    div()
                        .text_3xl()
                        .font_weight(FontWeight::MEDIUM)
                        .text_color(rgb(0xe94560))
                        .child(format_clock(display.recording_elapsed)),
                )
            })
            .child(
                // Position
                div()
                    .flex()
                    .flex_col()
                    .gap_2()
                    .w(px(400.0))
                    .child(
                        div()
                            .w_full()
                            .h(px(6.0))
                            .rounded_sm()
                            .bg(rgb(0x2d2d44))
                            .child(
                                div()
                                    .h_full()
                                    .w(px(400.0 * progress))
                                    .rounded_sm()
                                    .bg(rgb(0xe94560)),
                            ),
                    )
                    .child(
                        div()
                            .flex()
                            .justify_between()
                            .text_sm()
                            .text_color(rgb(0x888888))
                            .child(format_clock(display.elapsed))
                            .child(format!("-{}", format_clock(display.remaining()))),
                    ),
            )
            .child(
                div()
                    .flex()
                    .gap_4()
                    .child(
                        transport_button(
                            "btn-play",
                            if is_playing { "Pause" } else { "Play" },
                            if has_player { rgb(0x4CAF50) } else { rgb(0x444444) },
                        )
                        .on_click(cx.listener(|this, _, _w, cx| {
                            this.toggle_playback(cx);
                        })),
                    )
                    .child(
                        transport_button(
                            "btn-record",
                            if is_recording { "Stop" } else { "Record" },
                            rgb(0xe94560),
                        )
                        .on_click(cx.listener(|this, _, _w, cx| {
                            this.toggle_recording(cx);
                        })),
                    ),
            )
            .when_some(status, |el, status| {
                el.child(div().text_sm().text_color(rgb(0x888888)).child(status))
            })
    }

    fn render_recording_list(&self, cx: &mut Context<Self>) -> impl IntoElement {
        let recordings = self.session.recordings();
        let is_empty = recordings.is_empty();
        let heading = format!("Recordings ({})", recordings.len());
        let location = format!("Saved in {}", self.session.recordings_dir().display());
        let rows: Vec<_> = recordings
            .iter()
            .map(|recording| {
                (
                    recording.id,
                    recording.title.clone(),
                    recording.is_playable(),
                    format!(
                        "{} - {}",
                        format_clock(recording.duration_seconds),
                        recording
                            .timestamp
                            .with_timezone(&chrono::Local)
                            .format("%b %d, %Y")
                    ),
                )
            })
            .collect();

        div()
            .flex()
            .flex_col()
            .size_full()
            .bg(rgb(0x16213e))
            .child(
                div()
                    .px_6()
                    .py_4()
                    .border_b_1()
                    .border_color(rgb(0x2d2d44))
                    .flex()
                    .flex_col()
                    .gap_1()
                    .child(
                        div()
                            .text_xl()
                            .font_weight(FontWeight::BOLD)
                            .text_color(rgb(0xffffff))
                            .child(heading),
                    )
                    .child(div().text_xs().text_color(rgb(0x666666)).child(location)),
            )
            .child(
                div()
                    .id("recording-list-scroll")
                    .flex()
                    .flex_col()
                    .gap_2()
                    .p_4()
                    .flex_grow()
                    .overflow_y_scroll()
                    .when(is_empty, |el| {
                        el.child(
                            div()
                                .text_sm()
                                .text_color(rgb(0x666666))
                                .child("No recordings yet"),
                        )
                    })
                    .children(rows.into_iter().map(|(id, title, playable, detail)| {
                        div()
                            .id(SharedString::from(format!("recording-{}", id)))
                            .px_4()
                            .py_3()
                            .bg(rgb(0x1a1a2e))
                            .rounded_lg()
                            .border_1()
                            .border_color(rgb(0x2d2d44))
                            .flex()
                            .justify_between()
                            .items_center()
                            .when(playable, |el| {
                                el.cursor_pointer()
                                    .hover(|style| style.border_color(rgb(0xe94560)))
                                    .on_click(cx.listener(move |this, _, _w, cx| {
                                        this.open_recording(id, cx);
                                    }))
                            })
                            .child(
                                div()
                                    .flex()
                                    .flex_col()
                                    .gap_1()
                                    .child(
                                        div()
                                            .text_base()
                                            .font_weight(FontWeight::SEMIBOLD)
                                            .text_color(rgb(0xffffff))
                                            .child(title),
                                    )
                                    .child(div().text_xs().text_color(rgb(0x888888)).child(detail)),
                            )
                            .child(div().text_color(rgb(0x666666)).child(if playable {
                                "›"
                            } else {
                                ""
                            }))
                    })),
            )
    }
}

impl Render for Voxmemo {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let active_view = self.active_view;
        let prompt_pending = self.session.permission_prompt_pending();

        div()
            .relative()
            .size_full()
            .flex()
            .flex_col()
            .bg(rgb(0x0f0f1a))
            .key_context("Voxmemo")
            .on_key_down(cx.listener(|this, event: &KeyDownEvent, window, cx| {
                match event.keystroke.key.as_str() {
                    "space" => this.toggle_playback(cx),
                    "r" if !event.keystroke.modifiers.control => this.toggle_recording(cx),
                    "1" if event.keystroke.modifiers.control => {
                        this.active_view = ActiveView::Recorder;
                        cx.notify();
                    }
                    "2" if event.keystroke.modifiers.control => {
                        this.active_view = ActiveView::Recordings;
                        cx.notify();
                    }
                    "q" if event.keystroke.modifiers.control => {
                        window.remove_window();
                    }
                    _ => {}
                }
            }))
            .child(
                // Navigation bar
                div()
                    .flex()
                    .items_center()
                    .gap_2()
                    .px_4()
                    .h(px(44.0))
                    .bg(rgb(0x1a1a2e))
                    .border_b_1()
                    .border_color(rgb(0x2d2d44))
                    .child(
                        div()
                            .text_lg()
                            .font_weight(FontWeight::BOLD)
                            .text_color(rgb(0xe94560))
                            .mr_4()
                            .child("Voxmemo"),
                    )
                    .child(
                        nav_item("nav-recorder", "Recorder", active_view == ActiveView::Recorder)
                            .on_click(cx.listener(|this, _, _w, cx| {
                                this.active_view = ActiveView::Recorder;
                                cx.notify();
                            })),
                    )
                    .child(
                        nav_item(
                            "nav-recordings",
                            "Recordings",
                            active_view == ActiveView::Recordings,
                        )
                        .on_click(cx.listener(|this, _, _w, cx| {
                            this.active_view = ActiveView::Recordings;
                            cx.notify();
                        })),
                    ),
            )
            .child(
                div()
                    .flex_grow()
                    .overflow_hidden()
                    .when(active_view == ActiveView::Recorder, |el| {
                        el.child(self.render_recorder_view(cx))
                    })
                    .when(active_view == ActiveView::Recordings, |el| {
                        el.child(self.render_recording_list(cx))
                    }),
            )
            .when(prompt_pending, |el| el.child(render_permission_prompt(cx)))
    }
}

fn nav_item(id: &'static str, label: &'static str, selected: bool) -> Stateful<Div> {
    div()
        .id(id)
        .px_3()
        .py_1()
        .rounded_md()
        .bg(if selected { rgb(0x2d2d44) } else { rgb(0x1a1a2e) })
        .text_color(if selected { rgb(0xe94560) } else { rgb(0xcccccc) })
        .cursor_pointer()
        .hover(|style| style.bg(rgb(0x2d2d44)))
        .child(label)
}

fn transport_button(id: &'static str, label: &'static str, color: Rgba) -> Stateful<Div> {
    div()
        .id(id)
        .px_6()
        .py_3()
        .rounded_lg()
        .bg(color)
        .text_color(rgb(0xffffff))
        .font_weight(FontWeight::SEMIBOLD)
        .cursor_pointer()
        .hover(|style| style.opacity(0.9))
        .child(label)
}

fn render_permission_prompt(cx: &mut Context<Voxmemo>) -> impl IntoElement {
    div()
        .absolute()
        .inset_0()
        .bg(rgba(0x000000aa))
        .flex()
        .items_center()
        .justify_center()
        .child(
            div()
                .w(px(420.0))
                .p_6()
                .bg(rgb(0x1a1a2e))
                .rounded_xl()
                .border_1()
                .border_color(rgb(0x2d2d44))
                .flex()
                .flex_col()
                .gap_4()
                .child(
                    div()
                        .text_xl()
                        .font_weight(FontWeight::BOLD)
                        .text_color(rgb(0xffffff))
                        .child("Allow microphone access?"),
                )
                .child(
                    div()
                        .text_sm()
                        .text_color(rgb(0x888888))
                        .child("Voxmemo records audio from your default input device."),
                )
                .child(
                    div()
                        .flex()
                        .justify_end()
                        .gap_2()
                        .child(
                            transport_button("btn-deny", "Don't Allow", rgb(0x666666)).on_click(
                                cx.listener(|this, _, _w, cx| {
                                    this.answer_permission(false, cx);
                                }),
                            ),
                        )
                        .child(
                            transport_button("btn-allow", "Allow", rgb(0x4CAF50)).on_click(
                                cx.listener(|this, _, _w, cx| {
                                    this.answer_permission(true, cx);
                                }),
                            ),
                        ),
                ),
        )
}
