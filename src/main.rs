//! Voxmemo - A voice memo recorder for Linux
//!
//! This is the main entry point for the Voxmemo application.

mod app;
mod assets;
mod audio;
mod cli;
mod models;
mod session;
mod settings;

use app::Voxmemo;
use audio::PipeWireBackend;
use clap::Parser;
use gpui::prelude::*;
use gpui::*;
use log::{error, info};
use models::RecordingList;
use session::{DconfPermissionGate, PlaybackSource, RecordPermission, SessionController};

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments and initialize logging
    let args = cli::Args::parse();
    cli::init_logging(&args);

    info!("Starting Voxmemo voice recorder");

    let track = assets::bundled_track()?;

    if args.reset_microphone_permission {
        info!("Resetting stored microphone permission");
        settings::set_microphone_permission(RecordPermission::Undetermined);
    }

    let recordings_dir = args
        .recordings_dir
        .clone()
        .unwrap_or_else(settings::get_recordings_dir);
    info!("Recordings directory: {}", recordings_dir.display());

    let recordings = if args.placeholders {
        RecordingList::with_placeholders()
    } else {
        RecordingList::new()
    };

    Application::new().run(move |cx: &mut App| {
        let (events_tx, events_rx) = session::channel();
        let mut session = SessionController::new(
            PipeWireBackend::new(events_tx),
            DconfPermissionGate,
            recordings_dir,
        )
        .with_recordings(recordings)
        .with_visualizer_capacity(app::VISUALIZER_BARS);

        if !session.load_playback(PlaybackSource::Bundled {
            name: assets::BUNDLED_TRACK.to_string(),
            track,
        }) {
            error!("Failed to load bundled track");
        }

        let bounds = Bounds::centered(None, size(px(720.0), px(640.0)), cx);
        let opened = cx.open_window(
            WindowOptions {
                window_bounds: Some(WindowBounds::Windowed(bounds)),
                titlebar: Some(TitlebarOptions {
                    title: Some("Voxmemo".into()),
                    ..Default::default()
                }),
                // App ID for Wayland/GNOME desktop integration
                app_id: Some("com.voxmemo.Recorder".to_string()),
                ..Default::default()
            },
            |window, cx| {
                window.set_app_id("com.voxmemo.Recorder");
                cx.new(|cx| Voxmemo::new(session, events_rx, cx))
            },
        );

        if let Err(e) = opened {
            error!("Failed to open window: {}", e);
            cx.quit();
        }
    });

    Ok(())
}
