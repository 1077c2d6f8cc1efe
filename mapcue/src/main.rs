//! mapcue: spoken and panned directions from the in-game map.
//!
//! The window mirrors every announcement as text and exposes the same actions
//! as the global hotkeys.

mod audio;
mod capture;
mod config;
mod dispatch;
mod hotkeys;
mod input;
mod runtime;
mod ui;
mod watch;

fn main() -> anyhow::Result<()> {
	// Structured logging. Use `RUST_LOG=info` etc.
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	let runtime = runtime::Runtime::start()?;

	let options = eframe::NativeOptions {
		viewport: egui::ViewportBuilder::default()
			.with_title("mapcue")
			.with_inner_size([480.0, 560.0]),
		..Default::default()
	};
	eframe::run_native(
		"mapcue",
		options,
		Box::new(|cc| Ok(Box::new(ui::MapCue::new(cc, runtime)))),
	)
	.map_err(|err| anyhow::anyhow!("window: {err}"))
}
