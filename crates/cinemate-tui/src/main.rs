use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use cinemate_core::Config;
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

/// Logs go to a file because the terminal belongs to the UI
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cinemate=info,cinemate_core=info"));

    let log_file = Config::config_dir().and_then(|dir| {
        std::fs::create_dir_all(&dir)?;
        Ok(OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("cinemate.log"))?)
    });

    match log_file {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::sink)
            .init(),
    }
}

/// Load preferences from `path`. When the file cannot be read the defaults
/// are used for the session and no path is returned, so the user's file is
/// never overwritten.
fn load_preferences(path: Result<PathBuf>) -> (Config, Option<PathBuf>) {
    let path = match path {
        Ok(path) => path,
        Err(err) => {
            tracing::warn!(error = %err, "no config location, preferences will not be saved");
            return (Config::new(), None);
        }
    };

    match Config::load_from(&path) {
        Ok(config) => (config, Some(path)),
        Err(err) => {
            tracing::warn!(
                error = %err,
                path = %path.display(),
                "could not load config, using defaults without saving"
            );
            (Config::new(), None)
        }
    }
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    loop {
        app.sync();
        terminal.draw(|frame| ui::render(app, frame))?;

        if app.should_quit {
            break;
        }

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let (config, config_path) = load_preferences(Config::path());

    tracing::info!(model = config.model(), "starting cinemate");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::with_gemini(config, config_path, events.sender());

    let result = run(&mut terminal, &mut app, &mut events).await;

    app.shutdown();
    tui::restore()?;

    tracing::info!("cinemate exited");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_malformed_config_is_left_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let (config, save_path) = load_preferences(Ok(path.clone()));

        assert_eq!(config, Config::new());
        assert!(save_path.is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_missing_config_can_be_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let (config, save_path) = load_preferences(Ok(path.clone()));

        assert_eq!(config, Config::new());
        assert_eq!(save_path, Some(path));
    }

    #[test]
    fn test_valid_config_is_loaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"default_model":"gemini-2.5-pro","api_base":null}"#).unwrap();

        let (config, save_path) = load_preferences(Ok(path.clone()));

        assert_eq!(config.model(), "gemini-2.5-pro");
        assert_eq!(save_path, Some(path));
    }
}
